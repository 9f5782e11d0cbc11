//! Vision Transformer (ViT-B/16) built from Burn modules
//!
//! Layout follows the HuggingFace `ViTForImageClassification` model so the
//! pretrained backbone weights map onto it one-to-one:
//! - conv patch embedding (kernel = stride = patch size)
//! - learnable CLS token and position embeddings
//! - pre-norm encoder blocks (self-attention and a GELU MLP, each with a residual)
//! - final LayerNorm, linear head on the CLS token

use burn::{
    config::Config,
    module::{Module, Param},
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig, Gelu, Initializer, LayerNorm, LayerNormConfig, Linear,
        LinearConfig,
    },
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

use crate::utils::error::{self, VitError};

/// Configuration for the VisionTransformer model
#[derive(Config, Debug)]
pub struct VitConfig {
    /// Input image size (assumes square images)
    #[config(default = "224")]
    pub image_size: usize,

    /// Side of the square patches
    #[config(default = "16")]
    pub patch_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub num_channels: usize,

    /// Token embedding width
    #[config(default = "768")]
    pub hidden_size: usize,

    /// Number of encoder blocks
    #[config(default = "12")]
    pub num_layers: usize,

    /// Attention heads per block
    #[config(default = "12")]
    pub num_heads: usize,

    /// Hidden width of the MLP
    #[config(default = "3072")]
    pub intermediate_size: usize,

    /// Number of output labels
    #[config(default = "46")]
    pub num_classes: usize,

    #[config(default = "1e-12")]
    pub layer_norm_eps: f64,

    /// Dropout on embeddings and residual branches
    #[config(default = "0.0")]
    pub hidden_dropout: f64,

    /// Dropout on attention weights
    #[config(default = "0.0")]
    pub attention_dropout: f64,
}

impl VitConfig {
    /// Number of patch tokens (CLS excluded)
    pub fn num_patches(&self) -> usize {
        let side = self.image_size / self.patch_size;
        side * side
    }

    /// Check that the dimensions are consistent
    pub fn validate(&self) -> error::Result<()> {
        if self.patch_size == 0 || self.image_size % self.patch_size != 0 {
            return Err(VitError::Config(format!(
                "image size {} is not divisible by patch size {}",
                self.image_size, self.patch_size
            )));
        }
        if self.num_heads == 0 || self.hidden_size % self.num_heads != 0 {
            return Err(VitError::Config(format!(
                "hidden size {} is not divisible by {} heads",
                self.hidden_size, self.num_heads
            )));
        }
        if self.num_classes == 0 {
            return Err(VitError::Config("num_classes must be positive".to_string()));
        }
        Ok(())
    }

    /// Initialize a new model
    pub fn init<B: Backend>(&self, device: &B::Device) -> VisionTransformer<B> {
        VisionTransformer {
            backbone: self.init_backbone(device),
            head: LinearConfig::new(self.hidden_size, self.num_classes)
                .with_initializer(Initializer::Normal {
                    mean: 0.0,
                    std: 0.02,
                })
                .init(device),
        }
    }

    /// Initialize the encoder without a classification head
    pub fn init_backbone<B: Backend>(&self, device: &B::Device) -> VitBackbone<B> {
        let blocks = (0..self.num_layers)
            .map(|_| VitBlock::new(self, device))
            .collect();

        VitBackbone {
            embeddings: VitEmbeddings::new(self, device),
            blocks,
            norm: LayerNormConfig::new(self.hidden_size)
                .with_epsilon(self.layer_norm_eps)
                .init(device),
        }
    }
}

/// Patch, CLS and position embeddings
#[derive(Module, Debug)]
pub struct VitEmbeddings<B: Backend> {
    pub cls_token: Param<Tensor<B, 3>>,
    pub position_embeddings: Param<Tensor<B, 3>>,
    pub patch_projection: Conv2d<B>,
    pub dropout: Dropout,
}

impl<B: Backend> VitEmbeddings<B> {
    fn new(config: &VitConfig, device: &B::Device) -> Self {
        let init = Initializer::Normal {
            mean: 0.0,
            std: 0.02,
        };

        Self {
            cls_token: init.init([1, 1, config.hidden_size], device),
            position_embeddings: init.init([1, config.num_patches() + 1, config.hidden_size], device),
            patch_projection: Conv2dConfig::new(
                [config.num_channels, config.hidden_size],
                [config.patch_size, config.patch_size],
            )
            .with_stride([config.patch_size, config.patch_size])
            .init(device),
            dropout: DropoutConfig::new(config.hidden_dropout).init(),
        }
    }

    /// [B, C, H, W] images -> [B, 1 + patches, hidden] tokens
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 3> {
        let x = self.patch_projection.forward(images);
        let [batch_size, hidden, h, w] = x.dims();

        // [B, D, h, w] -> [B, h*w, D]
        let patches = x.reshape([batch_size, hidden, h * w]).swap_dims(1, 2);

        let cls = self.cls_token.val().repeat_dim(0, batch_size);
        let tokens = Tensor::cat(vec![cls, patches], 1) + self.position_embeddings.val();

        self.dropout.forward(tokens)
    }
}

/// Feed-forward part of an encoder block
#[derive(Module, Debug)]
pub struct VitMlp<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    pub activation: Gelu,
    pub dropout: Dropout,
}

impl<B: Backend> VitMlp<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);
        let x = self.fc2.forward(x);
        self.dropout.forward(x)
    }
}

/// Pre-norm transformer encoder block
#[derive(Module, Debug)]
pub struct VitBlock<B: Backend> {
    pub norm_before: LayerNorm<B>,
    pub attention: MultiHeadAttention<B>,
    pub norm_after: LayerNorm<B>,
    pub mlp: VitMlp<B>,
    pub dropout: Dropout,
}

impl<B: Backend> VitBlock<B> {
    fn new(config: &VitConfig, device: &B::Device) -> Self {
        let norm = || {
            LayerNormConfig::new(config.hidden_size)
                .with_epsilon(config.layer_norm_eps)
                .init(device)
        };

        Self {
            norm_before: norm(),
            attention: MultiHeadAttentionConfig::new(config.hidden_size, config.num_heads)
                .with_dropout(config.attention_dropout)
                .init(device),
            norm_after: norm(),
            mlp: VitMlp {
                fc1: LinearConfig::new(config.hidden_size, config.intermediate_size).init(device),
                fc2: LinearConfig::new(config.intermediate_size, config.hidden_size).init(device),
                activation: Gelu::new(),
                dropout: DropoutConfig::new(config.hidden_dropout).init(),
            },
            dropout: DropoutConfig::new(config.hidden_dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let h = self.norm_before.forward(x.clone());
        let h = self.attention.forward(MhaInput::self_attn(h)).context;
        let x = x + self.dropout.forward(h);

        let h = self.norm_after.forward(x.clone());
        x + self.mlp.forward(h)
    }
}

/// Encoder shared by every ViT head
#[derive(Module, Debug)]
pub struct VitBackbone<B: Backend> {
    pub embeddings: VitEmbeddings<B>,
    pub blocks: Vec<VitBlock<B>>,
    pub norm: LayerNorm<B>,
}

impl<B: Backend> VitBackbone<B> {
    /// [B, C, H, W] images -> normalised [B, tokens, hidden] sequence
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 3> {
        let mut x = self.embeddings.forward(images);
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.norm.forward(x)
    }
}

/// ViT with a multi-label classification head
#[derive(Module, Debug)]
pub struct VisionTransformer<B: Backend> {
    pub backbone: VitBackbone<B>,
    pub head: Linear<B>,
}

impl<B: Backend> VisionTransformer<B> {
    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `images` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.backbone.forward(images);
        let [batch_size, _, hidden] = x.dims();

        let cls = x.slice([0..batch_size, 0..1, 0..hidden]).reshape([batch_size, hidden]);
        self.head.forward(cls)
    }

    /// Per-label probabilities
    pub fn forward_sigmoid(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward(images))
    }

    /// Get the number of output labels
    pub fn num_classes(&self) -> usize {
        let [_, out] = self.head.weight.dims();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn tiny_config(num_classes: usize) -> VitConfig {
        VitConfig::new()
            .with_image_size(8)
            .with_patch_size(4)
            .with_hidden_size(8)
            .with_num_layers(2)
            .with_num_heads(2)
            .with_intermediate_size(16)
            .with_num_classes(num_classes)
    }

    #[test]
    fn test_default_config_is_vit_base() {
        let config = VitConfig::new();
        assert_eq!(config.hidden_size, 768);
        assert_eq!(config.num_layers, 12);
        assert_eq!(config.num_classes, 46);
        assert_eq!(config.num_patches(), 196);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_dimensions() {
        assert!(VitConfig::new().with_patch_size(15).validate().is_err());
        assert!(VitConfig::new().with_num_heads(7).validate().is_err());
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: VisionTransformer<TestBackend> = tiny_config(5).init(&device);

        let images = Tensor::<TestBackend, 4>::zeros([3, 3, 8, 8], &device);
        let logits = model.forward(images);

        assert_eq!(logits.dims(), [3, 5]);
        assert_eq!(model.num_classes(), 5);
        assert_eq!(model.backbone.blocks.len(), 2);
    }

    #[test]
    fn test_sigmoid_in_unit_range() {
        let device = Default::default();
        let model: VisionTransformer<TestBackend> = tiny_config(4).init(&device);

        let images = Tensor::<TestBackend, 4>::ones([2, 3, 8, 8], &device);
        let probs = model
            .forward_sigmoid(images)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();

        assert_eq!(probs.len(), 8);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_embedding_sequence_length() {
        let device = Default::default();
        let backbone: VitBackbone<TestBackend> = tiny_config(2).init_backbone(&device);

        let tokens = backbone.forward(Tensor::zeros([1, 3, 8, 8], &device));
        assert_eq!(tokens.dims(), [1, 5, 8]);
    }
}
