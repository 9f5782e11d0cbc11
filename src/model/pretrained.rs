//! Pretrained backbone weights
//!
//! Loads the encoder of `google/vit-base-patch16-224` from its PyTorch
//! checkpoint (`pytorch_model.bin`). Checkpoint keys are remapped onto the
//! module names used in [`super::vit`]; the ImageNet classifier stored in the
//! file has no counterpart in the backbone record and is skipped, so the
//! multi-label head keeps its fresh initialisation.

use std::path::Path;

use burn::module::Module;
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use tracing::info;

use crate::model::vit::{VisionTransformer, VitBackboneRecord};
use crate::utils::error::{Result, VitError};

/// Checkpoint key patterns and their module paths
const KEY_REMAP: [(&str, &str); 10] = [
    (r"^vit\.embeddings\.cls_token$", "embeddings.cls_token"),
    (r"^vit\.embeddings\.position_embeddings$", "embeddings.position_embeddings"),
    (
        r"^vit\.embeddings\.patch_embeddings\.projection\.(.+)$",
        "embeddings.patch_projection.$1",
    ),
    (
        r"^vit\.encoder\.layer\.([0-9]+)\.attention\.attention\.(query|key|value)\.(.+)$",
        "blocks.$1.attention.$2.$3",
    ),
    (
        r"^vit\.encoder\.layer\.([0-9]+)\.attention\.output\.dense\.(.+)$",
        "blocks.$1.attention.output.$2",
    ),
    (
        r"^vit\.encoder\.layer\.([0-9]+)\.intermediate\.dense\.(.+)$",
        "blocks.$1.mlp.fc1.$2",
    ),
    (
        r"^vit\.encoder\.layer\.([0-9]+)\.output\.dense\.(.+)$",
        "blocks.$1.mlp.fc2.$2",
    ),
    (
        r"^vit\.encoder\.layer\.([0-9]+)\.layernorm_before\.(.+)$",
        "blocks.$1.norm_before.$2",
    ),
    (
        r"^vit\.encoder\.layer\.([0-9]+)\.layernorm_after\.(.+)$",
        "blocks.$1.norm_after.$2",
    ),
    (r"^vit\.layernorm\.(.+)$", "norm.$1"),
];

/// Build the load arguments for a HuggingFace ViT checkpoint
pub fn vit_load_args(path: &Path) -> LoadArgs {
    KEY_REMAP
        .iter()
        .fold(LoadArgs::new(path.to_path_buf()), |args, (pattern, replacement)| {
            args.with_key_remap(pattern, replacement)
        })
}

/// Replace the backbone of `model` with the pretrained encoder weights
///
/// The architecture of `model` must match the checkpoint (ViT-B/16 at 224px).
pub fn load_pretrained_backbone<B: Backend>(
    model: VisionTransformer<B>,
    path: &Path,
    device: &B::Device,
) -> Result<VisionTransformer<B>> {
    if !path.exists() {
        return Err(VitError::PathNotFound(path.to_path_buf()));
    }

    info!("Loading pretrained backbone from {:?}", path);
    let record: VitBackboneRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(vit_load_args(path), device)
        .map_err(|e| VitError::Model(format!("failed to load pretrained weights: {}", e)))?;

    let VisionTransformer { backbone, head } = model;
    Ok(VisionTransformer {
        backbone: backbone.load_record(record),
        head,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::vit::VitConfig;
    use burn_ndarray::NdArray;
    use regex::Regex;

    fn remap(key: &str) -> Option<String> {
        KEY_REMAP.iter().find_map(|(pattern, replacement)| {
            let re = Regex::new(pattern).unwrap();
            re.is_match(key)
                .then(|| re.replace(key, *replacement).to_string())
        })
    }

    #[test]
    fn test_remap_covers_encoder_keys() {
        assert_eq!(
            remap("vit.encoder.layer.11.attention.attention.query.weight").as_deref(),
            Some("blocks.11.attention.query.weight")
        );
        assert_eq!(
            remap("vit.encoder.layer.0.attention.output.dense.bias").as_deref(),
            Some("blocks.0.attention.output.bias")
        );
        assert_eq!(
            remap("vit.encoder.layer.3.intermediate.dense.weight").as_deref(),
            Some("blocks.3.mlp.fc1.weight")
        );
        assert_eq!(
            remap("vit.encoder.layer.3.output.dense.weight").as_deref(),
            Some("blocks.3.mlp.fc2.weight")
        );
        assert_eq!(
            remap("vit.encoder.layer.7.layernorm_after.bias").as_deref(),
            Some("blocks.7.norm_after.bias")
        );
        assert_eq!(
            remap("vit.embeddings.patch_embeddings.projection.weight").as_deref(),
            Some("embeddings.patch_projection.weight")
        );
        assert_eq!(remap("vit.layernorm.weight").as_deref(), Some("norm.weight"));
    }

    #[test]
    fn test_classifier_keys_are_not_mapped() {
        assert_eq!(remap("classifier.weight"), None);
        assert_eq!(remap("classifier.bias"), None);
    }

    fn tiny_model(device: &<NdArray as Backend>::Device) -> VisionTransformer<NdArray> {
        VitConfig::new()
            .with_image_size(8)
            .with_patch_size(4)
            .with_hidden_size(8)
            .with_num_layers(1)
            .with_num_heads(2)
            .with_intermediate_size(16)
            .init::<NdArray>(device)
    }

    #[test]
    fn test_missing_checkpoint() {
        let device = Default::default();
        let model = tiny_model(&device);

        let result = load_pretrained_backbone(model, Path::new("/no/such/pytorch_model.bin"), &device);
        assert!(matches!(result, Err(VitError::PathNotFound(_))));
    }

    #[test]
    fn test_corrupt_checkpoint_is_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pytorch_model.bin");
        std::fs::write(&path, b"not a torch archive").unwrap();

        let device = Default::default();
        let result = load_pretrained_backbone(tiny_model(&device), &path, &device);
        assert!(matches!(result, Err(VitError::Model(_))));
    }
}
