//! Model module for the Vision Transformer using the Burn framework
//!
//! This module provides:
//! - The ViT-B/16 architecture with a multi-label head
//! - Model configuration (`VitConfig`, a Burn `Config`)
//! - Loading of pretrained backbone weights from a PyTorch checkpoint

pub mod pretrained;
pub mod vit;

// Re-export main types for convenience
pub use pretrained::load_pretrained_backbone;
pub use vit::{VisionTransformer, VitBackbone, VitConfig};

/// Default location of the pretrained checkpoint
pub const DEFAULT_PRETRAINED_PATH: &str = "pretrained/vit-base-patch16-224/pytorch_model.bin";

/// Name used for the fine-tuned checkpoint file
pub const MODEL_NAME: &str = "model_vit_base_patch16_224";
