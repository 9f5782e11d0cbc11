//! # ViT Multi-Label Fine-Tuning
//!
//! A Rust library for fine-tuning a pretrained Vision Transformer (ViT-B/16)
//! on multi-label image classification using the Burn framework.
//!
//! ## Features
//!
//! - **Multi-hot labels** from comma-separated category strings
//! - **Class-weighted sampling** to counter label imbalance
//! - **Pretrained backbone** loaded from the HuggingFace PyTorch checkpoint
//! - **Macro-F1 driven** learning rate schedule and checkpointing
//!
//! ## Modules
//!
//! - `dataset`: Label table, split, image dataset/batcher and weighted sampler
//! - `model`: ViT architecture and pretrained weight loading
//! - `training`: Configuration, training loop, scheduler and checkpointing
//! - `utils`: Logging, metrics, charts and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vit_multilabel::backend::{default_device, TrainingBackend};
//! use vit_multilabel::training::{run_finetuning, TrainingConfig};
//!
//! let config = TrainingConfig::default();
//! let outcome = run_finetuning::<TrainingBackend>(&config, default_device())?;
//! println!("{}", outcome.summary);
//! ```

pub mod backend;
pub mod dataset;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{
    DatasetSplit, LabelRecord, LabelTable, MultiLabelBatch, MultiLabelBatcher,
    MultiLabelImageDataset, MultiLabelItem, WeightedRandomSampler,
};
pub use model::{VisionTransformer, VitConfig};
pub use training::{run_finetuning, Trainer, TrainingConfig, TrainingOutcome};
pub use utils::error::{Result, VitError};
pub use utils::metrics::MultiLabelMetrics;

/// Number of labels predicted by the classification head
pub const NUM_CLASSES: usize = dataset::NUM_CLASSES;

/// Input image size for ViT-B/16
pub const IMAGE_SIZE: usize = dataset::DEFAULT_IMAGE_SIZE;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
