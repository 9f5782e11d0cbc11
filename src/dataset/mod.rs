//! Dataset module for the multi-label image data
//!
//! This module provides functionality for:
//! - Reading the label table and one-hot encoding comma-separated categories
//! - Splitting records into train/validation partitions with a fixed seed
//! - Loading and preprocessing images for Burn (`Dataset` + `Batcher`)
//! - Class-weighted sampling to counter label imbalance
//!
//! ## Label Encoding
//!
//! Every distinct token of the `Category` column (split on `,`) becomes a class.
//! Class indices follow the lexicographic order of the tokens, so a record tagged
//! `"3,12"` sets the columns of `"12"` and `"3"` in its multi-hot vector.

pub mod burn_dataset;
pub mod labels;
pub mod sampler;
pub mod split;
pub mod stats;

// Re-export main types for convenience
pub use burn_dataset::{
    MultiLabelBatch, MultiLabelBatcher, MultiLabelImageDataset, MultiLabelItem,
};
pub use labels::{LabelRecord, LabelTable};
pub use sampler::WeightedRandomSampler;
pub use split::DatasetSplit;
pub use stats::DatasetStats;

/// Number of label columns produced by the category encoding
pub const NUM_CLASSES: usize = 46;

/// Input resolution expected by ViT-B/16
pub const DEFAULT_IMAGE_SIZE: usize = 224;

/// Per-channel normalisation mean used by the ViT image processor
pub const VIT_MEAN: [f32; 3] = [0.5, 0.5, 0.5];

/// Per-channel normalisation std used by the ViT image processor
pub const VIT_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Default location of the label table
pub const DEFAULT_LABEL_FILE: &str = "dataset/final_dataset.csv";

/// Default image directory, joined with each `ImageId`
pub const DEFAULT_IMAGE_DIR: &str = "dataset/train";
