//! Training module for multi-label ViT fine-tuning
//!
//! This module provides:
//! - The training configuration (`TrainingConfig`, JSON load/save)
//! - The epoch loop with weighted sampling and BCE-with-logits loss
//! - Reduce-on-plateau learning rate scheduling on validation macro-F1
//! - Best-model checkpointing and per-epoch history
//!
//! ## Flow
//!
//! 1. Read and encode the label table, split train/validation
//! 2. Build the class-weighted sampler over the training partition
//! 3. Load the pretrained backbone and attach a fresh multi-label head
//! 4. For each epoch: train, validate, step the scheduler, checkpoint on improvement
//! 5. Write the loss plot and the training history

pub mod checkpoint;
pub mod finetune;
pub mod history;
pub mod scheduler;
pub mod trainer;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::split::{DEFAULT_SPLIT_SEED, DEFAULT_VALIDATION_FRACTION};
use crate::dataset::{DEFAULT_IMAGE_DIR, DEFAULT_LABEL_FILE};
use crate::model::{VitConfig, DEFAULT_PRETRAINED_PATH, MODEL_NAME};
use crate::utils::error::{Result, VitError};

// Re-export main types for convenience
pub use checkpoint::{BestCheckpoint, CheckpointMetadata};
pub use finetune::{run_finetuning, TrainingOutcome};
pub use history::{EpochRecord, TrainingHistory};
pub use scheduler::{PlateauConfig, PlateauMode, ReduceLROnPlateau};
pub use trainer::{Trainer, TrainingPhase};

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 6;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default number of image decoding threads
pub const DEFAULT_NUM_WORKERS: usize = 6;

/// Default learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 1e-5;

/// Default AdamW weight decay
pub const DEFAULT_WEIGHT_DECAY: f64 = 0.01;

/// Default sigmoid decision threshold
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Configuration of a fine-tuning run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// CSV label file with `ImageId` and `Category` columns
    pub label_file: PathBuf,

    /// Directory holding the images named in `ImageId`
    pub image_dir: PathBuf,

    /// Where checkpoints, plot and history are written
    pub output_dir: PathBuf,

    /// PyTorch checkpoint of the pretrained backbone (None trains from scratch)
    pub pretrained_weights: Option<PathBuf>,

    /// Model architecture
    pub model: VitConfig,

    /// Fraction of records held out for validation
    pub validation_fraction: f64,

    /// Seed for the split and the sampler
    pub seed: u64,

    /// Batch size for training and validation
    pub batch_size: usize,

    /// Threads decoding images for each batch
    pub num_workers: usize,

    /// Initial learning rate
    pub learning_rate: f64,

    /// AdamW weight decay
    pub weight_decay: f64,

    /// Number of training epochs
    pub epochs: usize,

    /// Sigmoid probability at or above which a label is predicted
    pub threshold: f32,

    /// Reduce-on-plateau settings
    pub plateau: PlateauConfig,

    /// Checkpoint file name (without extension)
    pub checkpoint_name: String,

    /// Loss plot file name
    pub plot_name: String,

    /// Training history file name
    pub history_name: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            label_file: PathBuf::from(DEFAULT_LABEL_FILE),
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            output_dir: PathBuf::from("."),
            pretrained_weights: Some(PathBuf::from(DEFAULT_PRETRAINED_PATH)),
            model: VitConfig::new(),
            validation_fraction: DEFAULT_VALIDATION_FRACTION,
            seed: DEFAULT_SPLIT_SEED,
            batch_size: DEFAULT_BATCH_SIZE,
            num_workers: DEFAULT_NUM_WORKERS,
            learning_rate: DEFAULT_LEARNING_RATE,
            weight_decay: DEFAULT_WEIGHT_DECAY,
            epochs: DEFAULT_EPOCHS,
            threshold: DEFAULT_THRESHOLD,
            plateau: PlateauConfig::default(),
            checkpoint_name: MODEL_NAME.to_string(),
            plot_name: "vit_loss_plot.svg".to_string(),
            history_name: "training_history.json".to_string(),
        }
    }
}

impl TrainingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;

        if self.batch_size == 0 {
            return Err(VitError::Config("batch_size must be greater than 0".to_string()));
        }
        if self.num_workers == 0 {
            return Err(VitError::Config("num_workers must be greater than 0".to_string()));
        }
        if self.epochs == 0 {
            return Err(VitError::Config("epochs must be greater than 0".to_string()));
        }
        if self.learning_rate <= 0.0 {
            return Err(VitError::Config("learning_rate must be positive".to_string()));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(VitError::Config(
                "validation_fraction must be in range (0.0, 1.0)".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(VitError::Config("threshold must be in range [0.0, 1.0]".to_string()));
        }
        if !(self.plateau.factor > 0.0 && self.plateau.factor < 1.0) {
            return Err(VitError::Config("plateau factor must be in range (0.0, 1.0)".to_string()));
        }
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VitError::PathNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn plot_path(&self) -> PathBuf {
        self.output_dir.join(&self.plot_name)
    }

    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join(&self.history_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = TrainingConfig::default();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.num_workers, 6);
        assert_eq!(config.epochs, 6);
        assert_eq!(config.seed, 42);
        assert_eq!(config.learning_rate, 1e-5);
        assert_eq!(config.model.num_classes, 46);
        assert_eq!(config.plateau.patience, 2);
        assert_eq!(config.checkpoint_name, "model_vit_base_patch16_224");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = TrainingConfig {
            batch_size: 0,
            ..TrainingConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TrainingConfig {
            validation_fraction: 0.0,
            ..TrainingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = TrainingConfig {
            epochs: 3,
            pretrained_weights: None,
            ..TrainingConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = TrainingConfig::load(&path).unwrap();
        assert_eq!(loaded.epochs, 3);
        assert!(loaded.pretrained_weights.is_none());
        assert_eq!(loaded.model.hidden_size, 768);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "batch_size": 8, "plateau": { "mode": "max", "factor": 0.5, "patience": 1, "threshold": 0.0001, "min_lr": 0.0, "eps": 1e-8 } }"#).unwrap();

        let config = TrainingConfig::load(&path).unwrap();
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.plateau.factor, 0.5);
        assert_eq!(config.epochs, 6);
    }
}
