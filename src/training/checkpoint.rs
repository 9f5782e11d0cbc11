//! Best-model checkpointing
//!
//! One checkpoint file per run, keyed by validation macro-F1. The weights are
//! written with Burn's `CompactRecorder` to `<dir>/<name>.mpk` and overwritten
//! only when macro-F1 strictly improves on the best value seen so far
//! (starting from 0.0). A JSON sidecar `<dir>/<name>.json` describes the
//! snapshot currently on disk.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::error::{Result, VitError};
use crate::utils::metrics::MultiLabelMetrics;

/// Description of a saved snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Epoch of the snapshot, 1-based
    pub epoch: usize,
    pub f1_macro: f64,
    pub f1_micro: f64,
    pub accuracy: f64,
    pub learning_rate: f64,
    pub timestamp: String,
}

impl CheckpointMetadata {
    pub fn new(epoch: usize, metrics: &MultiLabelMetrics, learning_rate: f64) -> Self {
        Self {
            epoch,
            f1_macro: metrics.f1_macro(),
            f1_micro: metrics.f1_micro(),
            accuracy: metrics.accuracy,
            learning_rate,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Save metadata to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load metadata from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Keeps the single best model of the run on disk
#[derive(Debug, Clone)]
pub struct BestCheckpoint {
    dir: PathBuf,
    name: String,
    best_f1_macro: f64,
    best: Option<CheckpointMetadata>,
}

impl BestCheckpoint {
    pub fn new<P: AsRef<Path>>(dir: P, name: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            name: name.to_string(),
            best_f1_macro: 0.0,
            best: None,
        }
    }

    /// Strict improvement over the best macro-F1 so far
    pub fn is_improvement(&self, f1_macro: f64) -> bool {
        f1_macro > self.best_f1_macro
    }

    /// Save `model` if this epoch improved macro-F1; returns whether it was saved
    pub fn observe<B: Backend, M: Module<B>>(
        &mut self,
        model: &M,
        epoch: usize,
        metrics: &MultiLabelMetrics,
        learning_rate: f64,
    ) -> Result<bool> {
        let f1_macro = metrics.f1_macro();
        if !self.is_improvement(f1_macro) {
            return Ok(false);
        }

        fs::create_dir_all(&self.dir)?;
        model
            .clone()
            .save_file(self.model_path(), &CompactRecorder::new())
            .map_err(|e| VitError::Model(format!("failed to save checkpoint: {}", e)))?;

        let metadata = CheckpointMetadata::new(epoch, metrics, learning_rate);
        metadata.save(&self.metadata_path())?;

        info!(
            "Saved checkpoint {:?} (epoch {}, F1 macro {:.4})",
            self.model_path(),
            epoch,
            f1_macro
        );

        self.best_f1_macro = f1_macro;
        self.best = Some(metadata);
        Ok(true)
    }

    /// Restore the saved weights into `model`
    pub fn load_into<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        model
            .load_file(self.model_path(), &CompactRecorder::new(), device)
            .map_err(|e| VitError::Model(format!("failed to load checkpoint: {}", e)))
    }

    /// Checkpoint path without extension; the recorder appends `.mpk`
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }

    pub fn best_f1_macro(&self) -> f64 {
        self.best_f1_macro
    }

    /// Metadata of the snapshot on disk, if any epoch improved
    pub fn best(&self) -> Option<&CheckpointMetadata> {
        self.best.as_ref()
    }

    /// Final report line
    pub fn summary(&self) -> String {
        match &self.best {
            Some(best) => format!(
                "Best Validation F1 Macro: {:.4} (Epoch {})",
                best.f1_macro, best.epoch
            ),
            None => "Best Validation F1 Macro: 0.0000 (no epoch improved, no checkpoint saved)"
                .to_string(),
        }
    }
}
