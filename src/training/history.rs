//! Per-epoch training history

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// Numbers recorded at the end of one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Epoch number, 1-based
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub accuracy: f64,
    pub f1_micro: f64,
    pub f1_macro: f64,
    /// Learning rate used during the epoch
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    pub fn train_losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.train_loss).collect()
    }

    pub fn val_losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.val_loss).collect()
    }

    /// Epoch with the highest macro-F1 (first one on ties)
    pub fn best_epoch(&self) -> Option<&EpochRecord> {
        self.epochs.iter().fold(None, |best: Option<&EpochRecord>, e| match best {
            Some(b) if b.f1_macro >= e.f1_macro => Some(b),
            _ => Some(e),
        })
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Save history to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load history from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, train_loss: f64, f1_macro: f64) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss,
            val_loss: train_loss + 0.1,
            accuracy: 0.0,
            f1_micro: f1_macro,
            f1_macro,
            learning_rate: 1e-5,
        }
    }

    #[test]
    fn test_loss_series() {
        let mut history = TrainingHistory::new();
        history.push(record(1, 0.5, 0.1));
        history.push(record(2, 0.4, 0.2));

        assert_eq!(history.train_losses(), vec![0.5, 0.4]);
        assert_eq!(history.val_losses().len(), 2);
    }

    #[test]
    fn test_best_epoch_prefers_first_on_tie() {
        let mut history = TrainingHistory::new();
        assert!(history.best_epoch().is_none());

        history.push(record(1, 0.5, 0.3));
        history.push(record(2, 0.4, 0.3));
        history.push(record(3, 0.3, 0.2));

        assert_eq!(history.best_epoch().unwrap().epoch, 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = TrainingHistory::new();
        history.push(record(1, 0.5, 0.25));
        history.save(&path).unwrap();

        let loaded = TrainingHistory::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.epochs[0].f1_macro, 0.25);
    }
}
