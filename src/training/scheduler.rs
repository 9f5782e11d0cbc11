//! Reduce-on-plateau learning rate scheduling
//!
//! The scheduler watches one validation metric per epoch. After more than
//! `patience` consecutive epochs without a relative improvement of at least
//! `threshold`, the learning rate is multiplied by `factor` (never going below
//! `min_lr`). Reductions smaller than `eps` are ignored.

use serde::{Deserialize, Serialize};

/// Direction in which the watched metric improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateauMode {
    Min,
    Max,
}

/// Reduce-on-plateau settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauConfig {
    pub mode: PlateauMode,
    pub factor: f64,
    pub patience: usize,
    /// Relative improvement required to reset the patience counter
    pub threshold: f64,
    pub min_lr: f64,
    pub eps: f64,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            mode: PlateauMode::Max,
            factor: 0.1,
            patience: 2,
            threshold: 1e-4,
            min_lr: 0.0,
            eps: 1e-8,
        }
    }
}

/// Learning rate scheduler driven by a validation metric
#[derive(Debug, Clone)]
pub struct ReduceLROnPlateau {
    config: PlateauConfig,
    current_lr: f64,
    best: f64,
    num_bad_epochs: usize,
    num_reductions: usize,
}

impl ReduceLROnPlateau {
    /// Create a new scheduler starting at `base_lr`
    pub fn new(config: PlateauConfig, base_lr: f64) -> Self {
        let best = match config.mode {
            PlateauMode::Min => f64::INFINITY,
            PlateauMode::Max => f64::NEG_INFINITY,
        };

        Self {
            config,
            current_lr: base_lr,
            best,
            num_bad_epochs: 0,
            num_reductions: 0,
        }
    }

    fn is_better(&self, metric: f64) -> bool {
        match self.config.mode {
            PlateauMode::Min => metric < self.best * (1.0 - self.config.threshold),
            PlateauMode::Max => metric > self.best * (1.0 + self.config.threshold),
        }
    }

    /// Record the epoch's metric; returns true when the learning rate was reduced
    pub fn step(&mut self, metric: f64) -> bool {
        if self.is_better(metric) {
            self.best = metric;
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
        }

        if self.num_bad_epochs > self.config.patience {
            self.num_bad_epochs = 0;

            let new_lr = (self.current_lr * self.config.factor).max(self.config.min_lr);
            if self.current_lr - new_lr > self.config.eps {
                tracing::info!(
                    "Reducing learning rate: {:.2e} -> {:.2e}",
                    self.current_lr,
                    new_lr
                );
                self.current_lr = new_lr;
                self.num_reductions += 1;
                return true;
            }
        }

        false
    }

    /// Get the current learning rate
    pub fn get_lr(&self) -> f64 {
        self.current_lr
    }

    /// Best metric seen so far
    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn num_reductions(&self) -> usize {
        self.num_reductions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduces_after_patience_exceeded() {
        let mut scheduler = ReduceLROnPlateau::new(PlateauConfig::default(), 1e-5);

        assert!(!scheduler.step(0.30)); // improvement
        assert!(!scheduler.step(0.30)); // bad 1
        assert!(!scheduler.step(0.29)); // bad 2
        assert!(scheduler.step(0.30)); // bad 3 > patience

        assert!((scheduler.get_lr() - 1e-6).abs() < 1e-18);
        assert_eq!(scheduler.num_reductions(), 1);
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut scheduler = ReduceLROnPlateau::new(PlateauConfig::default(), 1e-3);

        scheduler.step(0.1);
        scheduler.step(0.1);
        scheduler.step(0.1);
        scheduler.step(0.2); // improvement
        scheduler.step(0.2);
        scheduler.step(0.2);

        assert_eq!(scheduler.get_lr(), 1e-3);
        assert_eq!(scheduler.best(), 0.2);
    }

    #[test]
    fn test_relative_threshold() {
        let mut scheduler = ReduceLROnPlateau::new(PlateauConfig::default(), 1e-3);

        scheduler.step(0.5);
        // 0.50001 is not above 0.5 * (1 + 1e-4)
        scheduler.step(0.50001);
        assert_eq!(scheduler.best(), 0.5);
        scheduler.step(0.5001);
        assert_eq!(scheduler.best(), 0.5001);
    }

    #[test]
    fn test_min_mode_and_floor() {
        let config = PlateauConfig {
            mode: PlateauMode::Min,
            patience: 0,
            min_lr: 5e-4,
            ..PlateauConfig::default()
        };
        let mut scheduler = ReduceLROnPlateau::new(config, 1e-3);

        scheduler.step(1.0);
        assert!(scheduler.step(1.0));
        assert_eq!(scheduler.get_lr(), 5e-4);

        // already at the floor: no further reduction
        assert!(!scheduler.step(1.0));
        assert_eq!(scheduler.num_reductions(), 1);
    }

    #[test]
    fn test_zero_metric_never_improves_after_zero() {
        let mut scheduler = ReduceLROnPlateau::new(PlateauConfig::default(), 1.0);
        scheduler.step(0.0);
        scheduler.step(0.0);
        scheduler.step(0.0);
        assert!(scheduler.step(0.0));
        assert!((scheduler.get_lr() - 0.1).abs() < 1e-12);
    }
}
