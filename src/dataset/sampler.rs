//! Class-weighted sampling with replacement
//!
//! Rare labels get larger weights so that records carrying them are drawn more
//! often:
//!
//! - `f_c` = number of training records with class `c`
//! - `w_c = total / (f_c * n_present)` where `total = sum_c f_c` and
//!   `n_present` counts classes with `f_c > 0` (absent classes weigh 0)
//! - sample weight `s_i = <multi_hot_i, w>`
//!
//! Each epoch draws `len(train)` indices with probability proportional to `s_i`.

use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::dataset::labels::LabelRecord;
use crate::utils::error::{Result, VitError};

/// Number of records carrying each class
pub fn class_frequencies(records: &[LabelRecord], num_classes: usize) -> Vec<usize> {
    let mut freqs = vec![0usize; num_classes];
    for record in records {
        for (c, &set) in record.target.iter().enumerate().take(num_classes) {
            if set {
                freqs[c] += 1;
            }
        }
    }
    freqs
}

/// Inverse-frequency class weights
pub fn class_weights(frequencies: &[usize]) -> Vec<f64> {
    let total: usize = frequencies.iter().sum();
    let present = frequencies.iter().filter(|&&f| f > 0).count();

    frequencies
        .iter()
        .map(|&f| {
            if f == 0 {
                0.0
            } else {
                total as f64 / (f as f64 * present as f64)
            }
        })
        .collect()
}

/// Per-record weight: the sum of the weights of its classes
pub fn sample_weights(records: &[LabelRecord], class_weights: &[f64]) -> Vec<f64> {
    records
        .iter()
        .map(|record| {
            record
                .target
                .iter()
                .zip(class_weights)
                .filter(|&(&set, _)| set)
                .map(|(_, &w)| w)
                .sum()
        })
        .collect()
}

/// Draws record indices with replacement, proportionally to their weights
#[derive(Debug, Clone)]
pub struct WeightedRandomSampler {
    weights: Vec<f64>,
    distribution: WeightedIndex<f64>,
    num_samples: usize,
    rng: ChaCha8Rng,
}

impl WeightedRandomSampler {
    /// Create a sampler over explicit weights
    pub fn new(weights: Vec<f64>, num_samples: usize, seed: u64) -> Result<Self> {
        let distribution = WeightedIndex::new(&weights)
            .map_err(|e| VitError::Sampler(format!("invalid sample weights: {}", e)))?;

        Ok(Self {
            weights,
            distribution,
            num_samples,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Build class-weighted sampling over the training records
    pub fn from_records(records: &[LabelRecord], num_classes: usize, seed: u64) -> Result<Self> {
        let weights = sample_weights(records, &class_weights(&class_frequencies(records, num_classes)));
        Self::new(weights, records.len(), seed)
    }

    /// Draw one epoch of indices; the RNG advances between calls
    pub fn sample_epoch(&mut self) -> Vec<usize> {
        (0..self.num_samples)
            .map(|_| self.distribution.sample(&mut self.rng))
            .collect()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::labels::LabelTable;

    #[test]
    fn test_class_weights_inverse_frequency() {
        // total = 4, two classes present
        let weights = class_weights(&[3, 1, 0]);
        assert!((weights[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((weights[1] - 2.0).abs() < 1e-12);
        assert_eq!(weights[2], 0.0);
    }

    #[test]
    fn test_sample_weight_is_dot_product() {
        let table = LabelTable::from_rows(vec![("a", "x,y"), ("b", "x"), ("c", "x")]);
        let freqs = class_frequencies(&table.records, 2);
        assert_eq!(freqs, vec![3, 1]);

        let weights = sample_weights(&table.records, &class_weights(&freqs));
        // w = [4/6, 2]
        assert!((weights[0] - (4.0 / 6.0 + 2.0)).abs() < 1e-12);
        assert!((weights[1] - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_weights_is_error() {
        assert!(matches!(
            WeightedRandomSampler::new(vec![0.0, 0.0], 2, 42),
            Err(VitError::Sampler(_))
        ));
    }

    #[test]
    fn test_zero_weight_records_never_drawn() {
        let mut sampler = WeightedRandomSampler::new(vec![1.0, 0.0, 2.0], 500, 42).unwrap();
        let draws = sampler.sample_epoch();
        assert_eq!(draws.len(), 500);
        assert!(draws.iter().all(|&i| i != 1));
    }

    #[test]
    fn test_draws_are_reproducible_and_advance() {
        let table = LabelTable::from_rows((0..20).map(|i| (format!("{}", i), format!("{}", i % 4))));
        let mut a = WeightedRandomSampler::from_records(&table.records, 4, 42).unwrap();
        let mut b = WeightedRandomSampler::from_records(&table.records, 4, 42).unwrap();
        assert_eq!(a.num_samples(), 20);
        // five records per class, one class each: uniform weights of 20 / (5 * 4)
        assert!(a.weights().iter().all(|&w| (w - 1.0).abs() < 1e-12));

        let first = a.sample_epoch();
        assert_eq!(first, b.sample_epoch());
        assert_eq!(first.len(), 20);
        assert_ne!(first, a.sample_epoch());
    }

    #[test]
    fn test_rare_class_drawn_more_often() {
        // one rare record against nine common ones
        let mut rows = vec![("rare".to_string(), "r".to_string())];
        rows.extend((0..9).map(|i| (format!("c{}", i), "c".to_string())));
        let table = LabelTable::from_rows(rows);

        let mut sampler = WeightedRandomSampler::from_records(&table.records, 2, 1).unwrap();
        let rare_idx = table.records.iter().position(|r| r.image_id == "rare").unwrap();

        let draws: Vec<usize> = (0..100).flat_map(|_| sampler.sample_epoch()).collect();
        let rare = draws.iter().filter(|&&i| i == rare_idx).count() as f64 / draws.len() as f64;
        // class weights balance the two classes, so about half the draws are rare
        assert!(rare > 0.4 && rare < 0.6, "rare share {}", rare);
    }
}
