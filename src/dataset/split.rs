//! Train/validation split
//!
//! Records are permuted with a seeded ChaCha8 RNG. The first
//! `ceil(n * validation_fraction)` permuted records become the validation
//! partition and the rest train, so the split is reproducible for a given seed
//! and the two partitions never overlap.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::labels::LabelRecord;
use crate::utils::error::{Result, VitError};

/// Default fraction of records held out for validation
pub const DEFAULT_VALIDATION_FRACTION: f64 = 0.2;

/// Default split seed
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Train and validation partitions of the label table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSplit {
    pub train: Vec<LabelRecord>,
    pub validation: Vec<LabelRecord>,
}

impl DatasetSplit {
    /// Split `records` into train/validation partitions
    pub fn new(records: &[LabelRecord], validation_fraction: f64, seed: u64) -> Result<Self> {
        if !(validation_fraction > 0.0 && validation_fraction < 1.0) {
            return Err(VitError::Config(format!(
                "validation fraction must be in (0, 1), got {}",
                validation_fraction
            )));
        }

        let n = records.len();
        let n_valid = (n as f64 * validation_fraction).ceil() as usize;

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        let validation: Vec<LabelRecord> = order[..n_valid]
            .iter()
            .map(|&i| records[i].clone())
            .collect();
        let train: Vec<LabelRecord> = order[n_valid..]
            .iter()
            .map(|&i| records[i].clone())
            .collect();

        if validation.is_empty() {
            return Err(VitError::EmptyPartition("validation"));
        }
        if train.is_empty() {
            return Err(VitError::EmptyPartition("train"));
        }

        tracing::info!(
            "Split {} records: {} train / {} validation (seed {})",
            n,
            train.len(),
            validation.len(),
            seed
        );

        Ok(Self { train, validation })
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::labels::LabelTable;
    use std::collections::HashSet;

    fn table(n: usize) -> LabelTable {
        LabelTable::from_rows((0..n).map(|i| (format!("{}.jpg", i), format!("{}", i % 3))))
    }

    #[test]
    fn test_split_sizes_use_ceiling() {
        let split = DatasetSplit::new(&table(11).records, 0.2, 42).unwrap();
        assert_eq!(split.validation.len(), 3);
        assert_eq!(split.train.len(), 8);
        assert_eq!(split.total(), 11);
    }

    #[test]
    fn test_split_is_disjoint_and_complete() {
        let split = DatasetSplit::new(&table(50).records, 0.2, 42).unwrap();

        let train: HashSet<usize> = split.train.iter().map(|r| r.row).collect();
        let valid: HashSet<usize> = split.validation.iter().map(|r| r.row).collect();

        assert!(train.is_disjoint(&valid));
        assert_eq!(train.len() + valid.len(), 50);
    }

    #[test]
    fn test_split_is_reproducible() {
        let records = table(30).records;
        let a = DatasetSplit::new(&records, 0.2, 42).unwrap();
        let b = DatasetSplit::new(&records, 0.2, 42).unwrap();
        let c = DatasetSplit::new(&records, 0.2, 7).unwrap();

        assert_eq!(a.validation, b.validation);
        assert_ne!(
            a.validation.iter().map(|r| r.row).collect::<Vec<_>>(),
            c.validation.iter().map(|r| r.row).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_single_record_leaves_train_empty() {
        assert!(matches!(
            DatasetSplit::new(&table(1).records, 0.2, 42),
            Err(VitError::EmptyPartition("train"))
        ));
    }

    #[test]
    fn test_no_records_leaves_validation_empty() {
        assert!(matches!(
            DatasetSplit::new(&[], 0.2, 42),
            Err(VitError::EmptyPartition("validation"))
        ));
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(matches!(
            DatasetSplit::new(&table(5).records, 1.0, 42),
            Err(VitError::Config(_))
        ));
    }
}
