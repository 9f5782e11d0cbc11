//! Label table loading and multi-hot encoding
//!
//! The label file is a CSV with an `ImageId` column (file name inside the image
//! directory) and a `Category` column holding comma-separated class tokens.
//! Any other columns are ignored.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::utils::error::{Result, VitError};

/// One row of the label file as it appears on disk
#[derive(Debug, Deserialize)]
struct RawLabelRow {
    #[serde(rename = "ImageId")]
    image_id: String,
    #[serde(rename = "Category", default)]
    category: String,
}

/// Split a category string into its class tokens
///
/// Tokens are not trimmed; empty tokens (e.g. from `"1,,2"`) are skipped.
pub fn category_tokens(category: &str) -> impl Iterator<Item = &str> {
    category.split(',').filter(|token| !token.is_empty())
}

/// A labeled image with its multi-hot target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    /// Row index in the label file (0-based, header excluded)
    pub row: usize,
    /// File name of the image, relative to the image directory
    pub image_id: String,
    /// Raw category string
    pub categories: String,
    /// Multi-hot vector over the class vocabulary
    pub target: Vec<bool>,
}

impl LabelRecord {
    /// Indices of the classes set in this record
    pub fn active_classes(&self) -> Vec<usize> {
        self.target
            .iter()
            .enumerate()
            .filter_map(|(i, &set)| set.then_some(i))
            .collect()
    }

    /// Render the target as a comma-separated `0/1` string
    pub fn target_string(&self) -> String {
        self.target
            .iter()
            .map(|&set| if set { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Target as floats, in class index order
    pub fn target_f32(&self) -> Vec<f32> {
        self.target
            .iter()
            .map(|&set| if set { 1.0 } else { 0.0 })
            .collect()
    }
}

/// The whole label file, encoded
#[derive(Debug, Clone)]
pub struct LabelTable {
    /// Class vocabulary, sorted; index `i` is class `i`
    pub classes: Vec<String>,
    /// Encoded records in file order
    pub records: Vec<LabelRecord>,
}

impl LabelTable {
    /// Read and encode a CSV label file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VitError::PathNotFound(path.to_path_buf()));
        }

        info!("Reading label file {:?}", path);
        let mut reader = csv::Reader::from_path(path)?;

        let headers = reader.headers()?.clone();
        for column in ["ImageId", "Category"] {
            if !headers.iter().any(|h| h == column) {
                return Err(VitError::LabelFile(format!(
                    "missing column '{}' in {:?}",
                    column, path
                )));
            }
        }

        let mut rows = Vec::new();
        for row in reader.deserialize() {
            let row: RawLabelRow = row?;
            rows.push((row.image_id, row.category));
        }

        Ok(Self::from_rows(rows))
    }

    /// Encode `(image_id, category)` pairs
    pub fn from_rows<I, S, T>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let rows: Vec<(String, String)> = rows
            .into_iter()
            .map(|(id, cat)| (id.into(), cat.into()))
            .collect();

        let vocabulary: BTreeSet<&str> = rows
            .iter()
            .flat_map(|(_, cat)| category_tokens(cat))
            .collect();
        let classes: Vec<String> = vocabulary.iter().map(|s| s.to_string()).collect();

        let records = rows
            .iter()
            .enumerate()
            .map(|(row, (image_id, categories))| {
                let mut target = vec![false; classes.len()];
                for token in category_tokens(categories) {
                    // binary_search is exact: the vocabulary was built from these tokens
                    if let Ok(idx) = classes.binary_search_by(|c| c.as_str().cmp(token)) {
                        target[idx] = true;
                    }
                }
                LabelRecord {
                    row,
                    image_id: image_id.clone(),
                    categories: categories.clone(),
                    target,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "Encoded {} records over {} classes",
            records.len(),
            classes.len()
        );

        Self { classes, records }
    }

    /// Reject a vocabulary whose size differs from the model head
    pub fn ensure_num_classes(&self, expected: usize) -> Result<()> {
        if self.classes.len() != expected {
            return Err(VitError::ClassCountMismatch {
                expected,
                found: self.classes.len(),
            });
        }
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records carrying each class
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes()];
        for record in &self.records {
            for idx in record.active_classes() {
                counts[idx] += 1;
            }
        }
        counts
    }
}
