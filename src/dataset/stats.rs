//! Label distribution summary for the `stats` command

use colored::Colorize;
use serde::Serialize;

use crate::dataset::labels::LabelTable;
use crate::dataset::sampler::{class_frequencies, class_weights};
use crate::dataset::split::DatasetSplit;

/// Distribution of labels across the table and the training partition
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub total_records: usize,
    pub train_records: usize,
    pub validation_records: usize,
    pub class_names: Vec<String>,
    /// Records carrying each class in the whole table
    pub class_counts: Vec<usize>,
    /// Sampler weight of each class on the training partition
    pub class_weights: Vec<f64>,
    /// Mean number of labels per record
    pub mean_labels_per_record: f64,
    /// Records with no label at all
    pub unlabeled_records: usize,
}

impl DatasetStats {
    pub fn new(table: &LabelTable, split: &DatasetSplit) -> Self {
        let num_classes = table.num_classes();
        let label_total: usize = table.records.iter().map(|r| r.active_classes().len()).sum();

        Self {
            total_records: table.len(),
            train_records: split.train.len(),
            validation_records: split.validation.len(),
            class_names: table.classes.clone(),
            class_counts: table.class_counts(),
            class_weights: class_weights(&class_frequencies(&split.train, num_classes)),
            mean_labels_per_record: label_total as f64 / table.len().max(1) as f64,
            unlabeled_records: table
                .records
                .iter()
                .filter(|r| !r.target.iter().any(|&set| set))
                .count(),
        }
    }

    /// Print statistics to stdout
    pub fn print(&self) {
        println!("{}", "Dataset Statistics:".cyan().bold());
        println!("  Total records:      {}", self.total_records);
        println!("  Training records:   {}", self.train_records);
        println!("  Validation records: {}", self.validation_records);
        println!("  Classes:            {}", self.class_names.len());
        println!("  Labels per record:  {:.2}", self.mean_labels_per_record);
        println!("  Unlabeled records:  {}", self.unlabeled_records);
        println!();
        println!("  {:>12} {:>8} {:>10}", "class", "count", "weight");
        for ((name, count), weight) in self
            .class_names
            .iter()
            .zip(&self.class_counts)
            .zip(&self.class_weights)
        {
            println!("  {:>12} {:>8} {:>10.4}", name, count, weight);
        }
    }
}
