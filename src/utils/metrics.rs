//! Metrics Module for Multi-Label Evaluation
//!
//! Every class is an independent binary decision, so each class gets its own
//! TP/FP/FN/TN counts. From those:
//! - subset accuracy (the whole label vector must match)
//! - micro F1 (counts pooled across classes)
//! - macro F1 (uniform mean of per-class F1)
//! - a classification report with micro, macro, weighted and samples averages

use serde::{Deserialize, Serialize};

/// Threshold sigmoid probabilities (row-major `[samples, num_classes]`) into
/// binary predictions. A probability equal to the threshold counts as positive.
pub fn threshold_probabilities(
    probabilities: &[f32],
    num_classes: usize,
    threshold: f32,
) -> Vec<Vec<bool>> {
    probabilities
        .chunks(num_classes.max(1))
        .map(|row| row.iter().map(|&p| p >= threshold).collect())
        .collect()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// F1 from raw counts: 2TP / (2TP + FP + FN), 0 when nothing was predicted or present
fn f1_from_counts(tp: usize, fp: usize, fn_: usize) -> f64 {
    ratio(2 * tp, 2 * tp + fp + fn_)
}

/// Per-class metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class index
    pub class_idx: usize,

    /// Class name (if available)
    pub class_name: Option<String>,

    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,

    /// Precision = TP / (TP + FP)
    pub precision: f64,

    /// Recall = TP / (TP + FN)
    pub recall: f64,

    /// F1 = 2TP / (2TP + FP + FN)
    pub f1: f64,

    /// Number of samples where this class is present
    pub support: usize,
}

impl ClassMetrics {
    /// Build class metrics from binary decision counts
    pub fn from_counts(class_idx: usize, tp: usize, fp: usize, fn_: usize, tn: usize) -> Self {
        Self {
            class_idx,
            class_name: None,
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            true_negatives: tn,
            precision: ratio(tp, tp + fp),
            recall: ratio(tp, tp + fn_),
            f1: f1_from_counts(tp, fp, fn_),
            support: tp + fn_,
        }
    }

    /// Set the class name
    pub fn with_name(mut self, name: &str) -> Self {
        self.class_name = Some(name.to_string());
        self
    }
}

/// One averaged row of the classification report
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Validation metrics for a multi-label classifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiLabelMetrics {
    /// Number of samples evaluated
    pub total_samples: usize,

    /// Number of labels per sample
    pub num_classes: usize,

    /// Samples whose whole label vector was predicted exactly
    pub exact_matches: usize,

    /// Subset accuracy (exact_matches / total_samples)
    pub accuracy: f64,

    /// Scores from counts pooled across classes
    pub micro: AverageScores,

    /// Uniform mean of per-class scores
    pub macro_avg: AverageScores,

    /// Mean of per-class scores weighted by support
    pub weighted: AverageScores,

    /// Mean of per-sample scores
    pub samples: AverageScores,

    /// Average loss, set by the validation loop
    pub loss: Option<f64>,

    /// Per-class metrics
    pub per_class: Vec<ClassMetrics>,
}

impl MultiLabelMetrics {
    /// Compute metrics from binary predictions and ground truth label vectors
    pub fn from_predictions(
        predictions: &[Vec<bool>],
        ground_truth: &[Vec<bool>],
        num_classes: usize,
    ) -> Self {
        assert_eq!(
            predictions.len(),
            ground_truth.len(),
            "Predictions and ground truth must have same length"
        );

        let total_samples = predictions.len();
        if total_samples == 0 {
            return Self {
                num_classes,
                ..Self::default()
            };
        }

        let mut tp = vec![0usize; num_classes];
        let mut fp = vec![0usize; num_classes];
        let mut fn_ = vec![0usize; num_classes];
        let mut tn = vec![0usize; num_classes];

        let mut exact_matches = 0usize;
        let mut sample_precision = 0.0f64;
        let mut sample_recall = 0.0f64;
        let mut sample_f1 = 0.0f64;

        for (pred, truth) in predictions.iter().zip(ground_truth.iter()) {
            let mut sample_tp = 0usize;
            let mut predicted = 0usize;
            let mut actual = 0usize;
            let mut all_equal = true;

            for class in 0..num_classes {
                let p = pred.get(class).copied().unwrap_or(false);
                let t = truth.get(class).copied().unwrap_or(false);
                match (p, t) {
                    (true, true) => tp[class] += 1,
                    (true, false) => fp[class] += 1,
                    (false, true) => fn_[class] += 1,
                    (false, false) => tn[class] += 1,
                }
                all_equal &= p == t;
                sample_tp += (p && t) as usize;
                predicted += p as usize;
                actual += t as usize;
            }

            exact_matches += all_equal as usize;
            sample_precision += ratio(sample_tp, predicted);
            sample_recall += ratio(sample_tp, actual);
            sample_f1 += ratio(2 * sample_tp, predicted + actual);
        }

        let per_class: Vec<ClassMetrics> = (0..num_classes)
            .map(|c| ClassMetrics::from_counts(c, tp[c], fp[c], fn_[c], tn[c]))
            .collect();

        let (tp_sum, fp_sum, fn_sum) = (
            tp.iter().sum::<usize>(),
            fp.iter().sum::<usize>(),
            fn_.iter().sum::<usize>(),
        );
        let micro = AverageScores {
            precision: ratio(tp_sum, tp_sum + fp_sum),
            recall: ratio(tp_sum, tp_sum + fn_sum),
            f1: f1_from_counts(tp_sum, fp_sum, fn_sum),
        };

        let n = num_classes.max(1) as f64;
        let macro_avg = AverageScores {
            precision: per_class.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: per_class.iter().map(|m| m.recall).sum::<f64>() / n,
            f1: per_class.iter().map(|m| m.f1).sum::<f64>() / n,
        };

        let total_support: usize = per_class.iter().map(|m| m.support).sum();
        let weighted = if total_support > 0 {
            let w = |f: fn(&ClassMetrics) -> f64| {
                per_class
                    .iter()
                    .map(|m| f(m) * m.support as f64)
                    .sum::<f64>()
                    / total_support as f64
            };
            AverageScores {
                precision: w(|m| m.precision),
                recall: w(|m| m.recall),
                f1: w(|m| m.f1),
            }
        } else {
            AverageScores::default()
        };

        let samples = AverageScores {
            precision: sample_precision / total_samples as f64,
            recall: sample_recall / total_samples as f64,
            f1: sample_f1 / total_samples as f64,
        };

        Self {
            total_samples,
            num_classes,
            exact_matches,
            accuracy: ratio(exact_matches, total_samples),
            micro,
            macro_avg,
            weighted,
            samples,
            loss: None,
            per_class,
        }
    }

    /// Attach class names to the per-class rows
    pub fn with_class_names(mut self, names: &[String]) -> Self {
        self.per_class = self
            .per_class
            .into_iter()
            .map(|m| match names.get(m.class_idx) {
                Some(name) => m.with_name(name),
                None => m,
            })
            .collect();
        self
    }

    pub fn f1_micro(&self) -> f64 {
        self.micro.f1
    }

    pub fn f1_macro(&self) -> f64 {
        self.macro_avg.f1
    }

    /// F1 per class, in class index order
    pub fn per_class_f1(&self) -> Vec<f64> {
        self.per_class.iter().map(|m| m.f1).collect()
    }

    /// Render a text classification report
    pub fn classification_report(&self) -> String {
        let label_width = self
            .per_class
            .iter()
            .map(|m| {
                m.class_name
                    .as_ref()
                    .map(|n| n.len())
                    .unwrap_or_else(|| m.class_idx.to_string().len())
            })
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        let mut out = String::new();
        out.push_str(&format!(
            "{:>width$} {:>9} {:>9} {:>9} {:>9}\n\n",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            width = label_width
        ));

        for m in &self.per_class {
            let label = m
                .class_name
                .clone()
                .unwrap_or_else(|| m.class_idx.to_string());
            out.push_str(&format!(
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
                label,
                m.precision,
                m.recall,
                m.f1,
                m.support,
                width = label_width
            ));
        }
        out.push('\n');

        let total_support: usize = self.per_class.iter().map(|m| m.support).sum();
        for (label, scores) in [
            ("micro avg", self.micro),
            ("macro avg", self.macro_avg),
            ("weighted avg", self.weighted),
            ("samples avg", self.samples),
        ] {
            out.push_str(&format!(
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
                label,
                scores.precision,
                scores.recall,
                scores.f1,
                total_support,
                width = label_width
            ));
        }

        out
    }
}

/// Running average for tracking loss during an epoch
#[derive(Debug, Clone, Default)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Mean over the values added so far
    pub fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }

    /// Sum of the values added so far
    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[u8]]) -> Vec<Vec<bool>> {
        data.iter()
            .map(|r| r.iter().map(|&v| v == 1).collect())
            .collect()
    }

    #[test]
    fn test_threshold_probabilities() {
        let probs = [0.2, 0.5, 0.9, 0.49, 0.51, 0.0];
        let preds = threshold_probabilities(&probs, 3, 0.5);
        assert_eq!(preds, vec![vec![false, true, true], vec![false, true, false]]);
    }

    #[test]
    fn test_perfect_predictions() {
        let truth = rows(&[&[1, 0, 1], &[0, 1, 0]]);
        let metrics = MultiLabelMetrics::from_predictions(&truth, &truth, 3);

        assert_eq!(metrics.exact_matches, 2);
        assert!((metrics.accuracy - 1.0).abs() < 1e-9);
        assert!((metrics.f1_micro() - 1.0).abs() < 1e-9);
        assert!((metrics.f1_macro() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_micro_and_macro_f1() {
        // class 0: TP=1 FP=1 FN=0 -> F1 = 2/3
        // class 1: TP=0 FP=0 FN=1 -> F1 = 0
        // class 2: TP=1 FP=0 FN=0 -> F1 = 1
        let preds = rows(&[&[1, 0, 1], &[1, 0, 0]]);
        let truth = rows(&[&[1, 0, 1], &[0, 1, 0]]);
        let metrics = MultiLabelMetrics::from_predictions(&preds, &truth, 3);

        let f1 = metrics.per_class_f1();
        assert!((f1[0] - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(f1[1], 0.0);
        assert!((f1[2] - 1.0).abs() < 1e-9);

        assert!((metrics.f1_macro() - (2.0 / 3.0 + 0.0 + 1.0) / 3.0).abs() < 1e-9);
        // pooled: TP=2 FP=1 FN=1 -> 4 / 6
        assert!((metrics.f1_micro() - 4.0 / 6.0).abs() < 1e-9);
        // only the first sample matches exactly
        assert!((metrics.accuracy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_absent_class_counts_as_zero_in_macro() {
        // class 1 never predicted and never present
        let preds = rows(&[&[1, 0], &[1, 0]]);
        let truth = rows(&[&[1, 0], &[1, 0]]);
        let metrics = MultiLabelMetrics::from_predictions(&preds, &truth, 2);

        assert_eq!(metrics.per_class[1].support, 0);
        assert!((metrics.f1_macro() - 0.5).abs() < 1e-9);
        assert!((metrics.f1_micro() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_and_samples_average() {
        let preds = rows(&[&[1, 1], &[0, 0]]);
        let truth = rows(&[&[1, 0], &[1, 0]]);
        let metrics = MultiLabelMetrics::from_predictions(&preds, &truth, 2);

        // class 0: TP=1 FN=1 -> F1 = 2/3, support 2; class 1 support 0
        assert!((metrics.weighted.f1 - 2.0 / 3.0).abs() < 1e-9);
        // sample 0: |p|=2 |t|=1 tp=1 -> f1 = 2/3; sample 1: nothing predicted -> 0
        assert!((metrics.samples.f1 - 1.0 / 3.0).abs() < 1e-9);
        assert!((metrics.samples.precision - 0.25).abs() < 1e-9);
        assert!((metrics.samples.recall - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_predictions() {
        let metrics = MultiLabelMetrics::from_predictions(&[], &[], 4);
        assert_eq!(metrics.total_samples, 0);
        assert_eq!(metrics.num_classes, 4);
        assert_eq!(metrics.f1_macro(), 0.0);
    }

    #[test]
    fn test_classification_report_rows() {
        let preds = rows(&[&[1, 0], &[0, 1]]);
        let truth = rows(&[&[1, 0], &[1, 1]]);
        let metrics = MultiLabelMetrics::from_predictions(&preds, &truth, 2)
            .with_class_names(&["dress".to_string(), "shoe".to_string()]);

        let report = metrics.classification_report();
        assert!(report.contains("precision"));
        assert!(report.contains("dress"));
        assert!(report.contains("shoe"));
        for row in ["micro avg", "macro avg", "weighted avg", "samples avg"] {
            assert!(report.contains(row), "missing row {}", row);
        }
    }

    #[test]
    fn test_running_average() {
        let mut avg = RunningAverage::new();
        avg.add(1.0);
        avg.add(2.0);
        avg.add(3.0);

        assert_eq!(avg.count(), 3);
        assert!((avg.average() - 2.0).abs() < 1e-9);
        assert!((avg.sum() - 6.0).abs() < 1e-9);
    }
}
