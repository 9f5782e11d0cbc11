//! Fine-tuning loop for the multi-label ViT
//!
//! The trainer owns the model, the optimizer and everything that changes
//! between epochs: scheduler, best checkpoint and history. One epoch walks
//! through the phases
//!
//! `EpochStart -> TrainingBatch* -> ValidationBatch* -> CheckpointDecision -> EpochEnd`
//!
//! and the run ends in `Finished` after the configured number of epochs.
//! Images for each batch are decoded on a dedicated rayon pool.

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::AutodiffModule,
    nn::loss::BinaryCrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    tensor::{activation::sigmoid, backend::AutodiffBackend, ElementConversion},
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::dataset::{
    MultiLabelBatch, MultiLabelBatcher, MultiLabelImageDataset, WeightedRandomSampler,
};
use crate::model::VisionTransformer;
use crate::training::checkpoint::BestCheckpoint;
use crate::training::history::{EpochRecord, TrainingHistory};
use crate::training::scheduler::ReduceLROnPlateau;
use crate::training::TrainingConfig;
use crate::utils::error::{Result, VitError};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::{threshold_probabilities, MultiLabelMetrics, RunningAverage};

/// Where the trainer is within the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    EpochStart,
    TrainingBatch,
    ValidationBatch,
    CheckpointDecision,
    EpochEnd,
    Finished,
}

fn progress_bar(len: usize, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_prefix(prefix.to_string());
    pb
}

/// Trainer for the VisionTransformer
pub struct Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<VisionTransformer<B>, B>,
{
    /// Model being trained
    pub model: VisionTransformer<B>,
    optimizer: O,
    config: TrainingConfig,
    scheduler: ReduceLROnPlateau,
    checkpoint: BestCheckpoint,
    history: TrainingHistory,
    phase: TrainingPhase,
    phases: Vec<TrainingPhase>,
    epoch: usize,
    batcher: MultiLabelBatcher,
    pool: ThreadPool,
    device: B::Device,
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<VisionTransformer<B>, B>,
{
    /// Create a new trainer with the given model, optimizer and configuration
    pub fn new(
        model: VisionTransformer<B>,
        optimizer: O,
        config: TrainingConfig,
        device: B::Device,
    ) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.num_workers)
            .build()
            .map_err(|e| VitError::Config(format!("failed to build worker pool: {}", e)))?;

        Ok(Self {
            model,
            optimizer,
            scheduler: ReduceLROnPlateau::new(config.plateau.clone(), config.learning_rate),
            checkpoint: BestCheckpoint::new(&config.output_dir, &config.checkpoint_name),
            history: TrainingHistory::new(),
            phase: TrainingPhase::EpochStart,
            phases: Vec::new(),
            epoch: 0,
            batcher: MultiLabelBatcher::new(config.model.image_size, config.model.num_classes),
            pool,
            device,
            config,
        })
    }

    fn enter(&mut self, phase: TrainingPhase) {
        debug!("Phase {:?}", phase);
        self.phase = phase;
        self.phases.push(phase);
    }

    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    /// Every phase entered so far, in order
    pub fn phases(&self) -> &[TrainingPhase] {
        &self.phases
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn checkpoint(&self) -> &BestCheckpoint {
        &self.checkpoint
    }

    pub fn learning_rate(&self) -> f64 {
        self.scheduler.get_lr()
    }

    /// Train for one epoch over indices drawn by `sampler`
    ///
    /// Returns the summed batch losses divided by the number of training records.
    pub fn train_epoch(
        &mut self,
        dataset: &MultiLabelImageDataset,
        sampler: &mut WeightedRandomSampler,
    ) -> Result<f64> {
        self.enter(TrainingPhase::TrainingBatch);

        let indices = sampler.sample_epoch();
        let num_batches = indices.len().div_ceil(self.config.batch_size);
        let lr = self.scheduler.get_lr();
        let loss_fn = BinaryCrossEntropyLossConfig::new()
            .with_logits(true)
            .init::<B>(&self.device);

        let pb = progress_bar(num_batches, "train");
        let mut running = RunningAverage::new();

        for batch_indices in indices.chunks(self.config.batch_size) {
            let items = dataset.load_parallel(batch_indices, &self.pool)?;
            let batch: MultiLabelBatch<B> = self.batcher.batch(items, &self.device);

            let logits = self.model.forward(batch.images);
            let loss = loss_fn.forward(logits, batch.targets);
            let loss_value: f64 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self.optimizer.step(lr, self.model.clone(), grads);

            running.add(loss_value);
            pb.set_message(format!("loss {:.4}", running.average()));
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(running.sum() / dataset.len().max(1) as f64)
    }

    /// Evaluate on the validation partition without gradients
    ///
    /// The returned metrics carry the loss, normalised like the training loss.
    pub fn validate_epoch(&mut self, dataset: &MultiLabelImageDataset) -> Result<MultiLabelMetrics> {
        self.enter(TrainingPhase::ValidationBatch);

        let model = self.model.valid();
        let num_classes = self.config.model.num_classes;
        let loss_fn = BinaryCrossEntropyLossConfig::new()
            .with_logits(true)
            .init::<B::InnerBackend>(&self.device);

        let indices: Vec<usize> = (0..dataset.len()).collect();
        let pb = progress_bar(indices.len().div_ceil(self.config.batch_size), "valid");

        let mut loss_sum = 0.0f64;
        let mut predictions = Vec::with_capacity(indices.len());
        let mut ground_truth = Vec::with_capacity(indices.len());

        for batch_indices in indices.chunks(self.config.batch_size) {
            let items = dataset.load_parallel(batch_indices, &self.pool)?;
            ground_truth.extend(items.iter().map(|item| item.target.clone()));

            let batch: MultiLabelBatch<B::InnerBackend> = self.batcher.batch(items, &self.device);
            let logits = model.forward(batch.images);

            let loss: f64 = loss_fn
                .forward(logits.clone(), batch.targets)
                .into_scalar()
                .elem();
            loss_sum += loss;

            let probs = sigmoid(logits)
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| VitError::Model(format!("failed to read predictions: {:?}", e)))?;
            predictions.extend(threshold_probabilities(&probs, num_classes, self.config.threshold));

            pb.inc(1);
        }
        pb.finish_and_clear();

        let mut metrics = MultiLabelMetrics::from_predictions(&predictions, &ground_truth, num_classes);
        metrics.loss = Some(loss_sum / dataset.len().max(1) as f64);
        Ok(metrics)
    }

    /// Run one full epoch; returns its history record
    pub fn run_epoch(
        &mut self,
        train: &MultiLabelImageDataset,
        validation: &MultiLabelImageDataset,
        sampler: &mut WeightedRandomSampler,
        logger: &mut TrainingLogger,
        class_names: &[String],
    ) -> Result<EpochRecord> {
        self.enter(TrainingPhase::EpochStart);
        logger.start_epoch(self.epoch);
        println!(
            "{}",
            format!("Epoch {}/{}", self.epoch + 1, self.config.epochs)
                .yellow()
                .bold()
        );

        let lr = self.scheduler.get_lr();
        let train_loss = self.train_epoch(train, sampler)?;
        let metrics = self.validate_epoch(validation)?.with_class_names(class_names);
        let val_loss = metrics.loss.unwrap_or_default();

        println!(
            "  {} Train Loss: {:.4} | Val Loss: {:.4} | Accuracy: {:.4} | F1 Micro: {:.4} | F1 Macro: {:.4}",
            "→".cyan(),
            train_loss,
            val_loss,
            metrics.accuracy,
            metrics.f1_micro(),
            metrics.f1_macro()
        );
        for (i, f1) in metrics.per_class_f1().iter().enumerate() {
            println!("    Class {}: {:.4}", i + 1, f1);
        }
        println!("{}", metrics.classification_report());

        self.enter(TrainingPhase::CheckpointDecision);
        // 1-based epoch in the sidecar and the final report
        let epoch_number = self.epoch + 1;
        if self
            .checkpoint
            .observe(&self.model, epoch_number, &metrics, lr)?
        {
            logger.log_new_best(metrics.f1_macro());
            println!("  {}", "New best model saved".green());
        }
        self.scheduler.step(metrics.f1_macro());

        self.enter(TrainingPhase::EpochEnd);
        logger.end_epoch(train_loss, metrics.f1_macro(), lr);

        let record = EpochRecord {
            epoch: epoch_number,
            train_loss,
            val_loss,
            accuracy: metrics.accuracy,
            f1_micro: metrics.f1_micro(),
            f1_macro: metrics.f1_macro(),
            learning_rate: lr,
        };
        self.history.push(record.clone());
        self.epoch += 1;

        debug!("Epoch {} finished, next lr {:.2e}", epoch_number, self.scheduler.get_lr());
        Ok(record)
    }

    /// Run all configured epochs
    pub fn fit(
        &mut self,
        train: &MultiLabelImageDataset,
        validation: &MultiLabelImageDataset,
        sampler: &mut WeightedRandomSampler,
        class_names: &[String],
    ) -> Result<&TrainingHistory> {
        let mut logger = TrainingLogger::new(self.config.epochs);

        while self.epoch < self.config.epochs {
            self.run_epoch(train, validation, sampler, &mut logger, class_names)?;
        }

        self.enter(TrainingPhase::Finished);
        logger.log_complete(self.checkpoint.best_f1_macro());
        Ok(&self.history)
    }
}
