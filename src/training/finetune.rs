//! End-to-end fine-tuning run
//!
//! Wires the label table, split, sampler, model and trainer together and
//! writes the run's artifacts (checkpoint, loss plot, history) to the output
//! directory.

use burn::{
    data::dataset::Dataset,
    optim::AdamWConfig,
    tensor::backend::AutodiffBackend,
};
use colored::Colorize;
use tracing::{info, warn};

use crate::dataset::{
    DatasetSplit, LabelTable, MultiLabelImageDataset, WeightedRandomSampler,
};
use crate::model::{load_pretrained_backbone, VisionTransformer};
use crate::training::checkpoint::CheckpointMetadata;
use crate::training::history::TrainingHistory;
use crate::training::trainer::Trainer;
use crate::training::TrainingConfig;
use crate::utils::charts::generate_loss_chart;
use crate::utils::error::Result;
use crate::utils::format_number;

/// What a finished run leaves behind
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub history: TrainingHistory,
    /// Snapshot on disk, if any epoch improved macro-F1
    pub best: Option<CheckpointMetadata>,
    /// "Best Validation F1 Macro: x (Epoch n)"
    pub summary: String,
}

/// Run the whole fine-tuning pipeline
///
/// # Type Parameters
/// * `B` - The autodiff backend to use (e.g., `Autodiff<NdArray>` or `Autodiff<Cuda>`)
pub fn run_finetuning<B>(config: &TrainingConfig, device: B::Device) -> Result<TrainingOutcome>
where
    B: AutodiffBackend,
{
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir)?;

    println!("{}", "Loading Dataset...".cyan());
    let table = LabelTable::from_csv(&config.label_file)?;
    table.ensure_num_classes(config.model.num_classes)?;

    let split = DatasetSplit::new(&table.records, config.validation_fraction, config.seed)?;
    println!("  🏷️  Training samples:   {}", format_number(split.train.len()));
    println!("  ✅ Validation samples: {}", format_number(split.validation.len()));

    let mut sampler =
        WeightedRandomSampler::from_records(&split.train, config.model.num_classes, config.seed)?;

    let image_size = config.model.image_size;
    let train = MultiLabelImageDataset::with_image_size(split.train, &config.image_dir, image_size);
    let validation =
        MultiLabelImageDataset::with_image_size(split.validation, &config.image_dir, image_size);

    println!("{}", "Creating Model...".cyan());
    let model: VisionTransformer<B> = config.model.init(&device);
    let model = match &config.pretrained_weights {
        Some(path) => load_pretrained_backbone(model, path, &device)?,
        None => {
            warn!("No pretrained weights configured, training from scratch");
            model
        }
    };

    let optimizer = AdamWConfig::new()
        .with_weight_decay(config.weight_decay as f32)
        .init();

    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  🔄 Epochs:            {}", config.epochs);
    println!("  📦 Batch size:        {}", config.batch_size);
    println!("  🧵 Workers:           {}", config.num_workers);
    println!("  📈 Learning rate:     {:.0e}", config.learning_rate);
    println!("  🧠 Device:            {:?}", device);
    println!();

    info!(
        "Training on {} records, validating on {}",
        train.len(),
        validation.len()
    );

    let mut trainer = Trainer::new(model, optimizer, config.clone(), device)?;
    let history = trainer
        .fit(&train, &validation, &mut sampler, &table.classes)?
        .clone();

    let history_path = config.history_path();
    history.save(&history_path)?;
    info!("Training history written to {:?}", history_path);

    let plot_path = config.plot_path();
    generate_loss_chart(&history.train_losses(), &history.val_losses(), &plot_path)?;
    info!("Loss plot written to {:?}", plot_path);

    let summary = trainer.checkpoint().summary();
    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  🎉 {}", summary);

    Ok(TrainingOutcome {
        history,
        best: trainer.checkpoint().best().cloned(),
        summary,
    })
}
