//! ViT Multi-Label Fine-Tuning CLI
//!
//! Entry point for fine-tuning a pretrained ViT-B/16 on a multi-label image
//! dataset. Running the binary without a subcommand trains with the default
//! paths and hyperparameters.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use vit_multilabel::backend::{backend_name, default_device, TrainingBackend};
use vit_multilabel::dataset::{DatasetSplit, DatasetStats, LabelTable};
use vit_multilabel::training::{run_finetuning, TrainingConfig};
use vit_multilabel::utils::format_duration;
use vit_multilabel::utils::logging::{init_logging, LogConfig, LogLevel};

/// Multi-label image classification with a fine-tuned Vision Transformer
#[derive(Parser, Debug)]
#[command(name = "vit_multilabel")]
#[command(version)]
#[command(about = "Fine-tune ViT-B/16 for multi-label classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false", global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Subcommand to execute (defaults to `train`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fine-tune the model
    Train(TrainArgs),

    /// Show label distribution, class weights and split sizes
    Stats {
        /// CSV label file
        #[arg(long)]
        label_file: Option<PathBuf>,

        /// Load settings from a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Overrides for the training configuration
#[derive(Args, Debug, Default)]
struct TrainArgs {
    /// Load settings from a JSON config file (flags below override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV label file with ImageId and Category columns
    #[arg(long)]
    label_file: Option<PathBuf>,

    /// Directory containing the images
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Output directory for checkpoint, plot and history
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Pretrained PyTorch checkpoint of the backbone
    #[arg(long)]
    pretrained: Option<PathBuf>,

    /// Train from scratch instead of loading pretrained weights
    #[arg(long, default_value = "false")]
    no_pretrained: bool,

    /// Number of training epochs
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Batch size for training
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Learning rate
    #[arg(short, long)]
    learning_rate: Option<f64>,

    /// Image decoding threads
    #[arg(long)]
    num_workers: Option<usize>,

    /// Random seed for split and sampler
    #[arg(long)]
    seed: Option<u64>,
}

impl TrainArgs {
    fn into_config(self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::load(path)
                .with_context(|| format!("failed to load config {:?}", path))?,
            None => TrainingConfig::default(),
        };

        if let Some(v) = self.label_file {
            config.label_file = v;
        }
        if let Some(v) = self.image_dir {
            config.image_dir = v;
        }
        if let Some(v) = self.output_dir {
            config.output_dir = v;
        }
        if let Some(v) = self.pretrained {
            config.pretrained_weights = Some(v);
        }
        if self.no_pretrained {
            config.pretrained_weights = None;
        }
        if let Some(v) = self.epochs {
            config.epochs = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        if let Some(v) = self.num_workers {
            config.num_workers = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let log_config = match cli.log_level {
        Some(level) => log_config.with_level(level),
        None => log_config,
    };

    let _ = init_logging(&log_config);

    print_banner();

    match cli.command.unwrap_or(Commands::Train(TrainArgs::default())) {
        Commands::Train(args) => cmd_train(args.into_config()?)?,
        Commands::Stats { label_file, config } => cmd_stats(label_file, config)?,
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════════════════╗
 ║   ViT Multi-Label Fine-Tuning                                    ║
 ║   ViT-B/16 + Burn + Rust                                         ║
 ╚══════════════════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn cmd_train(config: TrainingConfig) -> Result<()> {
    info!("Backend: {}", backend_name());
    info!("Label file: {:?}", config.label_file);
    info!("Image directory: {:?}", config.image_dir);

    let start = std::time::Instant::now();
    let outcome = run_finetuning::<TrainingBackend>(&config, default_device())
        .context("fine-tuning failed")?;

    println!(
        "  ⏱️  Total time: {}",
        format_duration(start.elapsed().as_secs_f64())
    );
    println!("  💾 Outputs in: {:?}", config.output_dir);
    info!("{}", outcome.summary);

    Ok(())
}

fn cmd_stats(label_file: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let mut config = match config {
        Some(path) => TrainingConfig::load(&path)?,
        None => TrainingConfig::default(),
    };
    if let Some(path) = label_file {
        config.label_file = path;
    }

    info!("Computing dataset statistics for: {:?}", config.label_file);

    let table = LabelTable::from_csv(&config.label_file)?;
    if let Err(e) = table.ensure_num_classes(config.model.num_classes) {
        println!("{} {}", "Warning:".yellow(), e);
    }

    let split = DatasetSplit::new(&table.records, config.validation_fraction, config.seed)?;
    DatasetStats::new(&table, &split).print();

    Ok(())
}
