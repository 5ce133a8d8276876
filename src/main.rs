//! rul-pipeline - Remaining Useful Life evaluation pipeline
//!
//! Loads run-to-failure trajectories, prepares leakage-free scaled windows,
//! trains the linear baseline and writes an evaluation report.
//!
//! # Usage
//!
//! ```bash
//! # C-MAPSS training file with default settings
//! rul-pipeline --data train_FD001.txt --format cmapss
//!
//! # One CSV per unit, custom config, keep the scaled tensors
//! rul-pipeline --data units/ --format directory --config rul_config.toml --save-tensors
//!
//! # Write the default config for editing
//! rul-pipeline init-config rul_config.toml
//! ```
//!
//! # Environment Variables
//!
//! - `RUL_CONFIG`: Config file used when `--config` is not given
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use rul_pipeline::config::PipelineConfig;
use rul_pipeline::ingest::{DataSource, TrajectoryStore};
use rul_pipeline::model::LinearRulModel;
use rul_pipeline::pipeline::RulPipeline;
use rul_pipeline::report::save_tensor;
use rul_pipeline::types::Split;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "rul-pipeline")]
#[command(about = "Remaining Useful Life data pipeline and evaluation")]
#[command(version)]
struct CliArgs {
    /// Pipeline config (TOML). Falls back to $RUL_CONFIG, ./rul_config.toml, defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run-to-failure data: a file or a directory depending on --format
    #[arg(short, long, value_name = "PATH")]
    data: Option<PathBuf>,

    /// Input layout
    #[arg(long, value_enum, default_value_t = InputFormat::Table)]
    format: InputFormat,

    /// Override the output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Also write the scaled window tensors of every split
    #[arg(long)]
    save_tensors: bool,

    /// Override the split seed
    #[arg(long, env = "RUL_SPLIT_SEED")]
    seed: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Write the default configuration to a TOML file
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum InputFormat {
    /// One CSV with a unit column
    Table,
    /// A directory of per-unit CSV files
    Directory,
    /// Whitespace-separated C-MAPSS text
    Cmapss,
}

impl InputFormat {
    fn source(self, path: PathBuf) -> DataSource {
        match self {
            Self::Table => DataSource::Table(path),
            Self::Directory => DataSource::Directory(path),
            Self::Cmapss => DataSource::Cmapss(path),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    if let Some(SubCommand::InitConfig { path }) = &args.command {
        PipelineConfig::default()
            .save_to_file(path)
            .with_context(|| format!("writing default config to {}", path.display()))?;
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::load().context("loading pipeline config")?,
    };
    if let Some(seed) = args.seed {
        config.split.seed = seed;
    }
    if let Some(dir) = &args.output {
        config.output.dir.clone_from(dir);
    }
    config.output.save_tensors |= args.save_tensors;

    let pipeline = RulPipeline::new(config).context("invalid pipeline configuration")?;
    let config = pipeline.config();

    let data = args
        .data
        .context("--data is required to run the pipeline")?;
    let source = args.format.source(data);
    let store = TrajectoryStore::load(&source, &config.ingestion)
        .with_context(|| format!("loading trajectories from {}", source.path().display()))?;

    let model = LinearRulModel::new(config.model.clone());
    let (prepared, report) = pipeline.run(&store, &model).context("pipeline run failed")?;

    let out_dir = &config.output.dir;
    let report_path = report
        .save(out_dir)
        .with_context(|| format!("writing report to {}", out_dir.display()))?;
    if config.output.save_tensors {
        for split in Split::ALL {
            save_tensor(prepared.tensor(split), split, out_dir)
                .with_context(|| format!("writing {split} tensor"))?;
        }
    }

    for split in [Split::Validation, Split::Test] {
        match report.evaluation(split) {
            Some(eval) => info!(
                split = %split,
                rmse = eval.score.rmse,
                mae = eval.score.mae,
                score = eval.score.score,
                windows = eval.score.count,
                "Evaluation"
            ),
            None => info!(split = %split, "Not scored (no windows)"),
        }
    }
    info!(report = %report_path.display(), "Done");
    Ok(())
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
