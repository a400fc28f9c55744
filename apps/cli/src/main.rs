//! Hourglass CLI - configuration-driven training for stacked hourglass
//! pose-estimation networks.
//!
//! `hourglass train` runs the full data → dataset → model → train pipeline
//! described by a configuration document; `hourglass check` validates a
//! document and reports the resolved plan without running anything.

use anyhow::Context;
use clap::{Parser, Subcommand};
use hourglass_config::{load_config, RunConfig, ValueOrRef};
use hourglass_pipeline::{HandlerRegistries, Manager};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Hourglass - configuration-driven pose-estimation training
#[derive(Parser, Debug)]
#[command(
    name = "hourglass",
    version,
    about = "Configuration-driven training for stacked hourglass networks"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full training pipeline from a configuration document
    Train {
        /// Path to the run configuration (.yaml, .toml or .json)
        #[arg(short, long)]
        config: PathBuf,

        /// Suppress per-epoch progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate a configuration and print the resolved plan without running
    Check {
        /// Path to the run configuration (.yaml, .toml or .json)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = init_tracing(&args.log_level) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let result = match args.command {
        Command::Train { config, quiet } => train(&config, quiet),
        Command::Check { config } => check(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let level = Level::from_str(log_level).unwrap_or(Level::INFO);
    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn train(config_path: &Path, quiet: bool) -> anyhow::Result<()> {
    let mut manager = Manager::from_file(config_path, !quiet)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let summary = manager.run()?;

    println!("run {} finished", summary.report.run_id);
    println!(
        "  records: {} (train {}, validation {}, test {})",
        summary.metadata.record_count,
        summary.metadata.split_counts.train,
        summary.metadata.split_counts.validation,
        summary.metadata.split_counts.test,
    );
    if let Some(model) = &summary.model {
        println!(
            "  model: {} ({} stages, {} channels, {} parameters)",
            model.name, model.stages, model.output_channels, model.parameters
        );
    }
    if let Some(loss) = summary.report.metrics.train_loss {
        println!("  train loss: {loss:.6}");
    }
    for (name, value) in &summary.report.metrics.validation {
        println!("  validation {name}: {value:.6}");
    }
    for (name, value) in &summary.report.metrics.test {
        println!("  test {name}: {value:.6}");
    }
    println!("  checkpoint: {}", summary.report.checkpoint_path.display());
    Ok(())
}

fn check(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    verify_references(&config)?;

    println!("configuration ok: {}", config_path.display());
    println!("  data:    {}", config.data.object.source);
    println!("  dataset: {} (image {}, heatmap {})",
        config.dataset.object.source, config.dataset.image_size, config.dataset.heatmap.size);
    println!(
        "  model:   {} ({}, {} stages, {} -> {}, {} channels)",
        config.model.object.source,
        config.model.params.name,
        config.model.params.stages,
        config.model.params.input_size,
        config.model.params.output_size,
        config.model.params.output_channels,
    );
    println!(
        "  train:   {} ({} epochs, batch {}, optimizer {}, loss {})",
        config.train.object.source,
        config.train.epochs,
        config.train.batch_size,
        describe(&config.train.optimizer),
        describe(&config.train.loss),
    );
    Ok(())
}

/// Checks every object reference against the built-in registries so a typo
/// fails here instead of mid-run.
fn verify_references(config: &RunConfig) -> anyhow::Result<()> {
    let registries = HandlerRegistries::builtin();
    let sections = [
        ("data", &config.data.object.source, registries.data.contains(&config.data.object.source)),
        (
            "dataset",
            &config.dataset.object.source,
            registries.dataset.contains(&config.dataset.object.source),
        ),
        (
            "model",
            &config.model.object.source,
            registries.model.contains(&config.model.object.source),
        ),
        (
            "train",
            &config.train.object.source,
            registries.train.contains(&config.train.object.source),
        ),
    ];
    for (section, source, known) in sections {
        anyhow::ensure!(known, "unknown object reference `{source}` in the {section} section");
    }
    for metric in &config.train.metrics {
        anyhow::ensure!(
            registries.training.metrics.contains(&metric.source),
            "unknown object reference `{}` in train.metrics",
            metric.source
        );
    }
    Ok(())
}

fn describe(value: &ValueOrRef<String>) -> String {
    match value {
        ValueOrRef::Value(name) => name.clone(),
        ValueOrRef::Reference(reference) => reference.source.clone(),
    }
}
