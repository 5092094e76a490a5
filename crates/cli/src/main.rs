//! Carbon CLI
//!
//! Offline tooling for the emissions estimator: feature engineering,
//! training, artifact inspection and local predictions.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{data, model, predict};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Carbon CLI
#[derive(Parser)]
#[command(name = "carbon")]
#[command(author, version, about = "CLI for the CO2e emissions estimator", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Engineer features from a sensor log and train a model artifact
    Train {
        /// Sensor log CSV, or a cross-sectional table with --table
        #[arg(long, short)]
        input: PathBuf,

        /// Train on a cross-sectional table: every column but the target is
        /// a feature and the split is shuffled (seed 42 unless --shuffle-seed)
        #[arg(long)]
        table: bool,

        /// Target column of a cross-sectional table
        #[arg(long, default_value = "Co2_Emissions_MetricTons")]
        target: String,

        /// Artifact directory
        #[arg(long, short, env = "CARBON_MODEL_DIR", default_value = "models")]
        output: PathBuf,

        /// Regressor to fit
        #[arg(long, default_value = "ridge")]
        estimator: EstimatorArg,

        /// Ridge penalty
        #[arg(long, default_value_t = 1.0)]
        alpha: f64,

        /// Share of rows used for training
        #[arg(long, default_value_t = 0.8)]
        train_fraction: f64,

        /// Shuffle with this seed instead of splitting chronologically
        #[arg(long)]
        shuffle_seed: Option<u64>,
    },

    /// Write the engineered feature frame for a sensor log
    Engineer {
        /// Sensor log CSV
        #[arg(long, short)]
        input: PathBuf,

        /// Engineered CSV (stdout if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Predict emissions for JSON samples with a saved artifact
    Predict {
        /// Artifact directory
        #[arg(long, short, env = "CARBON_MODEL_DIR", default_value = "models")]
        model: PathBuf,

        /// One JSON object or an array of objects
        #[arg(long, short)]
        sample: String,
    },

    /// Show the manifest of a saved artifact
    Inspect {
        /// Artifact directory
        #[arg(long, short, env = "CARBON_MODEL_DIR", default_value = "models")]
        model: PathBuf,
    },

    /// Write an emission-factor artifact for smoke-testing the API
    Dummy {
        /// Artifact directory
        #[arg(long, short, env = "CARBON_MODEL_DIR", default_value = "models")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EstimatorArg {
    Ridge,
    Mean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Train {
            input,
            table,
            target,
            output,
            estimator,
            alpha,
            train_fraction,
            shuffle_seed,
        } => {
            let options = model::TrainOptions {
                estimator,
                alpha,
                train_fraction,
                shuffle_seed,
            };
            if table {
                model::train_table(&input, &target, &output, options, cli.format)?;
            } else {
                model::train(&input, &output, options, cli.format)?;
            }
        }
        Commands::Engineer { input, output } => {
            data::engineer(&input, output.as_deref(), cli.format)?;
        }
        Commands::Predict { model, sample } => {
            predict::predict(&model, &sample, cli.format)?;
        }
        Commands::Inspect { model } => {
            model::inspect(&model, cli.format)?;
        }
        Commands::Dummy { output } => {
            model::dummy(&output, cli.format)?;
        }
    }

    Ok(())
}
