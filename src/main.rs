mod artifacts;
mod dataset;
mod domain;
mod encoder;
mod error;
mod forest;
mod formulas;
mod plan;
mod predictor;
mod server;
mod trainer;
mod wizard;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};

use crate::artifacts::save_artifacts;
use crate::dataset::{Dataset, load_dataset};
use crate::domain::{FEATURE_COLUMNS, TARGET_COLUMNS};
use crate::forest::ForestConfig;
use crate::predictor::Predictor;
use crate::server::AppState;
use crate::trainer::TrainingReport;

/// Personal fitness planner backed by a random forest regressor.
#[derive(Parser, Debug)]
#[command(name = "fitmate")]
#[command(about = "Fitness plan questionnaire with random forest predictions")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the model on a dataset and write the artifacts.
    Train {
        /// CSV or XLSX file with the fitness dataset.
        /// Can also be set via FITMATE_DATASET environment variable.
        #[arg(value_name = "DATASET", env = "FITMATE_DATASET")]
        dataset: PathBuf,

        /// Directory the model and encoder files are written to.
        #[arg(long, env = "FITMATE_ARTIFACT_DIR", default_value = ".")]
        out_dir: PathBuf,
    },

    /// Serve the questionnaire using previously trained artifacts.
    Serve {
        /// Directory holding fitness_model.json and label_encoders.json.
        #[arg(long, env = "FITMATE_ARTIFACT_DIR", default_value = ".")]
        artifact_dir: PathBuf,

        /// Port number for the web server.
        #[arg(long, env = "FITMATE_PORT", default_value = "8080")]
        port: u16,

        /// Directory with the frontend files.
        #[arg(long, env = "FITMATE_STATIC_DIR", default_value = "static")]
        static_dir: PathBuf,

        /// Minutes of inactivity after which a session is discarded.
        #[arg(long, env = "FITMATE_SESSION_TTL_MINUTES", default_value = "120")]
        session_ttl_minutes: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Command::Train { dataset, out_dir } => run_train(&dataset, &out_dir),
        Command::Serve {
            artifact_dir,
            port,
            static_dir,
            session_ttl_minutes,
        } => {
            let session_ttl = Duration::minutes(i64::from(session_ttl_minutes));
            run_serve(&artifact_dir, port, static_dir, session_ttl).await
        }
    }
}

/// Loads the dataset, fits the forest and writes both artifacts.
fn run_train(dataset_path: &Path, out_dir: &Path) -> Result<()> {
    println!("Loading dataset from: {}", dataset_path.display());
    let dataset = load_dataset(dataset_path)
        .with_context(|| format!("Failed to load dataset from {}", dataset_path.display()))?;
    print_dataset_summary(&dataset);

    println!();
    println!("=== Training Random Forest ===");
    let report = trainer::train(&dataset, ForestConfig::default())
        .context("Failed to train the model")?;
    print_training_summary(&report);

    let (model_path, encoders_path) = save_artifacts(out_dir, &report.model, &dataset.encoders)
        .context("Failed to save artifacts")?;

    println!();
    println!("Model saved to: {}", model_path.display());
    println!("Encoders saved to: {}", encoders_path.display());

    Ok(())
}

/// Loads the artifacts once and starts the web server.
async fn run_serve(
    artifact_dir: &Path,
    port: u16,
    static_dir: PathBuf,
    session_ttl: Duration,
) -> Result<()> {
    let predictor = Predictor::load(artifact_dir).with_context(|| {
        format!(
            "Failed to load model artifacts from {}",
            artifact_dir.display()
        )
    })?;

    let model = predictor.model();
    println!(
        "Loaded model: {} trees, trained {} on {} rows, {} encoded columns",
        model.forest.trees().len(),
        model.trained_at.format("%Y-%m-%d %H:%M"),
        model.n_train,
        predictor.encoders().iter().count()
    );

    let static_dir = find_static_dir(static_dir);
    println!("Static files: {}", static_dir.display());

    let state = Arc::new(AppState::new(Arc::new(predictor), session_ttl));
    server::run_server(state, port, static_dir).await?;

    Ok(())
}

fn print_dataset_summary(dataset: &Dataset) {
    println!();
    println!("=== Dataset Summary ===");
    println!();
    println!("Rows: {}", dataset.n_rows());
    println!("Features: {}", FEATURE_COLUMNS.len());
    println!("Targets: {}", TARGET_COLUMNS.join(", "));
    println!();

    for encoder in dataset.encoders.iter() {
        println!(
            "{:18} {:2} labels  ({})",
            encoder.column(),
            encoder.classes().len(),
            encoder.classes().join(", ")
        );
    }
}

fn print_training_summary(report: &TrainingReport) {
    let forest = &report.model.forest;
    let trees = forest.trees();
    let count = trees.len().max(1) as f64;
    let mean_depth = trees.iter().map(|t| t.depth()).sum::<usize>() as f64 / count;
    let mean_nodes = trees.iter().map(|t| t.node_count()).sum::<usize>() as f64 / count;

    println!(
        "Trained on {} rows, evaluated on {} rows",
        report.n_train, report.n_test
    );
    println!(
        "{} trees (seed {}), mean depth {:.1}, mean {:.0} nodes",
        forest.config().n_estimators,
        forest.config().seed,
        mean_depth,
        mean_nodes
    );

    if report.metrics.is_empty() {
        println!("No rows held out; skipping evaluation");
        return;
    }

    println!();
    for metric in &report.metrics {
        let r2 = metric
            .r2
            .map(|r2| format!("{:.3}", r2))
            .unwrap_or_else(|| "n/a".to_string());
        println!("{:18} MAE {:8.2}  R² {}", metric.target, metric.mae, r2);
    }
}

/// Resolves the static directory against the working directory, then the
/// executable's directory.
fn find_static_dir(requested: PathBuf) -> PathBuf {
    if requested.is_dir() || requested.is_absolute() {
        return requested;
    }

    if let Ok(exe_path) = std::env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        let exe_static = exe_dir.join(&requested);
        if exe_static.is_dir() {
            return exe_static;
        }
    }

    requested
}
