//! CLI entry point for crop yield model training and prediction.

use agri_learning::{
    DEFAULT_MODEL_PATH, ForestParams, InferenceService, LearningError, Trainer, TrainingConfig,
    TrainingReport,
};
use agri_processing::{
    CategoricalCodeTable, MissingValuePolicy, PreprocessingConfig, Preprocessor, read_csv,
};
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Environment variable overriding the default model path.
const MODEL_PATH_ENV: &str = "AGRI_MODEL_PATH";

/// CLI-compatible missing value policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMissingPolicy {
    /// Fail if any cell is missing
    Reject,
    /// Drop rows with missing cells
    DropRows,
    /// Fill numeric columns with the median and text columns with the mode
    Impute,
}

impl From<CliMissingPolicy> for MissingValuePolicy {
    fn from(cli: CliMissingPolicy) -> Self {
        match cli {
            CliMissingPolicy::Reject => MissingValuePolicy::Reject,
            CliMissingPolicy::DropRows => MissingValuePolicy::DropRows,
            CliMissingPolicy::Impute => MissingValuePolicy::Impute,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Crop yield random forest: train and predict",
    long_about = "Trains a random forest regressor on crop survey data and serves predictions.\n\n\
                  EXAMPLES:\n  \
                  # Train on a survey export and write the model\n  \
                  agri-learning train --data survey.csv --model models/random_forest_model.json\n\n  \
                  # Score raw form rows with a trained model\n  \
                  agri-learning predict --input rows.csv --raw"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable output
    ///
    /// Disables all progress logs.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model and write the artifact
    Train {
        /// Training data (CSV with header)
        #[arg(short, long)]
        data: PathBuf,

        /// Output model path (default: $AGRI_MODEL_PATH or models/random_forest_model.json)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Target column name
        #[arg(short, long, default_value = "standard_yield")]
        target: String,

        /// Fraction of rows held out for evaluation
        #[arg(long, default_value_t = 0.3)]
        test_size: f64,

        /// Seed for the split and the forest
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of trees
        #[arg(long, default_value_t = 200)]
        n_estimators: usize,

        /// Maximum tree depth
        #[arg(long, default_value_t = 20, conflicts_with = "unlimited_depth")]
        max_depth: usize,

        /// Grow trees without a depth limit
        #[arg(long)]
        unlimited_depth: bool,

        /// Minimum samples to split a node
        #[arg(long, default_value_t = 2)]
        min_samples_split: usize,

        /// Minimum samples per leaf
        #[arg(long, default_value_t = 1)]
        min_samples_leaf: usize,

        /// Categorical columns to encode (comma separated)
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "soil_type,crop_type,location"
        )]
        categorical: Vec<String>,

        /// What to do with missing cells
        #[arg(long, value_enum, default_value = "reject")]
        missing_policy: CliMissingPolicy,

        /// Encode with the fixed survey form vocabulary instead of learning codes
        #[arg(long)]
        survey_codes: bool,
    },

    /// Predict with a trained model
    Predict {
        /// Model path (default: $AGRI_MODEL_PATH or models/random_forest_model.json)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Rows to score (CSV with header)
        #[arg(short, long)]
        input: PathBuf,

        /// Rows hold raw form values: normalize headers, encode categories
        /// with the model's code table and ignore extra columns
        #[arg(long)]
        raw: bool,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    dotenv().ok();

    match &cli.command {
        Command::Train {
            data,
            model,
            target,
            test_size,
            seed,
            n_estimators,
            max_depth,
            unlimited_depth,
            min_samples_split,
            min_samples_leaf,
            categorical,
            missing_policy,
            survey_codes,
        } => {
            let mut params = ForestParams::builder()
                .n_estimators(*n_estimators)
                .max_depth(*max_depth)
                .min_samples_split(*min_samples_split)
                .min_samples_leaf(*min_samples_leaf)
                .seed(*seed);
            if *unlimited_depth {
                params = params.unlimited_depth();
            }
            let params = params.build().map_err(|e| report_error(&cli, e))?;

            let config = TrainingConfig::builder()
                .target_column(target)
                .test_size(*test_size)
                .random_seed(*seed)
                .forest(params)
                .build()
                .map_err(|e| report_error(&cli, e))?;

            let preprocessing = PreprocessingConfig::builder()
                .categorical_columns(categorical.iter().filter(|c| !c.trim().is_empty()))
                .missing_policy((*missing_policy).into())
                .target_column(target)
                .build()?;

            let model_path = resolve_model_path(model.as_ref());
            let code_table = survey_codes.then(CategoricalCodeTable::survey_defaults);

            let report = train(data, &model_path, preprocessing, code_table, &config)
                .map_err(|e| report_error(&cli, e))?;
            print_training_report(&report, &cli)
        }
        Command::Predict { model, input, raw } => {
            let model_path = resolve_model_path(model.as_ref());
            let predictions =
                predict(&model_path, input, *raw).map_err(|e| report_error(&cli, e))?;
            print_predictions(&predictions, &cli)
        }
    }
}

/// Model path from the command line, else the environment, else the default.
fn resolve_model_path(arg: Option<&PathBuf>) -> PathBuf {
    arg.cloned()
        .or_else(|| std::env::var(MODEL_PATH_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH))
}

/// Preprocess the raw dataset, then run the full training sequence.
fn train(
    data: &Path,
    model_path: &Path,
    preprocessing: PreprocessingConfig,
    code_table: Option<CategoricalCodeTable>,
    config: &TrainingConfig,
) -> Result<TrainingReport, LearningError> {
    info!("Loading dataset from: {}", data.display());
    let raw = read_csv(data)?;

    let dataset = Preprocessor::new(preprocessing)?.run(raw, code_table.as_ref())?;
    info!(
        "Preprocessed dataset: {} rows ({} removed)",
        dataset.data.height(),
        dataset.quality_before.rows.saturating_sub(dataset.data.height())
    );

    Trainer::new(&config.target_column)
        .with_code_table(dataset.code_table)
        .run_frame(dataset.data, model_path, config)
}

fn predict(model_path: &Path, input: &Path, raw: bool) -> Result<Vec<f64>, LearningError> {
    let service = InferenceService::new();
    service.load(model_path)?;

    let rows = read_csv(input)?;
    info!("Scoring {} rows", rows.height());
    if raw {
        service.predict_raw(rows)
    } else {
        service.predict(&rows)
    }
}

/// Log (or, under `--json`, print) a library error and convert it for `main`.
fn report_error(cli: &Cli, err: LearningError) -> anyhow::Error {
    if cli.json {
        if let Ok(json) = serde_json::to_string_pretty(&err) {
            println!("{}", json);
        }
    } else {
        error!("{}", err);
    }
    anyhow!("{} ({})", err, err.error_code())
}

fn print_training_report(report: &TrainingReport, cli: &Cli) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!();
    println!("{}", "=".repeat(80));
    println!("TRAINING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();
    println!("Model: {}", report.model_path);
    println!(
        "Rows:  {} train / {} test",
        report.n_train, report.n_test
    );
    println!("Time:  {:.2}s", report.training_time_seconds);
    println!();
    println!("Metrics (held-out):");
    println!("  r2:  {:.3}", report.metrics.r2);
    println!("  mse: {:.3}", report.metrics.mse);
    println!("  mae: {:.3}", report.metrics.mae);
    println!();
    println!("Top features:");
    for (name, importance) in report.feature_importance.iter().take(5) {
        println!("  {:<30} {:.3}", name, importance);
    }
    println!("{}", "=".repeat(80));
    Ok(())
}

fn print_predictions(predictions: &[f64], cli: &Cli) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "predictions": predictions }))?
        );
        return Ok(());
    }
    for (row, value) in predictions.iter().enumerate() {
        println!("row {}: {:.3}", row, value);
    }
    Ok(())
}
