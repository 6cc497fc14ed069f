//! CLI entry point for survey data preprocessing.

use agri_processing::{
    CategoricalCodeTable, MissingValuePolicy, PreprocessedDataset, PreprocessingConfig,
    PreprocessingSummary, Preprocessor, ProcessingError, inspect, normalize_columns, read_csv,
    write_csv,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// CLI-compatible missing value policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMissingPolicy {
    /// Fail if any cell is missing
    Reject,
    /// Drop rows with missing cells
    DropRows,
    /// Fill numeric columns with the median and text columns with the mode
    Impute,
    /// Keep missing cells as they are
    Propagate,
}

impl From<CliMissingPolicy> for MissingValuePolicy {
    fn from(cli: CliMissingPolicy) -> Self {
        match cli {
            CliMissingPolicy::Reject => MissingValuePolicy::Reject,
            CliMissingPolicy::DropRows => MissingValuePolicy::DropRows,
            CliMissingPolicy::Impute => MissingValuePolicy::Impute,
            CliMissingPolicy::Propagate => MissingValuePolicy::Propagate,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Crop survey data preprocessing",
    long_about = "Normalizes column names and categorical values, removes duplicates,\n\
                  handles missing values and encodes categorical columns.\n\n\
                  EXAMPLES:\n  \
                  # Clean a survey export, dropping incomplete rows\n  \
                  agri-processing -i survey.csv --missing-policy drop-rows\n\n  \
                  # Encode with the fixed survey form vocabulary\n  \
                  agri-processing -i survey.csv --survey-codes -o outputs/\n\n  \
                  # Preview without writing anything\n  \
                  agri-processing -i survey.csv --dry-run"
)]
struct Args {
    /// Path to the CSV file to process
    #[arg(short, long)]
    input: String,

    /// Output directory for results
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// Custom output file name (without extension)
    ///
    /// If not specified, uses the input file name
    #[arg(long)]
    output_name: Option<String>,

    /// Column that must be present (the regression target)
    #[arg(short, long)]
    target: Option<String>,

    /// Categorical columns to normalize and encode (comma separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "soil_type,crop_type,location"
    )]
    categorical: Vec<String>,

    /// What to do with missing cells
    #[arg(long, value_enum, default_value = "reject")]
    missing_policy: CliMissingPolicy,

    /// Keep exact duplicate rows
    #[arg(long)]
    keep_duplicates: bool,

    /// Encode with an existing code table instead of learning one
    #[arg(long, conflicts_with = "survey_codes")]
    codes: Option<PathBuf>,

    /// Encode with the fixed survey form vocabulary
    #[arg(long)]
    survey_codes: bool,

    /// Preview the dataset and planned actions without writing files
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON summary.
    #[arg(long)]
    json: bool,

    /// Write a JSON report to the output directory as <name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,
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
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    dotenv().ok();

    info!("Loading dataset from: {}", args.input);
    let data = read_csv(&args.input).map_err(|e| report_error(&args, e))?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    if args.dry_run {
        return run_dry_run(&args, data);
    }

    let mut config_builder = PreprocessingConfig::builder()
        .categorical_columns(args.categorical.iter().filter(|c| !c.trim().is_empty()))
        .missing_policy(args.missing_policy.into())
        .remove_duplicates(!args.keep_duplicates);

    if let Some(ref target) = args.target {
        config_builder = config_builder.target_column(target);
    }

    let config = config_builder.build()?;
    let code_table = load_code_table(&args)?;

    let preprocessor = Preprocessor::new(config).map_err(|e| report_error(&args, e))?;
    let dataset = preprocessor
        .run(data, code_table.as_ref())
        .map_err(|e| report_error(&args, e))?;

    handle_output(dataset, &preprocessor, &args)
}

/// Resolve the code table requested on the command line, if any.
fn load_code_table(args: &Args) -> Result<Option<CategoricalCodeTable>> {
    if args.survey_codes {
        return Ok(Some(CategoricalCodeTable::survey_defaults()));
    }
    match &args.codes {
        Some(path) => {
            let table = CategoricalCodeTable::from_json_file(path)
                .map_err(|e| report_error(args, e))
                .with_context(|| format!("Failed to load code table {}", path.display()))?;
            Ok(Some(table))
        }
        None => Ok(None),
    }
}

/// Log (or, under `--json`, print) a library error and convert it for `main`.
fn report_error(args: &Args, err: ProcessingError) -> anyhow::Error {
    if args.json {
        if let Ok(json) = serde_json::to_string_pretty(&err) {
            println!("{}", json);
        }
    } else {
        error!("Preprocessing failed: {}", err);
    }
    anyhow!("{} ({})", err, err.error_code())
}

/// Write the cleaned dataset and code table, then print the summary.
fn handle_output(
    mut dataset: PreprocessedDataset,
    preprocessor: &Preprocessor,
    args: &Args,
) -> Result<()> {
    let name = args
        .output_name
        .clone()
        .unwrap_or_else(|| extract_file_stem(&args.input));
    let output_dir = PathBuf::from(&args.output);

    let data_path = output_dir.join(format!("{}_cleaned.csv", name));
    write_csv(&mut dataset.data, &data_path)?;
    info!("Cleaned data written to: {}", data_path.display());

    let codes_path = output_dir.join(format!("{}_codes.json", name));
    dataset.code_table.to_json_file(&codes_path)?;
    info!("Code table written to: {}", codes_path.display());

    let summary = dataset.summary(preprocessor.config().missing_policy);

    if args.emit_report {
        let report_path = output_dir.join(format!("{}_report.json", name));
        std::fs::write(&report_path, serde_json::to_string_pretty(&summary)?)?;
        info!("Report written to: {}", report_path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_human_readable_summary(&summary, &data_path, &codes_path, args);
    Ok(())
}

/// Run dry-run mode - show what would happen without processing
///
/// Uses `println!` on purpose: this output is the point of `--dry-run` and
/// must not depend on the log level.
fn run_dry_run(args: &Args, data: DataFrame) -> Result<()> {
    let data = normalize_columns(data).map_err(|e| report_error(args, e))?;
    let report = inspect(&data)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of preprocessing actions");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input);
    println!("  Rows: {}", report.rows);
    println!("  Columns: {}", report.columns);
    println!();

    println!("COLUMNS (normalized)");
    println!("{}", "-".repeat(40));
    for column in data.get_columns() {
        let missing = report
            .missing_by_column
            .get(column.name().as_str())
            .copied()
            .unwrap_or(0);
        println!(
            "  {:<30} {:<12} missing: {}",
            column.name(),
            format!("{:?}", column.dtype()),
            missing
        );
    }
    println!();

    println!("PROPOSED ACTIONS");
    println!("{}", "-".repeat(40));
    if args.keep_duplicates {
        println!("  Keep {} duplicate rows", report.duplicate_rows);
    } else if report.duplicate_rows > 0 {
        println!("  Remove {} duplicate rows", report.duplicate_rows);
    } else {
        println!("  No duplicate rows found");
    }
    println!(
        "  Missing cells: {} (policy: {})",
        report.missing_cells,
        MissingValuePolicy::from(args.missing_policy)
    );
    println!("  Encode categorical columns: {}", args.categorical.join(", "));
    println!();

    println!("{}", "=".repeat(80));
    println!("To execute this preprocessing, run without --dry-run");
    println!("{}", "=".repeat(80));

    Ok(())
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

/// Print a human-readable summary of the preprocessing results.
fn print_human_readable_summary(
    summary: &PreprocessingSummary,
    data_path: &Path,
    codes_path: &Path,
    args: &Args,
) {
    println!();
    println!("{}", "=".repeat(80));
    println!("PREPROCESSING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Input:  {} ({} rows)", args.input, summary.rows_before);
    println!(
        "Output: {} ({} rows x {} columns)",
        data_path.display(),
        summary.rows_after,
        summary.columns
    );
    println!("Codes:  {}", codes_path.display());
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Rows: {} -> {} ({} removed)",
        summary.rows_before, summary.rows_after, summary.rows_removed
    );
    println!(
        "  Completeness: {:.1}% -> {:.1}%",
        summary.completeness_before * 100.0,
        summary.completeness_after * 100.0
    );
    println!();

    if !summary.steps.is_empty() {
        println!("Actions Taken:");
        for step in &summary.steps {
            println!("  - {}", step);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
