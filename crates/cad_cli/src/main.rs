use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info};

use cad_core::config::EngineConfig;
use cad_core::detect::PatternDetector;
use cad_core::diagnostics::TracingDiagnostics;
use cad_core::domain::FieldMapping;
use cad_core::error::AppError;
use cad_core::ingest::cad_csv::{preview_cad_csv, read_cad_csv, CadCsvTable};
use cad_core::pipeline::{analyze_rows, merge_mappings, AnalysisOptions};
use cad_core::reconcile::{cad_target_fields, suggest_mappings, validate_mappings};
use cad_core::report::generate_response_time_markdown;

#[derive(Parser)]
#[command(name = "cad-stats")]
#[command(about = "NFPA 1710 response-time statistics from CAD exports", long_about = None)]
struct Cli {
    /// Engine config JSON (thresholds, interval bounds, NFPA benchmarks)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header and first rows of an export
    Preview {
        csv: PathBuf,

        #[arg(short, long, default_value = "10")]
        rows: usize,
    },

    /// Detect the date/time column layout
    Detect { csv: PathBuf },

    /// Suggest column-to-field mappings and validate them
    Suggest { csv: PathBuf },

    /// Compute per-incident intervals, statistics and NFPA 1710 compliance
    Analyze {
        csv: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Rows per parallel shard
        #[arg(long)]
        shard_size: Option<usize>,

        /// JSON array of field mappings to use instead of suggestions
        #[arg(short, long)]
        mappings: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

fn setup_logging(verbose: u8) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn read_text(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|e| {
        AppError::new("CLI_READ_FAILED", "Failed to read input file")
            .with_details(format!("path={}; err={e}", path.display()))
    })
}

fn load_table(path: &Path) -> Result<CadCsvTable, AppError> {
    let text = read_text(path)?;
    let table = read_cad_csv(&text, &mut TracingDiagnostics)?;
    info!(
        path = %path.display(),
        columns = table.headers.len(),
        rows = table.rows.len(),
        "loaded CAD export"
    );
    Ok(table)
}

fn load_mappings(path: &Path) -> Result<Vec<FieldMapping>, AppError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| {
        AppError::new("CLI_MAPPINGS_PARSE_FAILED", "Failed to parse mappings JSON")
            .with_details(format!("path={}; err={e}", path.display()))
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("CLI_OUTPUT_FAILED", "Failed to serialize output").with_details(e.to_string())
    })?;
    println!("{out}");
    Ok(())
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    debug!(?config, "engine config");

    match cli.command {
        Commands::Preview { csv, rows } => {
            let text = read_text(&csv)?;
            print_json(&preview_cad_csv(&text, rows)?)
        }
        Commands::Detect { csv } => {
            let table = load_table(&csv)?;
            print_json(&PatternDetector::default().detect_rows(&table.headers, &table.rows))
        }
        Commands::Suggest { csv } => {
            let table = load_table(&csv)?;
            let targets = cad_target_fields();
            let detection = PatternDetector::default().detect_rows(&table.headers, &table.rows);
            let suggestions = suggest_mappings(&table.headers, &targets, config.min_confidence);
            let mappings = merge_mappings(&detection, &suggestions);
            let validation =
                validate_mappings(&mappings, &targets, config.low_confidence_warning);
            print_json(&json!({
                "pattern": detection,
                "suggestions": suggestions,
                "mappings": mappings,
                "validation": validation,
            }))
        }
        Commands::Analyze {
            csv,
            format,
            shard_size,
            mappings,
        } => {
            let table = load_table(&csv)?;
            let options = AnalysisOptions {
                columns: Some(table.headers.clone()),
                mappings: mappings.as_deref().map(load_mappings).transpose()?,
                targets: None,
                shard_size,
            };
            let result = analyze_rows(&table.rows, &options, &config, &mut TracingDiagnostics);
            info!(
                incidents = result.incidents.len(),
                dropped = result.dropped,
                counted = result.statistics.count,
                "analysis complete"
            );
            match format {
                OutputFormat::Json => print_json(&result),
                OutputFormat::Markdown => {
                    print!(
                        "{}",
                        generate_response_time_markdown(&result.statistics, &result.compliance)
                    );
                    Ok(())
                }
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(code = %err.code, "{err}");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
