//! Loadstar CLI — staging, ingestion, and pipeline runs.
//!
//! Commands:
//! - `init` — create the warehouse schema (idempotent)
//! - `fetch` — stage raw prices for the configured entities
//! - `generate` — write a synthetic transaction interchange file
//! - `ingest` — stage a transaction interchange file (.json or .csv)
//! - `run` — run the configured pipelines and print the run summary
//!
//! Exit status: 0 when every entity succeeded, 1 when any failed — callers
//! must still inspect the summary, since partial success is expected.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use loadstar_pipeline::{
    fetch_and_store, generate_records, ingest_file, open_configured_store, run_pipeline,
    write_json, GenSettings, PipelineConfig, RunSummary, SyntheticFeed,
};

#[derive(Parser)]
#[command(name = "loadstar", about = "Loadstar — batch ETL warehouse loader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the warehouse schema (idempotent).
    Init {
        /// Path to the TOML pipeline config.
        #[arg(long)]
        config: PathBuf,
    },
    /// Stage raw prices for the configured entities.
    Fetch {
        /// Path to the TOML pipeline config.
        #[arg(long)]
        config: PathBuf,

        /// Start date (YYYY-MM-DD). Defaults to lookback_days before end.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,
    },
    /// Write a synthetic transaction interchange file.
    Generate {
        /// Output path (.json).
        #[arg(long, default_value = "transactions.json")]
        out: PathBuf,

        #[arg(long, default_value_t = 100)]
        transactions: usize,

        #[arg(long, default_value_t = 50)]
        users: usize,

        #[arg(long, default_value_t = 20)]
        products: usize,

        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Stage a transaction interchange file (.json or .csv).
    Ingest {
        /// Path to the TOML pipeline config.
        #[arg(long)]
        config: PathBuf,

        /// Interchange file to ingest.
        #[arg(long)]
        file: PathBuf,
    },
    /// Run the configured pipelines and print the run summary.
    Run {
        /// Path to the TOML pipeline config.
        #[arg(long)]
        config: PathBuf,

        /// Emit the summary as JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { config } => run_init(&config),
        Commands::Fetch { config, start, end } => run_fetch(&config, start, end),
        Commands::Generate {
            out,
            transactions,
            users,
            products,
            seed,
        } => run_generate(&out, transactions, users, products, seed),
        Commands::Ingest { config, file } => run_ingest(&config, &file),
        Commands::Run { config, json } => run_run(&config, json),
    }
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::from_file(path)
        .with_context(|| format!("loading config from {}", path.display()))
}

fn run_init(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    open_configured_store(&config)?;
    println!(
        "Schema initialized in {}",
        config.pipeline.db_path.display()
    );
    Ok(())
}

fn run_fetch(config_path: &Path, start: Option<String>, end: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;

    let end_date = end
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let start_date = start
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()?
        .unwrap_or_else(|| {
            end_date - chrono::Duration::days(config.pipeline.lookback_days as i64)
        });

    let mut store = open_configured_store(&config)?;
    let feed = SyntheticFeed::new();
    let summary = fetch_and_store(
        &feed,
        &mut store,
        &config.pipeline.entities,
        start_date,
        end_date,
    );

    println!(
        "Staged {} observations for {} entities ({start_date} to {end_date})",
        summary.rows_loaded,
        config.pipeline.entities.len()
    );
    if !summary.all_succeeded() {
        for (entity, err) in &summary.errors {
            eprintln!("Error for {entity}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_generate(
    out: &Path,
    transactions: usize,
    users: usize,
    products: usize,
    seed: u64,
) -> Result<()> {
    let settings = GenSettings {
        transactions,
        users,
        products,
        seed,
    };
    let records = generate_records(&settings);
    write_json(&records, out).with_context(|| format!("writing {}", out.display()))?;
    println!("Wrote {} records to {}", records.len(), out.display());
    Ok(())
}

fn run_ingest(config_path: &Path, file: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let mut store = open_configured_store(&config)?;
    let report = ingest_file(&mut store, file)?;

    println!(
        "Ingest of {}: {} read, {} inserted, {} duplicates skipped, {} rejected",
        file.display(),
        report.read,
        report.inserted,
        report.duplicates,
        report.rejected.len()
    );
    for rejected in &report.rejected {
        println!("  rejected {}: {}", rejected.transaction_id, rejected.reason);
    }
    Ok(())
}

fn run_run(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let summary = run_pipeline(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("=== Run Summary ===");
    println!("Run ID:      {}", summary.run_id);
    println!("Entities:    {}", summary.entities_processed);
    println!("Rows loaded: {}", summary.rows_loaded);
    if !summary.unresolved.is_empty() {
        println!("Unresolved fact rows: {}", summary.unresolved.len());
        for row in &summary.unresolved {
            println!("  {}: {}", row.transaction_id, row.reason);
        }
    }
    if summary.failures.is_empty() {
        println!("All entities loaded.");
    } else {
        println!("Failed entities:");
        for failure in &summary.failures {
            println!(
                "  {} ({:?}): {}",
                failure.entity_id, failure.stage, failure.reason
            );
        }
    }
    println!();
}
