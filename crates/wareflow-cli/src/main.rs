use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use wareflow_core::{delivery_attempts, Config};
use wareflow_pipeline::{Pipeline, RunOutcome};
use wareflow_source::{MongoSource, SourceAdapter};
use wareflow_staging::{S3Staging, StagingStore};
use wareflow_warehouse::{PostgresWarehouse, WarehouseAdapter};

/// Wareflow - incremental delivery-attempt sync into the warehouse
#[derive(Parser)]
#[command(name = "wareflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: wareflow.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one sync run
    Run {
        /// Run date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Show the stored watermark for a job
    Watermark {
        /// Job name (defaults to the configured job)
        job: Option<String>,
    },

    /// Test connectivity to the source, staging area, and warehouse
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("wareflow.toml"));
    let config = Config::from_file(&config_path)?;

    if cli.verbose {
        eprintln!(
            "{} {} ({})",
            "Job:".cyan(),
            config.job_name,
            config_path.display()
        );
    }

    match cli.command {
        Commands::Run { date } => run_command(&config, date, cli.verbose).await,
        Commands::Watermark { job } => watermark_command(&config, job.as_deref()).await,
        Commands::Check => check_command(&config).await,
    }
}

/// Run command - one full extract/normalize/load pass
async fn run_command(config: &Config, date: Option<NaiveDate>, verbose: bool) -> Result<()> {
    let run_date = date.unwrap_or_else(|| Utc::now().date_naive());
    let tz = config.tz()?;

    if verbose {
        eprintln!("{} {}", "Run date:".cyan(), run_date);
    }

    let source = connect_source(config).await?;
    let staging = connect_staging(config).await?;
    let warehouse = connect_warehouse(config).await?;

    let pipeline = Pipeline::new(
        &config.job_name,
        delivery_attempts(),
        tz,
        &config.staging.partition_prefix,
    );

    let outcome = pipeline
        .run(&source, &staging, &warehouse, run_date)
        .await?;

    print_outcome(&config.job_name, &outcome);
    Ok(())
}

/// Watermark command - show the stored watermark
async fn watermark_command(config: &Config, job: Option<&str>) -> Result<()> {
    let job = job.unwrap_or(&config.job_name);
    let warehouse = connect_warehouse(config).await?;
    let watermark = warehouse.get_watermark(job).await?;

    match watermark {
        Some(watermark) => println!(
            "{} {}",
            format!("{}:", job).bold(),
            watermark.to_string().green()
        ),
        None => println!(
            "{} {}",
            format!("{}:", job).bold(),
            "no watermark (next run pulls everything)".yellow()
        ),
    }
    Ok(())
}

/// Check command - probe all three backends
async fn check_command(config: &Config) -> Result<()> {
    let mut failed = false;

    match connect_source(config).await {
        Ok(source) => match source.test_connection().await {
            Ok(()) => println!("{} {}", "✓".green(), "source reachable"),
            Err(e) => {
                println!("{} source: {}", "✗".red(), e);
                failed = true;
            }
        },
        Err(e) => {
            println!("{} source: {}", "✗".red(), e);
            failed = true;
        }
    }

    match connect_staging(config).await {
        Ok(staging) => match staging.test_connection().await {
            Ok(()) => println!("{} {}", "✓".green(), "staging bucket reachable"),
            Err(e) => {
                println!("{} staging: {}", "✗".red(), e);
                failed = true;
            }
        },
        Err(e) => {
            println!("{} staging: {}", "✗".red(), e);
            failed = true;
        }
    }

    match connect_warehouse(config).await {
        Ok(warehouse) => match warehouse.test_connection().await {
            Ok(()) => println!("{} {}", "✓".green(), "warehouse reachable"),
            Err(e) => {
                println!("{} warehouse: {}", "✗".red(), e);
                failed = true;
            }
        },
        Err(e) => {
            println!("{} warehouse: {}", "✗".red(), e);
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

async fn connect_source(config: &Config) -> Result<MongoSource> {
    let uri = std::env::var("WAREFLOW_MONGO_URI")
        .map_err(|_| anyhow::anyhow!("WAREFLOW_MONGO_URI not set"))?;
    Ok(MongoSource::connect(&uri, &config.source.database, &config.source.collection).await?)
}

async fn connect_staging(config: &Config) -> Result<S3Staging> {
    Ok(S3Staging::connect(
        &config.staging.bucket,
        &config.staging.region,
        config.staging.endpoint_url.as_deref(),
        staging_credentials(),
    )
    .await?)
}

async fn connect_warehouse(config: &Config) -> Result<PostgresWarehouse> {
    let password = std::env::var("WAREFLOW_WAREHOUSE_PASSWORD")
        .map_err(|_| anyhow::anyhow!("WAREFLOW_WAREHOUSE_PASSWORD not set"))?;

    let w = &config.warehouse;
    let mut warehouse = if w.tls {
        PostgresWarehouse::connect_with_tls(
            &w.host,
            w.port,
            &w.database,
            &w.user,
            &password,
            &w.table,
            &w.metadata_table,
        )
        .await?
    } else {
        PostgresWarehouse::connect(
            &w.host,
            w.port,
            &w.database,
            &w.user,
            &password,
            &w.table,
            &w.metadata_table,
        )
        .await?
    };

    // The COPY statement authenticates against the staging bucket with
    // the same key pair the uploader used.
    if let Some((access_key, secret_key)) = staging_credentials() {
        warehouse = warehouse.with_copy_credentials(access_key, secret_key);
    }

    Ok(warehouse)
}

fn staging_credentials() -> Option<(String, String)> {
    let access_key = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
    Some((access_key, secret_key))
}

fn print_outcome(job_name: &str, outcome: &RunOutcome) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", format!("Run Summary: {}", job_name).bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{} {}", "Records pulled:".bold(), outcome.records_pulled);
    println!("{} {}", "Rows loaded:".bold(), outcome.rows_loaded);
    println!(
        "{} {}",
        "Duplicates removed:".bold(),
        outcome.duplicates_removed
    );

    let before = outcome
        .watermark_before
        .map(|w| w.to_string())
        .unwrap_or_else(|| "none".to_string());
    let after = outcome
        .watermark_after
        .map(|w| w.to_string())
        .unwrap_or_else(|| "none".to_string());
    println!("{} {} -> {}", "Watermark:".bold(), before, after.green());

    if outcome.rows_loaded == 0 {
        println!();
        println!("{}", "✓ Nothing to load".green());
    } else if outcome.staged_cleanup_failed {
        println!();
        println!(
            "{}",
            format!(
                "⚠ Staged object left behind: {}",
                outcome.staged_key.as_deref().unwrap_or("?")
            )
            .yellow()
        );
    } else {
        println!();
        println!("{}", "✓ Run complete".green());
    }

    println!("{}", "=".repeat(60).bright_blue());
}
