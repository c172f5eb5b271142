//! openFDA Sync - incremental FDA food-enforcement loader

use anyhow::Result;
use clap::Parser;
use openfda_common::logging::{init_logging, LogConfig, LogLevel};
use openfda_sync::config::ConnectorConfig;
use openfda_sync::destination::{Destination, MemoryDestination};
use openfda_sync::state::{JsonStateStore, StateStore};
use openfda_sync::sync::SyncRunner;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "openfda-sync")]
#[command(author, version, about = "Incremental openFDA food-enforcement sync")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run one sync to completion
    Sync {
        /// Configuration file (flat JSON object); environment variables
        /// are used when omitted
        #[arg(short, long)]
        config: Option<String>,

        /// Sync state file
        #[arg(short, long, default_value = "./sync_state.json")]
        state: String,

        /// Sync into an in-memory table and report counts only
        #[arg(long)]
        dry_run: bool,

        /// Postgres connection string (requires the `database` feature)
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },

    /// Print the persisted sync state
    State {
        /// Sync state file
        #[arg(short, long, default_value = "./sync_state.json")]
        state: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on verbose flag; environment overrides win
    let mut log_config = LogConfig::from_env();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    match cli.command {
        Command::Sync {
            config,
            state,
            dry_run,
            database_url,
        } => {
            let config = match config {
                Some(path) => ConnectorConfig::from_file(&path)?,
                None => ConnectorConfig::from_env()?,
            };

            let destination = build_destination(dry_run, database_url).await?;
            let store = JsonStateStore::new(&state);

            let report = SyncRunner::new(config)?.run(&store, &*destination).await?;
            info!(
                records_synced = report.records_synced,
                total_processed = report.total_processed,
                cursor = %report.last_sync_date,
                "Run finished"
            );
        },
        Command::State { state } => {
            let store = JsonStateStore::new(&state);
            match store.load().await? {
                Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                None => println!("no sync state at {}", store.path().display()),
            }
        },
    }

    Ok(())
}

async fn build_destination(
    dry_run: bool,
    database_url: Option<String>,
) -> Result<Box<dyn Destination>> {
    if dry_run {
        info!("Dry run: records go to an in-memory table");
        return Ok(Box::new(MemoryDestination::new()));
    }

    #[cfg(feature = "database")]
    if let Some(url) = database_url {
        let destination = openfda_sync::destination::PostgresDestination::connect(&url).await?;
        return Ok(Box::new(destination));
    }

    #[cfg(not(feature = "database"))]
    let _ = database_url;

    anyhow::bail!(
        "no destination configured: pass --dry-run, or build with the \
         'database' feature and provide --database-url"
    )
}
