//! openFDA Food Enforcement Sync
//!
//! Incremental sync connector for the openFDA food-enforcement (recall)
//! dataset. Records are fetched page by page from the public REST API,
//! flattened into single-level rows, and upserted into a destination table
//! keyed by `recall_number`. Progress is checkpointed after every page so
//! an interrupted run resumes from the last durable cursor.
//!
//! # Example
//!
//! ```no_run
//! use openfda_sync::config::ConnectorConfig;
//! use openfda_sync::destination::MemoryDestination;
//! use openfda_sync::state::JsonStateStore;
//! use openfda_sync::sync::SyncRunner;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConnectorConfig::from_env()?;
//!     let destination = MemoryDestination::new();
//!     let store = JsonStateStore::new("./sync_state.json");
//!     let report = SyncRunner::new(config)?.run(&store, &destination).await?;
//!     println!("synced {} records", report.records_synced);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod cursor;
pub mod destination;
pub mod flatten;
pub mod record;
pub mod retry;
pub mod state;
pub mod sync;

pub use openfda_common::{Result, SyncError};
