//! Incremental sync loop
//!
//! Strictly sequential: one page in flight at a time, flatten and upsert
//! the page, checkpoint, throttle, fetch the next page. A checkpoint is
//! durable before the following fetch starts, so a crash resumes at the
//! last checkpointed cursor and offset; the destination upsert absorbs
//! any page replayed across the boundary.

use crate::client::{incremental_filter, FdaClient, PageQuery};
use crate::config::{ConnectorConfig, SyncMode};
use crate::cursor;
use crate::destination::Destination;
use crate::record;
use crate::state::{StateStore, SyncState};
use openfda_common::Result;
use tracing::{error, info, warn};

/// Outcome of one sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Records upserted during this run
    pub records_synced: u64,
    /// Running total across all runs of this logical sync
    pub total_processed: u64,
    /// Cursor written by the final checkpoint
    pub last_sync_date: String,
}

/// Drives the fetch / process / checkpoint loop
pub struct SyncRunner {
    config: ConnectorConfig,
    client: FdaClient,
}

impl SyncRunner {
    /// Create a runner; configuration has already been validated
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        let client = FdaClient::new(&config)?;
        Ok(Self { config, client })
    }

    /// Create a runner with a caller-supplied client (custom retry policy)
    pub fn with_client(config: ConnectorConfig, client: FdaClient) -> Self {
        Self { config, client }
    }

    /// Run one sync to completion
    ///
    /// Any failure during fetch, processing, or checkpointing aborts the
    /// run with a single error; checkpoints already written stay in
    /// effect for the next run.
    pub async fn run(
        &self,
        store: &dyn StateStore,
        destination: &dyn Destination,
    ) -> Result<SyncReport> {
        info!("Starting openFDA food enforcement sync");

        match self.run_loop(store, destination).await {
            Ok(report) => {
                info!(
                    records_synced = report.records_synced,
                    total_processed = report.total_processed,
                    cursor = %report.last_sync_date,
                    "Sync completed successfully"
                );
                Ok(report)
            },
            Err(e) => {
                error!(error = %e, "Sync failed");
                Err(e)
            },
        }
    }

    async fn run_loop(
        &self,
        store: &dyn StateStore,
        destination: &dyn Destination,
    ) -> Result<SyncReport> {
        // INIT: load prior state, or start from scratch
        let state = store.load().await?.unwrap_or_default();
        let mut cursor = state.last_sync_date.clone();
        let mut total_processed = state.total_processed;
        let mut records_synced = 0u64;
        let mut skip = 0u64;

        let search = match (self.config.sync_mode, cursor.as_deref()) {
            (SyncMode::Incremental, Some(since)) => {
                info!(since, "Performing incremental sync");
                Some(incremental_filter(since))
            },
            _ => {
                info!("Performing full sync");
                None
            },
        };

        while total_processed < self.config.max_records {
            // FETCHING
            info!(skip, limit = self.config.limit, "Fetching page");
            let page = self
                .client
                .fetch_page(&PageQuery {
                    limit: self.config.limit,
                    skip,
                    search: search.clone(),
                })
                .await?;

            if page.is_empty() {
                info!("No more results found");
                break;
            }

            // PROCESSING: flatten each record independently, skip failures
            let synced_at = cursor::now_rfc3339();
            let outcomes = record::process_page(&page.results, &synced_at);
            let mut batch = Vec::with_capacity(outcomes.len());
            let mut skipped = 0u64;
            for (raw, outcome) in page.results.iter().zip(outcomes) {
                match outcome {
                    Ok(flat) => batch.push(flat),
                    Err(e) => {
                        warn!(
                            recall_number = record::recall_number(raw),
                            error = %e,
                            "Skipping record"
                        );
                        skipped += 1;
                    },
                }
            }

            let processed = batch.len() as u64;
            destination.upsert_batch(batch).await?;
            total_processed += processed;
            records_synced += processed;
            info!(
                page_records = processed,
                skipped, total_processed, "Upserted page"
            );

            let short_page = page.len() < self.config.limit as usize;
            skip += page.len() as u64;

            // CHECKPOINTING: durable before the next fetch starts
            cursor = Some(cursor::advance(cursor.as_deref(), &page.results));
            store
                .save(&SyncState {
                    last_sync_date: cursor.clone(),
                    total_processed,
                    last_cursor: Some(skip),
                })
                .await?;

            if short_page {
                info!("Reached end of available data");
                break;
            }

            // Static throttle; the API allows 240 requests per minute
            if !self.config.throttle.is_zero() {
                tokio::time::sleep(self.config.throttle).await;
            }
        }

        // FINAL_CHECKPOINT: guarantees a checkpoint exists even when the
        // loop exited before processing any page
        let final_cursor = cursor::advance(cursor.as_deref(), &[]);
        store
            .save(&SyncState {
                last_sync_date: Some(final_cursor.clone()),
                total_processed,
                last_cursor: Some(skip),
            })
            .await?;

        Ok(SyncReport {
            records_synced,
            total_processed,
            last_sync_date: final_cursor,
        })
    }
}
