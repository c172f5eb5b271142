//! Destination table contract
//!
//! The connector declares one logical table and its primary key; column
//! shape is inferred by the destination from the flattened field set.
//! Delivery is at-least-once, so the only requirement on implementations
//! is that `upsert_batch` is idempotent by primary key.

use crate::flatten::FlatRecord;
use async_trait::async_trait;
use openfda_common::{Result, SyncError};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Destination table name
pub const TABLE_NAME: &str = "food_enforcement_records";

/// Primary key column
pub const PRIMARY_KEY: &str = "recall_number";

/// Declared shape of the destination table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name in the destination
    pub table: &'static str,
    /// Primary key column
    pub primary_key: &'static str,
}

/// The single table this connector delivers
pub fn schema() -> TableSchema {
    TableSchema {
        table: TABLE_NAME,
        primary_key: PRIMARY_KEY,
    }
}

/// Extract the primary key from a flattened record
fn record_key(record: &FlatRecord) -> Result<String> {
    record
        .get(PRIMARY_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| SyncError::destination(format!("record missing primary key '{PRIMARY_KEY}'")))
}

/// Render a flattened record as the JSON payload destinations store
#[cfg_attr(not(feature = "database"), allow(dead_code))]
fn record_payload(record: &FlatRecord) -> serde_json::Value {
    serde_json::Value::Object(
        record
            .iter()
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect(),
    )
}

/// Insert-or-update sink keyed by [`PRIMARY_KEY`]
#[async_trait]
pub trait Destination: Send + Sync {
    /// Upsert one page worth of records as a unit
    async fn upsert_batch(&self, records: Vec<FlatRecord>) -> Result<()>;
}

/// In-memory destination for tests and dry runs
#[derive(Default)]
pub struct MemoryDestination {
    rows: Mutex<BTreeMap<String, FlatRecord>>,
}

impl MemoryDestination {
    /// Create an empty destination
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct rows
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    /// Whether the table holds no rows
    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Fetch one row by primary key
    pub async fn get(&self, key: &str) -> Option<FlatRecord> {
        self.rows.lock().await.get(key).cloned()
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn upsert_batch(&self, records: Vec<FlatRecord>) -> Result<()> {
        let mut rows = self.rows.lock().await;
        for record in records {
            let key = record_key(&record)?;
            rows.insert(key, record);
        }
        Ok(())
    }
}

/// Postgres destination: one jsonb payload column keyed by recall number
#[cfg(feature = "database")]
pub struct PostgresDestination {
    pool: sqlx::PgPool,
}

#[cfg(feature = "database")]
impl PostgresDestination {
    /// Connect and create the destination table if it does not exist
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::PgPool::connect(database_url)
            .await
            .map_err(|e| SyncError::destination(format!("failed to connect: {e}")))?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                {PRIMARY_KEY} TEXT PRIMARY KEY,
                data JSONB NOT NULL
            )"
        ))
        .execute(&pool)
        .await
        .map_err(|e| SyncError::destination(format!("failed to create table: {e}")))?;

        Ok(Self { pool })
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl Destination for PostgresDestination {
    async fn upsert_batch(&self, records: Vec<FlatRecord>) -> Result<()> {
        // One transaction per page, so a page lands as a unit.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SyncError::destination(e.to_string()))?;

        for record in records {
            let key = record_key(&record)?;
            let payload = record_payload(&record);
            sqlx::query(&format!(
                "INSERT INTO {TABLE_NAME} ({PRIMARY_KEY}, data) VALUES ($1, $2)
                 ON CONFLICT ({PRIMARY_KEY}) DO UPDATE SET data = EXCLUDED.data"
            ))
            .bind(&key)
            .bind(&payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::destination(format!("upsert of '{key}' failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| SyncError::destination(e.to_string()))?;
        Ok(())
    }
}
