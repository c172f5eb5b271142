//! Per-record processing
//!
//! Each raw API record is flattened independently and tagged with sync
//! metadata. A record that cannot be processed is reported as an error
//! for that record alone; the rest of the page still goes through.

use crate::flatten::{flatten, FlatRecord, FlatValue};
use serde_json::Value;
use thiserror::Error;

/// Synthetic field: wall-clock time the record was synced
pub const SYNCED_AT_FIELD: &str = "_synced_at";

/// Synthetic field: soft-delete marker, always false on ingest
pub const DELETED_FIELD: &str = "_deleted";

/// Why a single record was skipped
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    /// The API handed back something other than a JSON object
    #[error("record is not a JSON object")]
    NotAnObject,
}

/// Best-effort record identifier for log context
pub fn recall_number(raw: &Value) -> &str {
    raw.get("recall_number")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

/// Flatten one raw record and attach sync metadata
pub fn prepare(raw: &Value, synced_at: &str) -> Result<FlatRecord, RecordError> {
    let object = raw.as_object().ok_or(RecordError::NotAnObject)?;

    let mut record = flatten(object);
    record.insert(
        SYNCED_AT_FIELD.to_string(),
        FlatValue::String(synced_at.to_string()),
    );
    record.insert(DELETED_FIELD.to_string(), FlatValue::Bool(false));
    Ok(record)
}

/// Process a whole page, keeping per-record outcomes
///
/// The skip-on-failure contract lives in the return type: callers see one
/// `Result` per incoming record, in order.
pub fn process_page(records: &[Value], synced_at: &str) -> Vec<Result<FlatRecord, RecordError>> {
    records
        .iter()
        .map(|raw| prepare(raw, synced_at))
        .collect()
}
