//! Sync cursor derivation
//!
//! The incremental cursor is the latest `report_date` seen so far,
//! normalized to a fixed-width RFC-3339 day timestamp. Fixed-width and
//! zero-padded means plain lexicographic comparison orders timestamps
//! correctly, so no date parsing is needed beyond the initial layout
//! check.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::warn;

/// Raw record field holding the report date
pub const REPORT_DATE_FIELD: &str = "report_date";

/// Current wall-clock time as an RFC-3339 UTC timestamp (`Z` suffix)
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Normalize an openFDA `YYYYMMDD` date to `YYYY-MM-DDT00:00:00Z`
///
/// Returns `None` for anything that is not exactly eight ASCII digits;
/// malformed dates are skipped rather than aborting a batch scan.
pub fn normalize_report_date(raw: &str) -> Option<String> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!(
        "{}-{}-{}T00:00:00Z",
        &raw[0..4],
        &raw[4..6],
        &raw[6..8]
    ))
}

/// Latest normalized report date across a batch of raw records
///
/// Records without a parseable `report_date` are skipped. Returns `None`
/// when the batch contains no valid dates at all.
pub fn latest_report_date(records: &[Value]) -> Option<String> {
    records
        .iter()
        .filter_map(|record| record.get(REPORT_DATE_FIELD))
        .filter_map(Value::as_str)
        .filter_map(normalize_report_date)
        .max()
}

/// Derive the next cursor from a processed batch
///
/// The new cursor is the maximum of the previous cursor and the latest
/// date in the batch, so the persisted cursor never moves backwards even
/// when a later page contains older dates than an earlier one.
///
/// When neither exists (empty batch on a first run), the current
/// wall-clock time is used. This advances the cursor without a real date
/// signal; if the API later backfills older records they will not be
/// picked up by incremental runs, hence the warning.
pub fn advance(previous: Option<&str>, records: &[Value]) -> String {
    let batch_latest = latest_report_date(records);

    match (previous, batch_latest) {
        (Some(prev), Some(batch)) => {
            if batch.as_str() > prev {
                batch
            } else {
                prev.to_string()
            }
        },
        (None, Some(batch)) => batch,
        (Some(prev), None) => prev.to_string(),
        (None, None) => {
            let now = now_rfc3339();
            warn!(
                cursor = %now,
                "No parseable report dates in batch; falling back to current time as cursor"
            );
            now
        },
    }
}
