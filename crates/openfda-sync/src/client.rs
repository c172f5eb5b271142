//! openFDA HTTP client
//!
//! One logical GET per page against the enforcement endpoint. Network
//! errors and non-2xx statuses are retried with exponential backoff;
//! a body that arrives but cannot be decoded is the caller's problem and
//! is not retried.

use crate::config::{ConnectorConfig, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::retry::{self, RetryPolicy};
use openfda_common::{Result, SyncError};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Query parameters for one page fetch
#[derive(Debug, Clone)]
pub struct PageQuery {
    /// Page size (`limit` parameter)
    pub limit: u32,
    /// Pagination offset (`skip` parameter, omitted when zero)
    pub skip: u64,
    /// Optional server-side date filter (`search` parameter)
    pub search: Option<String>,
}

/// One page of the enforcement dataset
///
/// The API omits `results` entirely when the dataset is exhausted; that
/// decodes as an empty page.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EnforcementPage {
    #[serde(default)]
    pub results: Vec<Value>,
}

impl EnforcementPage {
    /// Number of records in this page
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the page carries no records
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Server-side filter restricting results to report dates at or after the
/// cursor (inclusive lower bound)
///
/// The inclusive bound re-delivers records sitting exactly on the cursor
/// date across runs; the destination upsert absorbs those duplicates.
pub fn incremental_filter(cursor: &str) -> String {
    format!("report_date:[{cursor}+TO+*]")
}

/// HTTP client for the openFDA enforcement endpoint
pub struct FdaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl FdaClient {
    /// Create a client from connector configuration
    pub fn new(config: &ConnectorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                ..RetryPolicy::default()
            },
        })
    }

    /// Replace the retry policy (shorter delays in tests)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch one page, retrying transient failures
    ///
    /// Exhausting the retry budget escalates to
    /// [`SyncError::RetriesExhausted`].
    pub async fn fetch_page(&self, query: &PageQuery) -> Result<EnforcementPage> {
        let mut params: Vec<(&str, String)> = vec![
            ("api_key", self.api_key.clone()),
            ("limit", query.limit.to_string()),
        ];
        if query.skip > 0 {
            params.push(("skip", query.skip.to_string()));
        }
        if let Some(ref search) = query.search {
            params.push(("search", search.clone()));
        }

        debug!(skip = query.skip, limit = query.limit, "Requesting page");

        let response = retry::with_backoff(&self.retry, || {
            let request = self.http.get(&self.base_url).query(&params);
            async move { request.send().await?.error_for_status() }
        })
        .await
        .map_err(|e| SyncError::RetriesExhausted {
            attempts: self.retry.max_attempts,
            message: e.to_string(),
        })?;

        // Decode failures are not transient, so they bypass the retry loop.
        response
            .json::<EnforcementPage>()
            .await
            .map_err(|e| SyncError::response(format!("failed to decode page body: {e}")))
    }
}
