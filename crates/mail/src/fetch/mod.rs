//! Concurrent paginated thread fetching
//!
//! The engine walks the cursor-based threads listing with a fixed pool of
//! worker threads:
//! - [`BackoffPolicy`] retries transient listing failures
//! - [`CursorFrontier`] queues cursors and guarantees each is sent at most once
//! - [`ResultAccumulator`] collects thread IDs from every page
//! - [`WorkerPool`] runs the per-worker loop
//! - [`ThreadFetcher`] seeds the frontier, waits for quiescence and shuts the
//!   pool down

mod accumulator;
mod backoff;
mod frontier;
mod orchestrator;
mod pool;

pub use accumulator::ResultAccumulator;
pub use backoff::{BackoffPolicy, Retryable};
pub use frontier::CursorFrontier;
pub use orchestrator::{ThreadFetcher, fetch_all_threads};
pub use pool::{PoolStats, WorkerPool};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::gmail::GmailError;
use crate::models::Cursor;

/// Tuning for a fetch-all run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    /// Threads requested per listing call
    pub page_size: u32,
    /// Number of concurrent fetch workers
    pub workers: usize,
    /// Attempt budget per listing call
    pub max_retries: u32,
    /// First retry delay in milliseconds
    pub base_delay_ms: u64,
    /// Retry delay ceiling in milliseconds, before jitter
    pub max_delay_ms: u64,
    /// Abort the whole fetch when any branch exhausts its retries
    pub fail_fast: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: 200,
            workers: 4,
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            fail_fast: false,
        }
    }
}

impl FetchOptions {
    /// Retry policy described by these options
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.max_retries,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

/// Terminal failures of a fetch-all run
#[derive(Debug, Error)]
pub enum FetchError {
    /// A listing call failed after its retry budget (or with a non-retryable error)
    #[error("listing failed at {}: {source}", describe_cursor(.cursor))]
    BranchFailed {
        cursor: Option<Cursor>,
        #[source]
        source: GmailError,
    },

    /// A worker thread could not be started
    #[error("failed to start fetch worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// A worker thread panicked
    #[error("fetch worker {0} panicked")]
    WorkerPanicked(usize),
}

fn describe_cursor(cursor: &Option<Cursor>) -> String {
    match cursor {
        Some(cursor) => format!("cursor {}", cursor),
        None => "first page".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults_fill_missing_fields() {
        let options: FetchOptions =
            serde_json::from_str(r#"{"workers": 8, "fail_fast": true}"#).unwrap();
        assert_eq!(options.workers, 8);
        assert!(options.fail_fast);
        assert_eq!(options.page_size, 200);
        assert_eq!(options.max_retries, 3);
    }

    #[test]
    fn test_options_backoff() {
        let policy = FetchOptions::default().backoff();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_branch_failed_display() {
        let err = FetchError::BranchFailed {
            cursor: Some(Cursor::new("A")),
            source: GmailError::Status { code: 503 },
        };
        assert_eq!(
            err.to_string(),
            "listing failed at cursor A: Gmail API returned HTTP 503"
        );

        let first = FetchError::BranchFailed {
            cursor: None,
            source: GmailError::transport("timed out"),
        };
        assert!(first.to_string().starts_with("listing failed at first page"));
    }
}
