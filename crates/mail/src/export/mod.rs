//! Attachment export
//!
//! Takes the thread IDs produced by the fetch stage and, for each thread,
//! saves the allow-listed attachments and the metadata of the messages that
//! carry them.

mod threads;

pub use threads::{ExportStats, export_threads};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::fetch::BackoffPolicy;

/// Tuning for the export stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Threads exported concurrently
    pub export_workers: usize,
    /// Attempt budget per thread or attachment request
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Log a progress line after this many threads
    pub progress_every: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_workers: 4,
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            progress_every: 100,
        }
    }
}

impl ExportOptions {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.max_retries,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}
