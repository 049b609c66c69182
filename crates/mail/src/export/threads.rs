//! Per-thread export on a bounded rayon pool

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use super::ExportOptions;
use crate::fetch::BackoffPolicy;
use crate::gmail::{MessageSource, extract_metadata};
use crate::models::{MessageMetadata, ThreadId};
use crate::storage::ExportStore;

/// Statistics from an export run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportStats {
    /// Number of threads attempted
    pub threads_processed: usize,
    /// Threads with at least one allow-listed attachment
    pub threads_with_attachments: usize,
    pub messages_with_attachments: usize,
    pub attachments_saved: usize,
    /// Failed thread fetches, attachment downloads and writes
    pub errors: usize,
    /// Duration of the export
    pub duration_ms: u64,
}

impl ExportStats {
    fn merge(mut self, other: ExportStats) -> ExportStats {
        self.threads_processed += other.threads_processed;
        self.threads_with_attachments += other.threads_with_attachments;
        self.messages_with_attachments += other.messages_with_attachments;
        self.attachments_saved += other.attachments_saved;
        self.errors += other.errors;
        self
    }
}

/// Export every thread in `thread_ids` into `store`
///
/// Failures are counted per thread and never abort the batch. Only setup
/// problems (output layout, worker pool) are returned as errors.
pub fn export_threads(
    source: &dyn MessageSource,
    store: &dyn ExportStore,
    thread_ids: &[ThreadId],
    options: &ExportOptions,
) -> Result<ExportStats> {
    let start = Instant::now();
    store.prepare()?;

    let workers = options.export_workers.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|idx| format!("export-worker-{}", idx + 1))
        .build()
        .context("Failed to create export thread pool")?;

    info!(
        "Exporting {} threads with {} workers",
        thread_ids.len(),
        workers
    );

    let policy = options.backoff();
    let progress_every = options.progress_every.max(1);
    let done = AtomicUsize::new(0);

    let mut stats = pool.install(|| {
        thread_ids
            .par_iter()
            .map(|thread_id| {
                let stats = export_thread(source, store, &policy, thread_id);

                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % progress_every == 0 {
                    info!("Processed {}/{} threads", finished, thread_ids.len());
                }
                stats
            })
            .reduce(ExportStats::default, ExportStats::merge)
    });

    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Export complete: {} threads, {} with attachments, {} attachments saved, {} errors, {} ms",
        stats.threads_processed,
        stats.threads_with_attachments,
        stats.attachments_saved,
        stats.errors,
        stats.duration_ms
    );
    Ok(stats)
}

/// Export a single thread, recording failures in the returned stats
fn export_thread(
    source: &dyn MessageSource,
    store: &dyn ExportStore,
    policy: &BackoffPolicy,
    thread_id: &ThreadId,
) -> ExportStats {
    let mut stats = ExportStats {
        threads_processed: 1,
        ..Default::default()
    };

    let messages = match policy.execute(|| source.get_thread(thread_id)) {
        Ok(messages) => messages,
        Err(e) => {
            error!("Failed to fetch thread {}: {}", thread_id, e);
            stats.errors += 1;
            return stats;
        }
    };

    let with_attachments: Vec<MessageMetadata> = messages
        .iter()
        .map(extract_metadata)
        .filter(MessageMetadata::has_attachments)
        .collect();

    if with_attachments.is_empty() {
        debug!("Thread {}: no attachments", thread_id);
        return stats;
    }

    stats.threads_with_attachments = 1;
    stats.messages_with_attachments = with_attachments.len();

    for message in &with_attachments {
        for attachment in &message.attachments {
            let data = match policy.execute(|| source.get_attachment(&message.id, &attachment.id)) {
                Ok(data) => data,
                Err(e) => {
                    warn!(
                        "Failed to download {} from message {}: {}",
                        attachment.filename, message.id, e
                    );
                    stats.errors += 1;
                    continue;
                }
            };

            match store.write_attachment(&message.id, attachment, &data) {
                Ok(()) => stats.attachments_saved += 1,
                Err(e) => {
                    error!(
                        "Failed to save {} from message {}: {:#}",
                        attachment.filename, message.id, e
                    );
                    stats.errors += 1;
                }
            }
        }
    }

    if let Err(e) = store.write_thread_metadata(thread_id, &with_attachments) {
        error!("Failed to save metadata for thread {}: {:#}", thread_id, e);
        stats.errors += 1;
    }

    debug!(
        "Thread {}: {} messages with attachments",
        thread_id, stats.messages_with_attachments
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::GmailError;
    use crate::gmail::api::{GmailMessage, Header, MessageBody, MessagePart, MessagePayload};
    use crate::models::MessageId;
    use crate::storage::InMemoryExportStore;
    use std::collections::HashMap;

    fn attachment_part(filename: &str, attachment_id: &str) -> MessagePart {
        MessagePart {
            part_id: Some("1".to_string()),
            mime_type: Some("application/pdf".to_string()),
            filename: Some(filename.to_string()),
            headers: None,
            body: Some(MessageBody {
                size: Some(3),
                data: None,
                attachment_id: Some(attachment_id.to_string()),
            }),
            parts: None,
        }
    }

    fn message(id: &str, parts: Vec<MessagePart>) -> GmailMessage {
        GmailMessage {
            id: id.to_string(),
            thread_id: None,
            label_ids: None,
            snippet: String::new(),
            payload: Some(MessagePayload {
                headers: Some(vec![Header {
                    name: "Subject".to_string(),
                    value: format!("Subject {}", id),
                }]),
                body: None,
                parts: Some(parts),
                mime_type: Some("multipart/mixed".to_string()),
            }),
        }
    }

    #[derive(Default)]
    struct FakeSource {
        threads: HashMap<String, Vec<GmailMessage>>,
        attachments: HashMap<String, Vec<u8>>,
    }

    impl MessageSource for FakeSource {
        fn get_thread(&self, id: &ThreadId) -> Result<Vec<GmailMessage>, GmailError> {
            self.threads
                .get(id.as_str())
                .cloned()
                .ok_or(GmailError::Status { code: 404 })
        }

        fn get_attachment(
            &self,
            _message_id: &MessageId,
            attachment_id: &str,
        ) -> Result<Vec<u8>, GmailError> {
            self.attachments
                .get(attachment_id)
                .cloned()
                .ok_or(GmailError::Status { code: 404 })
        }
    }

    fn options() -> ExportOptions {
        ExportOptions {
            export_workers: 2,
            max_retries: 1,
            base_delay_ms: 1,
            max_delay_ms: 1,
            progress_every: 1,
        }
    }

    #[test]
    fn test_export_saves_attachments_and_metadata() {
        let mut source = FakeSource::default();
        source.threads.insert(
            "t1".to_string(),
            vec![
                message("m1", vec![attachment_part("a.pdf", "att-a")]),
                message("m2", vec![]),
            ],
        );
        source.threads.insert("t2".to_string(), vec![message("m3", vec![])]);
        source.attachments.insert("att-a".to_string(), b"PDF".to_vec());

        let store = InMemoryExportStore::new();
        let ids = vec![ThreadId::new("t1"), ThreadId::new("t2")];
        let stats = export_threads(&source, &store, &ids, &options()).unwrap();

        assert_eq!(stats.threads_processed, 2);
        assert_eq!(stats.threads_with_attachments, 1);
        assert_eq!(stats.messages_with_attachments, 1);
        assert_eq!(stats.attachments_saved, 1);
        assert_eq!(stats.errors, 0);

        assert_eq!(
            store.attachment(&MessageId::new("m1"), "a.pdf"),
            Some(b"PDF".to_vec())
        );
        let metadata = store.thread_metadata(&ThreadId::new("t1")).unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].id, MessageId::new("m1"));
        assert!(store.thread_metadata(&ThreadId::new("t2")).is_none());
    }

    #[test]
    fn test_failures_are_counted_not_fatal() {
        let mut source = FakeSource::default();
        source.threads.insert(
            "t1".to_string(),
            vec![message(
                "m1",
                vec![
                    attachment_part("ok.pdf", "att-ok"),
                    attachment_part("gone.pdf", "att-gone"),
                ],
            )],
        );
        source.attachments.insert("att-ok".to_string(), b"ok".to_vec());

        let store = InMemoryExportStore::new();
        let ids = vec![ThreadId::new("t1"), ThreadId::new("missing")];
        let stats = export_threads(&source, &store, &ids, &options()).unwrap();

        assert_eq!(stats.threads_processed, 2);
        assert_eq!(stats.attachments_saved, 1);
        assert_eq!(stats.errors, 2);
        assert_eq!(store.thread_count(), 1);
    }

    #[test]
    fn test_export_of_nothing() {
        let source = FakeSource::default();
        let store = InMemoryExportStore::new();
        let stats = export_threads(&source, &store, &[], &options()).unwrap();
        assert_eq!(stats.threads_processed, 0);
    }
}
