//! In-memory export store
//!
//! Used by tests and dry runs. Contents can be inspected after an export.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::ExportStore;
use crate::models::{AttachmentRef, MessageId, MessageMetadata, ThreadId};

/// In-memory implementation of ExportStore
///
/// Uses HashMaps protected by RwLocks for thread-safe access.
#[derive(Default)]
pub struct InMemoryExportStore {
    metadata: RwLock<HashMap<ThreadId, Vec<MessageMetadata>>>,
    /// Keyed by (message ID, attachment filename)
    attachments: RwLock<HashMap<(MessageId, String), Vec<u8>>>,
    thread_index: RwLock<Option<Vec<ThreadId>>>,
}

impl InMemoryExportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata written for a thread, if any
    pub fn thread_metadata(&self, thread_id: &ThreadId) -> Option<Vec<MessageMetadata>> {
        self.metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(thread_id)
            .cloned()
    }

    /// Number of threads with metadata written
    pub fn thread_count(&self) -> usize {
        self.metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Bytes written for an attachment, if any
    pub fn attachment(&self, message_id: &MessageId, filename: &str) -> Option<Vec<u8>> {
        self.attachments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(message_id.clone(), filename.to_string()))
            .cloned()
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The last thread index written
    pub fn thread_index(&self) -> Option<Vec<ThreadId>> {
        self.thread_index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ExportStore for InMemoryExportStore {
    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    fn write_thread_metadata(
        &self,
        thread_id: &ThreadId,
        messages: &[MessageMetadata],
    ) -> Result<()> {
        self.metadata
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(thread_id.clone(), messages.to_vec());
        Ok(())
    }

    fn write_attachment(
        &self,
        message_id: &MessageId,
        attachment: &AttachmentRef,
        data: &[u8],
    ) -> Result<()> {
        self.attachments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (message_id.clone(), attachment.filename.clone()),
                data.to_vec(),
            );
        Ok(())
    }

    fn write_thread_index(&self, thread_ids: &[ThreadId]) -> Result<()> {
        *self
            .thread_index
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(thread_ids.to_vec());
        Ok(())
    }
}
