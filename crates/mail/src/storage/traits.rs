//! Storage trait definitions

use crate::models::{AttachmentRef, MessageId, MessageMetadata, ThreadId};
use anyhow::Result;

/// Destination for everything a harvest run produces
///
/// Implementations are shared by the export workers, so every method takes
/// `&self` and must be safe to call concurrently for different threads.
pub trait ExportStore: Send + Sync {
    /// Create whatever layout the store needs before the first write
    fn prepare(&self) -> Result<()>;

    /// Persist the metadata of a thread's messages that carry attachments
    fn write_thread_metadata(
        &self,
        thread_id: &ThreadId,
        messages: &[MessageMetadata],
    ) -> Result<()>;

    /// Persist the decoded bytes of one attachment
    fn write_attachment(
        &self,
        message_id: &MessageId,
        attachment: &AttachmentRef,
        data: &[u8],
    ) -> Result<()>;

    /// Persist the full list of discovered thread IDs
    fn write_thread_index(&self, thread_ids: &[ThreadId]) -> Result<()>;
}
