//! Filesystem export store
//!
//! Layout under the output directory:
//! ```text
//! output/
//!   thread_ids.json                     # every discovered thread ID
//!   18c1f2a3b4c5d6e7_data.json          # metadata for one thread
//!   attachments/
//!     18c1f2a3b4c5d6e8_invoice.pdf      # <message id>_<filename>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::ExportStore;
use crate::models::{AttachmentRef, MessageId, MessageMetadata, ThreadId};

const ATTACHMENTS_DIR: &str = "attachments";
const THREAD_INDEX_FILE: &str = "thread_ids.json";

/// Export store writing JSON and attachment files under a root directory
pub struct FileExportStore {
    root: PathBuf,
}

impl FileExportStore {
    /// Create a store rooted at `root`; nothing is created until [`prepare`](ExportStore::prepare)
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.root.join(ATTACHMENTS_DIR)
    }

    pub fn thread_metadata_path(&self, thread_id: &ThreadId) -> PathBuf {
        self.root
            .join(sanitize_filename(&format!("{}_data.json", thread_id)))
    }

    pub fn attachment_path(&self, message_id: &MessageId, attachment: &AttachmentRef) -> PathBuf {
        self.attachments_dir().join(sanitize_filename(&format!(
            "{}_{}",
            message_id, attachment.filename
        )))
    }

    pub fn thread_index_path(&self) -> PathBuf {
        self.root.join(THREAD_INDEX_FILE)
    }
}

impl ExportStore for FileExportStore {
    fn prepare(&self) -> Result<()> {
        let dir = self.attachments_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))
    }

    fn write_thread_metadata(
        &self,
        thread_id: &ThreadId,
        messages: &[MessageMetadata],
    ) -> Result<()> {
        let json = serde_json::to_vec_pretty(messages)
            .with_context(|| format!("Failed to serialize metadata for thread {}", thread_id))?;
        write_atomic(&self.thread_metadata_path(thread_id), &json)
    }

    fn write_attachment(
        &self,
        message_id: &MessageId,
        attachment: &AttachmentRef,
        data: &[u8],
    ) -> Result<()> {
        write_atomic(&self.attachment_path(message_id, attachment), data)
    }

    fn write_thread_index(&self, thread_ids: &[ThreadId]) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(thread_ids).context("Failed to serialize thread index")?;
        write_atomic(&self.thread_index_path(), &json)
    }
}

/// Write to a sibling temp file, then rename over the target
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("Output path has no file name")?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&temp_path, data)
        .with_context(|| format!("Failed to write {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;

    Ok(())
}

/// Make an untrusted name safe to use as a single path component
///
/// Separators, reserved and control characters become `_`. Names that would
/// be empty or resolve to `.`/`..` become `attachment`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "attachment".to_string()
    } else {
        cleaned
    }
}
