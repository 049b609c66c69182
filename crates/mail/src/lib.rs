//! Mail crate - Gmail thread harvesting
//!
//! This crate provides the business logic behind the `harvest` binary:
//! - Domain models (ThreadId, Cursor, Page, MessageMetadata)
//! - Gmail API client and OAuth authentication
//! - Concurrent cursor-paginated thread fetching
//! - Attachment export with metadata extraction
//! - Export storage abstractions
//!
//! Network access sits behind the [`ThreadLister`] and [`MessageSource`]
//! traits so the fetch and export stages run against in-memory fakes in tests.

pub mod config;
pub mod export;
pub mod fetch;
pub mod gmail;
pub mod models;
pub mod storage;

pub use config::{GmailCredentials, HarvestSettings};
pub use export::{ExportOptions, ExportStats, export_threads};
pub use fetch::{
    BackoffPolicy, CursorFrontier, FetchError, FetchOptions, ResultAccumulator, Retryable,
    ThreadFetcher, WorkerPool, fetch_all_threads,
};
pub use gmail::{
    GMAIL_READONLY_SCOPE, GmailAuth, GmailClient, GmailError, MessageSource, ThreadLister,
    decode_attachment_data, extract_metadata,
};
pub use models::{AttachmentRef, Cursor, EmailAddress, MessageId, MessageMetadata, Page, ThreadId};
pub use storage::{ExportStore, FileExportStore, InMemoryExportStore};
