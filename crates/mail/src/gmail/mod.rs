//! Gmail API integration
//!
//! This module provides:
//! - OAuth2 authentication flow with an on-disk token store
//! - Gmail API client for listing threads and downloading attachments
//! - Metadata extraction from raw Gmail messages
//! - The collaborator traits the fetch and export stages are written against

mod auth;
mod client;
mod error;
mod normalize;

pub use auth::{GmailAuth, GMAIL_READONLY_SCOPE};
pub use client::GmailClient;
pub use error::GmailError;
pub use normalize::{ALLOWED_ATTACHMENT_TYPES, decode_attachment_data, extract_metadata};

use crate::models::{Cursor, MessageId, Page, ThreadId};
use api::GmailMessage;

/// Paginated listing of the user's threads
///
/// Implementations must be shareable across the fetch worker threads.
pub trait ThreadLister: Send + Sync {
    /// Fetch one page of thread references
    ///
    /// `cursor` is `None` for the first page.
    fn list_threads(&self, cursor: Option<&Cursor>, page_size: u32) -> Result<Page, GmailError>;
}

/// Access to full threads and their attachment content
pub trait MessageSource: Send + Sync {
    /// Fetch every message of a thread with full payloads
    fn get_thread(&self, id: &ThreadId) -> Result<Vec<GmailMessage>, GmailError>;

    /// Download an attachment and return its decoded bytes
    fn get_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<Vec<u8>, GmailError>;
}

/// Gmail API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from `users.threads.list`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListThreadsResponse {
        pub threads: Option<Vec<ThreadRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a thread as returned by the listing
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ThreadRef {
        pub id: String,
        pub snippet: Option<String>,
        pub history_id: Option<String>,
    }

    /// Response from `users.threads.get`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailThread {
        pub id: String,
        pub messages: Option<Vec<GmailMessage>>,
        pub next_page_token: Option<String>,
    }

    /// Full message from Gmail API
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: Option<String>,
        pub label_ids: Option<Vec<String>>,
        #[serde(default)]
        pub snippet: String,
        pub payload: Option<MessagePayload>,
    }

    /// Message payload containing headers and body
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
        pub mime_type: Option<String>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Message body; attachments carry an ID instead of inline data
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageBody {
        pub size: Option<u32>,
        pub data: Option<String>,
        pub attachment_id: Option<String>,
    }

    /// Message part (for multipart messages)
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Response from `users.messages.attachments.get`
    ///
    /// `data` is base64 in the URL-safe alphabet.
    #[derive(Debug, Deserialize)]
    pub struct AttachmentResponse {
        pub size: Option<u32>,
        pub data: String,
    }
}

#[cfg(test)]
mod tests {
    use super::api::*;

    #[test]
    fn test_parse_list_threads_response() {
        let json = r#"{
            "threads": [
                {"id": "18c1", "snippet": "Hello", "historyId": "991"},
                {"id": "18c2", "snippet": "", "historyId": "992"}
            ],
            "nextPageToken": "09876",
            "resultSizeEstimate": 201
        }"#;

        let resp: ListThreadsResponse = serde_json::from_str(json).unwrap();
        let threads = resp.threads.unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[1].id, "18c2");
        assert_eq!(resp.next_page_token.as_deref(), Some("09876"));
    }

    #[test]
    fn test_parse_last_page_without_threads() {
        let resp: ListThreadsResponse =
            serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(resp.threads.is_none());
        assert!(resp.next_page_token.is_none());
    }

    #[test]
    fn test_parse_attachment_part() {
        let json = r#"{
            "partId": "1",
            "mimeType": "application/pdf",
            "filename": "invoice.pdf",
            "body": {"size": 5120, "attachmentId": "ANGjdJ8"}
        }"#;

        let part: MessagePart = serde_json::from_str(json).unwrap();
        let body = part.body.unwrap();
        assert_eq!(body.attachment_id.as_deref(), Some("ANGjdJ8"));
        assert!(body.data.is_none());
    }
}
