//! Gmail API HTTP client
//!
//! Provides the thread listing and attachment download calls used by the
//! fetch and export stages. Uses synchronous HTTP (ureq) so each fetch worker
//! can block on its own request without an async runtime.

use anyhow::Result;
use log::debug;
use serde::de::DeserializeOwned;
use url::Url;

use super::api::{AttachmentResponse, GmailMessage, GmailThread, ListThreadsResponse};
use super::{GmailAuth, GmailError, MessageSource, ThreadLister, decode_attachment_data};
use crate::models::{Cursor, MessageId, Page, ThreadId};

/// Gmail API client
pub struct GmailClient {
    auth: GmailAuth,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Upper bound Gmail accepts for `maxResults`
    const MAX_PAGE_SIZE: u32 = 500;

    /// Create a new Gmail client
    pub fn new(auth: GmailAuth) -> Self {
        Self { auth }
    }

    /// Obtain a valid credential, running the consent flow if needed
    ///
    /// Call this before fetching: credential problems are fatal and should
    /// surface before any worker starts.
    pub fn authenticate(&self) -> Result<()> {
        self.auth.get_access_token()?;
        Ok(())
    }

    /// List one page of threads
    ///
    /// # Arguments
    /// * `page_token` - Token from the previous page, `None` for the first page
    /// * `max_results` - Page size, clamped to 1..=500
    pub fn list_threads_page(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ListThreadsResponse, GmailError> {
        let mut url = self.endpoint("users/me/threads")?;
        url.query_pairs_mut().append_pair(
            "maxResults",
            &max_results.clamp(1, Self::MAX_PAGE_SIZE).to_string(),
        );
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pageToken", token);
        }

        self.get_json(&url)
    }

    /// Get a thread with full message payloads
    ///
    /// Follows `nextPageToken` if the response is split across pages.
    pub fn get_thread_messages(&self, id: &ThreadId) -> Result<Vec<GmailMessage>, GmailError> {
        let path = format!("users/me/threads/{}", urlencoding::encode(id.as_str()));
        let mut messages = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.endpoint(&path)?;
            url.query_pairs_mut().append_pair("format", "full");
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let thread: GmailThread = self.get_json(&url)?;
            messages.extend(thread.messages.unwrap_or_default());

            match thread.next_page_token {
                Some(next) if page_token.as_deref() != Some(next.as_str()) => {
                    page_token = Some(next)
                }
                _ => break,
            }
        }

        Ok(messages)
    }

    /// Download an attachment and decode it to raw bytes
    pub fn download_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<Vec<u8>, GmailError> {
        let path = format!(
            "users/me/messages/{}/attachments/{}",
            urlencoding::encode(message_id.as_str()),
            urlencoding::encode(attachment_id)
        );
        let url = self.endpoint(&path)?;

        let attachment: AttachmentResponse = self.get_json(&url)?;
        decode_attachment_data(&attachment.data)
            .map_err(|e| GmailError::malformed(format!("{e:#}")))
    }

    fn endpoint(&self, path: &str) -> Result<Url, GmailError> {
        Url::parse(&format!("{}/{}", Self::BASE_URL, path))
            .map_err(|e| GmailError::malformed(format!("invalid request URL: {e}")))
    }

    /// Authorized GET returning a JSON body
    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, GmailError> {
        let access_token = self
            .auth
            .get_access_token()
            .map_err(|e| GmailError::auth(format!("{e:#}")))?;

        debug!("GET {}", url.path());

        let mut response = ureq::get(url.as_str())
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()?;

        Ok(response.body_mut().read_json()?)
    }
}

impl ThreadLister for GmailClient {
    fn list_threads(&self, cursor: Option<&Cursor>, page_size: u32) -> Result<Page, GmailError> {
        let response = self.list_threads_page(cursor.map(Cursor::as_str), page_size)?;

        let items = response
            .threads
            .unwrap_or_default()
            .into_iter()
            .map(|t| ThreadId::new(t.id))
            .collect();

        let next = response
            .next_page_token
            .filter(|token| !token.is_empty())
            .map(Cursor::new);

        Ok(Page::new(items, next))
    }
}

impl MessageSource for GmailClient {
    fn get_thread(&self, id: &ThreadId) -> Result<Vec<GmailMessage>, GmailError> {
        self.get_thread_messages(id)
    }

    fn get_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<Vec<u8>, GmailError> {
        self.download_attachment(message_id, attachment_id)
    }
}
