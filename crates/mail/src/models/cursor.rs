//! Pagination cursor and page types for the threads listing

use serde::{Deserialize, Serialize};

use super::ThreadId;

/// Opaque page token issued by the Gmail listing API
///
/// Tokens are single-use: the engine never sends the same value twice.
/// The first page is requested with no cursor at all (`Option::None`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One listing result: thread references in provider order plus the
/// cursor of the following page, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<ThreadId>,
    pub next: Option<Cursor>,
}

impl Page {
    pub fn new(items: Vec<ThreadId>, next: Option<Cursor>) -> Self {
        Self { items, next }
    }

    /// Whether this page ends its pagination path
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}
