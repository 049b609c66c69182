//! Errors returned by the Gmail collaborators

use thiserror::Error;

use crate::fetch::Retryable;

/// Failure of a single Gmail API call
#[derive(Debug, Error)]
pub enum GmailError {
    /// Connection, DNS, TLS or timeout failure before a status was received
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("Gmail API returned HTTP {code}")]
    Status { code: u16 },

    /// Body could not be parsed or decoded
    #[error("malformed response: {0}")]
    Malformed(String),

    /// No usable access token
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl GmailError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }
}

impl Retryable for GmailError {
    /// Transport failures, 429 and 5xx are transient; everything else is not.
    fn is_retryable(&self) -> bool {
        match self {
            GmailError::Transport(_) => true,
            GmailError::Status { code } => *code == 429 || (500..600).contains(code),
            GmailError::Malformed(_) | GmailError::Auth(_) => false,
        }
    }
}

impl From<ureq::Error> for GmailError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => GmailError::Status { code },
            ureq::Error::Json(e) => GmailError::Malformed(e.to_string()),
            other => GmailError::Transport(other.to_string()),
        }
    }
}
