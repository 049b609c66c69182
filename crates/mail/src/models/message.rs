//! Message identifiers and the metadata extracted from Gmail messages

use serde::{Deserialize, Serialize};

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Parse an email address from a string like "John Doe <john@example.com>"
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim().trim_matches('"').trim();
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
                email: email.to_string(),
            };
        }

        Self {
            name: None,
            email: s.to_string(),
        }
    }

    /// Parse a header value holding several addresses
    ///
    /// Commas inside quoted display names ("Doe, John" <j@x.com>) do not split.
    pub fn parse_list(s: &str) -> Vec<Self> {
        let mut addresses = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for c in s.chars() {
            match c {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    if !current.trim().is_empty() {
                        addresses.push(Self::parse(&current));
                    }
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(c);
        }

        if !current.trim().is_empty() {
            addresses.push(Self::parse(&current));
        }

        addresses
    }

    /// Format the email address for display
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// An attachment discovered in a message part
///
/// Fields are declared alphabetically so serialized output has sorted keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Original filename from the MIME part (falls back to the attachment id)
    pub filename: String,
    /// Gmail attachment ID used to download the content
    pub id: String,
    /// MIME type of the part (one of the allow-listed types)
    pub mime_type: String,
}

/// Structured metadata extracted from one Gmail message
///
/// Fields are declared alphabetically so serialized output has sorted keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub attachments: Vec<AttachmentRef>,
    pub cc: Vec<String>,
    pub from: Vec<String>,
    pub id: MessageId,
    pub subject: String,
    pub to: Vec<String>,
}

impl MessageMetadata {
    /// Whether the message carries at least one allow-listed attachment
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_with_name() {
        let addr = EmailAddress::parse("John Doe <john@example.com>");
        assert_eq!(addr.name, Some("John Doe".to_string()));
        assert_eq!(addr.email, "john@example.com");
    }

    #[test]
    fn test_parse_email_without_name() {
        let addr = EmailAddress::parse("john@example.com");
        assert_eq!(addr.name, None);
        assert_eq!(addr.email, "john@example.com");
    }

    #[test]
    fn test_parse_email_with_angle_brackets_no_name() {
        let addr = EmailAddress::parse("<john@example.com>");
        assert_eq!(addr.name, None);
        assert_eq!(addr.email, "john@example.com");
    }

    #[test]
    fn test_parse_list_respects_quoted_commas() {
        let addrs =
            EmailAddress::parse_list(r#""Doe, John" <john@example.com>, jane@example.com"#);
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[0].name, Some("Doe, John".to_string()));
        assert_eq!(addrs[0].email, "john@example.com");
        assert_eq!(addrs[1].email, "jane@example.com");
    }

    #[test]
    fn test_parse_list_skips_empty_entries() {
        let addrs = EmailAddress::parse_list("a@example.com, , b@example.com,");
        let emails: Vec<_> = addrs.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_display_with_name() {
        let addr = EmailAddress::with_name("John Doe", "john@example.com");
        assert_eq!(addr.display(), "John Doe <john@example.com>");
    }

    #[test]
    fn test_metadata_serializes_sorted_keys() {
        let meta = MessageMetadata {
            attachments: vec![],
            cc: vec![],
            from: vec!["a@example.com".to_string()],
            id: MessageId::new("m1"),
            subject: "Invoice".to_string(),
            to: vec![],
        };

        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(
            json,
            r#"{"attachments":[],"cc":[],"from":["a@example.com"],"id":"m1","subject":"Invoice","to":[]}"#
        );
        assert!(!meta.has_attachments());
    }
}
