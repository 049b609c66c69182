//! Thread identifier as returned by the Gmail threads listing

use serde::{Deserialize, Serialize};

/// Unique identifier for a thread (Gmail thread ID)
///
/// This is the identity key used to deduplicate fetch results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_plain_string() {
        let ids = vec![ThreadId::new("18c1"), ThreadId::new("18c2")];
        let json = serde_json::to_string(&ids).unwrap();
        assert_eq!(json, r#"["18c1","18c2"]"#);

        let back: Vec<ThreadId> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ids);
    }
}
