//! The per-commit outcome of message generation.

use serde::{Deserialize, Serialize};

/// A generated replacement message for one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteDecision {
    pub commit_id: String,

    /// Source message with surrounding whitespace removed.
    pub original_message: String,

    pub rewritten_message: String,

    /// Number of changed files sent to the generator.
    pub files_changed: usize,

    /// Set once the message has been written into a repository.
    #[serde(rename = "is_applied")]
    pub applied: bool,
}

impl RewriteDecision {
    /// Create an unapplied decision.
    #[must_use]
    pub fn new(
        commit_id: impl Into<String>,
        original_message: &str,
        rewritten_message: impl Into<String>,
        files_changed: usize,
    ) -> Self {
        Self {
            commit_id: commit_id.into(),
            original_message: original_message.trim().to_string(),
            rewritten_message: rewritten_message.into(),
            files_changed,
            applied: false,
        }
    }

    /// First eight characters of the commit id.
    #[must_use]
    pub fn short_id(&self) -> &str {
        &self.commit_id[..8.min(self.commit_id.len())]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_field_names() {
        let decision = RewriteDecision::new("abc123", "  wip\n", "chore: tidy (core)", 2);
        let value = serde_json::to_value(&decision).unwrap();

        assert_eq!(value["commit_id"], "abc123");
        assert_eq!(value["original_message"], "wip");
        assert_eq!(value["rewritten_message"], "chore: tidy (core)");
        assert_eq!(value["files_changed"], 2);
        assert_eq!(value["is_applied"], false);
    }

    #[test]
    fn test_short_id() {
        let decision = RewriteDecision::new("0123456789abcdef", "x", "y", 0);
        assert_eq!(decision.short_id(), "01234567");
        let short = RewriteDecision::new("abc", "x", "y", 0);
        assert_eq!(short.short_id(), "abc");
    }
}
