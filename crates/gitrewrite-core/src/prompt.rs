//! Prompt text, output schema and response parsing for message generation.

use std::collections::BTreeSet;

use gitrewrite_git::FileChange;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};

/// Conventional commit types accepted from the generator.
pub const ALLOWED_TYPES: [&str; 6] = ["feat", "fix", "chore", "docs", "refactor", "perf"];

/// Responses longer than this are cut before logging.
const RAW_LOG_LIMIT: usize = 1000;

pub const SYSTEM_PROMPT: &str = "Act as a senior engineer enforcing Conventional Commits. \
Input: commit data with id, message and per-file diffs. \
Output: JSON with commit_id and a messages array; each message has the fields type, description and affected_app. Rules:\n\
1. Types: feat, fix, chore, docs, refactor, perf\n\
2. Max 100 characters\n\
3. Explain what changed and why\n\
4. One message per logical change\n\
5. Group related files under one message\n\
6. Never use markdown or symbols\n\
7. Derive the affected app name from the file paths\n\
8. Example: {\"type\":\"chore\",\"description\":\"upgrade Docker image to v21.3.1\",\"affected_app\":\"hortusfox\"}";

pub const SUMMARY_SYSTEM_PROMPT: &str = "Act as a senior engineer enforcing Conventional Commits. \
Input: metadata of a large commit: id, original message, number of changed files and the top-level directories touched. \
Output: JSON with commit_id and a messages array holding exactly one message with the fields type, description and affected_app. Rules:\n\
1. Types: feat, fix, chore, docs, refactor, perf\n\
2. Max 100 characters\n\
3. Summarize the overall intent of the change\n\
4. Never use markdown or symbols\n\
5. Derive the affected app name from the directories";

pub const USER_PREAMBLE: &str = "Generate a new commit message for the following commit:";

/// JSON schema the generator's reply must follow.
#[must_use]
pub fn output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "commit_id": { "type": "string" },
            "messages": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string", "enum": ALLOWED_TYPES },
                        "description": { "type": "string" },
                        "affected_app": { "type": "string" }
                    },
                    "required": ["type", "description", "affected_app"]
                }
            }
        },
        "required": ["commit_id", "messages"]
    })
}

/// Full commit payload: id, message and every file diff.
#[derive(Debug, Serialize)]
pub struct CommitPayload<'a> {
    pub commit_id: &'a str,
    pub message: &'a str,
    pub files: &'a [FileChange],
}

/// Metadata-only payload for commits with too many files.
#[derive(Debug, Serialize)]
pub struct SummaryPayload<'a> {
    pub commit_id: &'a str,
    pub message: &'a str,
    pub files_changed: usize,
    pub directories: Vec<String>,
}

/// Sorted, deduplicated first path components. Files at the root count as `.`.
#[must_use]
pub fn top_level_dirs(files: &[FileChange]) -> Vec<String> {
    files
        .iter()
        .map(|f| match f.path.split_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Deserialize)]
struct GeneratedMessage {
    #[serde(default)]
    commit_id: String,
    #[serde(default)]
    messages: Vec<GeneratedEntry>,
}

#[derive(Debug, Deserialize)]
struct GeneratedEntry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    affected_app: String,
}

impl GeneratedEntry {
    fn is_allowed(&self) -> bool {
        ALLOWED_TYPES.contains(&self.kind.as_str())
    }

    fn render(&self) -> String {
        if self.affected_app.trim().is_empty() {
            format!("{}: {}", self.kind, self.description.trim())
        } else {
            format!(
                "{}: {} ({})",
                self.kind,
                self.description.trim(),
                self.affected_app.trim()
            )
        }
    }
}

/// Turn a generator reply into a commit message.
///
/// Entries with a type outside [`ALLOWED_TYPES`] are dropped and the rest
/// are joined one per line. With `first_only`, only the first usable entry
/// is kept.
///
/// # Errors
/// Returns `MalformedResponse` if the reply is not valid JSON, or
/// `NoUsableEntries` if nothing survives filtering.
pub fn parse_response(commit_id: &str, raw: &str, first_only: bool) -> Result<String> {
    let parsed: GeneratedMessage = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            let truncated = truncate_raw(raw);
            tracing::error!(commit = %short(commit_id), error = %e, "failed to parse generator response");
            tracing::error!("raw response (truncated):");
            for line in truncated.lines() {
                tracing::error!("  {line}");
            }
            return Err(Error::MalformedResponse {
                commit: commit_id.to_string(),
                message: e.to_string(),
                raw: truncated,
            });
        }
    };

    if !parsed.commit_id.is_empty()
        && !commit_id.starts_with(&parsed.commit_id)
        && !parsed.commit_id.starts_with(commit_id)
    {
        tracing::warn!(
            commit = %short(commit_id),
            returned = %parsed.commit_id,
            "response names a different commit"
        );
    }

    let limit = if first_only { 1 } else { usize::MAX };
    let lines: Vec<String> = parsed
        .messages
        .iter()
        .filter(|entry| entry.is_allowed())
        .take(limit)
        .map(GeneratedEntry::render)
        .collect();

    if lines.is_empty() {
        return Err(Error::NoUsableEntries(commit_id.to_string()));
    }
    Ok(lines.join("\n"))
}

/// Cap a raw response at 1000 bytes, ending truncated text with `...`.
#[must_use]
pub fn truncate_raw(raw: &str) -> String {
    if raw.len() <= RAW_LOG_LIMIT {
        return raw.to_string();
    }
    let mut end = RAW_LOG_LIMIT - 3;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &raw[..end])
}

fn short(id: &str) -> &str {
    &id[..8.min(id.len())]
}
