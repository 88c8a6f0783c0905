//! Mock implementations for testing services.
//!
//! These mocks implement the traits from gitrewrite-git and gitrewrite-ollama
//! so service logic can be tested without a model server or real rebases.

#![allow(clippy::unwrap_used, dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, PoisonError};

use chrono::DateTime;
use gitrewrite_core::{CheckpointJournal, Progress};
use gitrewrite_git::{
    CommitRecord, InPlaceOps, Oid, ReplayOutcome, ReplaySink, Result as GitResult,
    RewriteCandidate,
};
use gitrewrite_ollama::{ChatApi, ChatRequest, Result as OllamaResult};
use serde_json::{Value, json};

use super::RunContext;

/// Owned stop flag, progress and journal for building a [`RunContext`].
pub struct TestRun {
    pub stop: AtomicBool,
    pub progress: Progress,
    pub journal: Mutex<CheckpointJournal>,
}

impl TestRun {
    pub fn new(journal: CheckpointJournal) -> Self {
        Self {
            stop: AtomicBool::new(false),
            progress: Progress::new(0),
            journal: Mutex::new(journal),
        }
    }

    pub fn context(&self) -> RunContext<'_> {
        RunContext {
            stop: &self.stop,
            progress: &self.progress,
            journal: &self.journal,
            checkpoint_interval: 5,
        }
    }
}

pub fn record(id: &str, message: &str) -> CommitRecord {
    let time = DateTime::parse_from_rfc3339("2024-05-01T12:00:00+00:00").unwrap();
    CommitRecord {
        id: id.to_string(),
        message: message.to_string(),
        parent_id: None,
        author_name: "Ada".into(),
        author_email: "ada@example.com".into(),
        author_time: time,
        committer_name: "Ada".into(),
        committer_email: "ada@example.com".into(),
        committer_time: time,
        needs_rewrite: true,
    }
}

pub fn candidate(id: &str, message: &str) -> RewriteCandidate {
    RewriteCandidate {
        commit: record(id, message),
        files: Vec::new(),
    }
}

/// Canned replies for a commit.
enum Reply {
    Entries(Vec<Value>),
    Raw(String),
    Error(String),
}

/// Mock implementation of `ChatApi`.
///
/// Replies are keyed by the `commit_id` in the request payload. Commits
/// without a canned reply get a generic `chore` message.
pub struct MockChat {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    context: usize,
}

impl Default for MockChat {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChat {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            context: 8192,
        }
    }

    /// Add one message entry to the reply for `commit_id`.
    pub fn with_message(self, commit_id: &str, kind: &str, description: &str, app: &str) -> Self {
        let entry = json!({ "type": kind, "description": description, "affected_app": app });
        {
            let mut replies = self.replies.lock().unwrap();
            match replies
                .entry(commit_id.to_string())
                .or_insert_with(|| Reply::Entries(Vec::new()))
            {
                Reply::Entries(entries) => entries.push(entry),
                other => *other = Reply::Entries(vec![entry]),
            }
        }
        self
    }

    pub fn with_reply(self, commit_id: &str, raw: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(commit_id.to_string(), Reply::Raw(raw.to_string()));
        self
    }

    pub fn with_error(self, commit_id: &str, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(commit_id.to_string(), Reply::Error(message.to_string()));
        self
    }

    /// Commit ids the mock was asked about, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn payload_commit_id(request: &ChatRequest) -> String {
    request
        .messages
        .last()
        .and_then(|m| serde_json::from_str::<Value>(&m.content).ok())
        .and_then(|v| v["commit_id"].as_str().map(str::to_string))
        .unwrap_or_default()
}

impl ChatApi for MockChat {
    async fn ping(&self) -> OllamaResult<()> {
        Ok(())
    }

    async fn context_length(&self, _model: &str) -> OllamaResult<usize> {
        Ok(self.context)
    }

    async fn chat(&self, request: &ChatRequest) -> OllamaResult<String> {
        let commit_id = payload_commit_id(request);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(commit_id.clone());

        let replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        match replies.get(&commit_id) {
            Some(Reply::Entries(entries)) => {
                Ok(json!({ "commit_id": commit_id, "messages": entries }).to_string())
            }
            Some(Reply::Raw(raw)) => Ok(raw.clone()),
            Some(Reply::Error(message)) => Err(gitrewrite_ollama::Error::ApiError {
                status: 404,
                message: message.clone(),
            }),
            None => Ok(json!({
                "commit_id": commit_id,
                "messages": [{ "type": "chore", "description": "update files", "affected_app": "repo" }]
            })
            .to_string()),
        }
    }
}

/// Mock implementation of `ReplaySink`.
pub struct MockReplaySink {
    calls: RefCell<Vec<(String, String)>>,
    fail: HashSet<String>,
    unchanged: HashSet<String>,
}

impl Default for MockReplaySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReplaySink {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail: HashSet::new(),
            unchanged: HashSet::new(),
        }
    }

    pub fn fail_on(mut self, commit_id: &str) -> Self {
        self.fail.insert(commit_id.to_string());
        self
    }

    pub fn unchanged_on(mut self, commit_id: &str) -> Self {
        self.unchanged.insert(commit_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.borrow().clone()
    }
}

impl ReplaySink for MockReplaySink {
    fn apply_commit(&self, commit: &CommitRecord, message: &str) -> GitResult<ReplayOutcome> {
        self.calls
            .borrow_mut()
            .push((commit.id.clone(), message.to_string()));

        if self.fail.contains(&commit.id) {
            return Err(gitrewrite_git::Error::CommitNotFound(commit.id.clone()));
        }
        if self.unchanged.contains(&commit.id) {
            return Ok(ReplayOutcome::Unchanged);
        }
        Ok(ReplayOutcome::Committed(Oid::zero()))
    }
}

/// Mock implementation of `InPlaceOps`.
pub struct MockInPlace {
    calls: RefCell<Vec<(String, String)>>,
    fail: HashSet<String>,
}

impl Default for MockInPlace {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInPlace {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail: HashSet::new(),
        }
    }

    pub fn fail_on(mut self, commit_id: &str) -> Self {
        self.fail.insert(commit_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.borrow().clone()
    }
}

impl InPlaceOps for MockInPlace {
    fn reword(&self, target: &str, message: &str) -> GitResult<()> {
        self.calls
            .borrow_mut()
            .push((target.to_string(), message.to_string()));

        if self.fail.contains(target) {
            return Err(gitrewrite_git::Error::RewriteFailed {
                output: "error: could not apply".into(),
            });
        }
        Ok(())
    }
}
