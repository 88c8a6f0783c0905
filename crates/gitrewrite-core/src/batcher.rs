//! Turns rewrite candidates into generator requests within a token budget.

use gitrewrite_git::RewriteCandidate;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::prompt::{
    self, CommitPayload, SUMMARY_SYSTEM_PROMPT, SYSTEM_PROMPT, SummaryPayload, USER_PREAMBLE,
};
use crate::token::{ByteHeuristic, TokenEstimator};

/// Default ceiling on files sent for a single commit.
pub const DEFAULT_MAX_FILES_PER_COMMIT: usize = 200;

/// Who a prompt message is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// A fully prepared request for one commit.
#[derive(Debug, Clone)]
pub struct RewriteRequest {
    pub commit_id: String,
    pub model: String,
    pub temperature: f64,
    /// JSON schema for the reply.
    pub format: Value,
    pub messages: Vec<PromptMessage>,
    /// Built from metadata only; the reply is reduced to one line.
    pub simplified: bool,
    pub estimated_tokens: usize,
}

/// Prepares requests and interprets replies for rewrite candidates.
#[derive(Debug, Clone)]
pub struct Batcher<E = ByteHeuristic> {
    model: String,
    temperature: f64,
    context_window: usize,
    max_files: usize,
    summarize_oversized: bool,
    estimator: E,
}

impl Batcher<ByteHeuristic> {
    /// Create a batcher for `model` with the model's context window size.
    #[must_use]
    pub fn new(model: impl Into<String>, temperature: f64, context_window: usize) -> Self {
        Self {
            model: model.into(),
            temperature,
            context_window,
            max_files: DEFAULT_MAX_FILES_PER_COMMIT,
            summarize_oversized: false,
            estimator: ByteHeuristic,
        }
    }
}

impl<E: TokenEstimator> Batcher<E> {
    /// Replace the token estimator.
    #[must_use]
    pub fn with_estimator<F: TokenEstimator>(self, estimator: F) -> Batcher<F> {
        Batcher {
            model: self.model,
            temperature: self.temperature,
            context_window: self.context_window,
            max_files: self.max_files,
            summarize_oversized: self.summarize_oversized,
            estimator,
        }
    }

    #[must_use]
    pub const fn max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Send metadata-only requests for commits over the file ceiling
    /// instead of failing them.
    #[must_use]
    pub const fn summarize_oversized(mut self, enabled: bool) -> Self {
        self.summarize_oversized = enabled;
        self
    }

    #[must_use]
    pub const fn context_window(&self) -> usize {
        self.context_window
    }

    /// Build the request for a candidate.
    ///
    /// # Errors
    /// Returns `TooManyFiles` for oversized commits when summarizing is off,
    /// or `ContextOverflow` when the request plus reply headroom exceeds the
    /// context window.
    pub fn prepare(&self, candidate: &RewriteCandidate) -> Result<RewriteRequest> {
        let commit = &candidate.commit;
        let file_count = candidate.files.len();
        let simplified = file_count > self.max_files;

        if simplified && !self.summarize_oversized {
            return Err(Error::TooManyFiles {
                commit: commit.short_id().to_string(),
                count: file_count,
                limit: self.max_files,
            });
        }

        let (system, payload) = if simplified {
            tracing::info!(
                commit = %commit.short_id(),
                files = file_count,
                limit = self.max_files,
                "building simplified request for oversized commit"
            );
            let payload = SummaryPayload {
                commit_id: &commit.id,
                message: &commit.message,
                files_changed: file_count,
                directories: prompt::top_level_dirs(&candidate.files),
            };
            (SUMMARY_SYSTEM_PROMPT, serde_json::to_string(&payload)?)
        } else {
            let payload = CommitPayload {
                commit_id: &commit.id,
                message: &commit.message,
                files: &candidate.files,
            };
            (SYSTEM_PROMPT, serde_json::to_string(&payload)?)
        };

        let format = prompt::output_schema();
        let estimated_tokens = self.estimator.estimate(system)
            + self.estimator.estimate(USER_PREAMBLE)
            + self.estimator.estimate(&payload)
            + self.estimator.estimate(&format.to_string());

        let needed = estimated_tokens + self.context_window / 4;
        if needed > self.context_window {
            return Err(Error::ContextOverflow {
                commit: commit.short_id().to_string(),
                needed,
                available: self.context_window,
            });
        }

        tracing::debug!(
            commit = %commit.short_id(),
            tokens = estimated_tokens,
            "prepared rewrite request"
        );

        Ok(RewriteRequest {
            commit_id: commit.id.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            format,
            messages: vec![
                PromptMessage {
                    role: PromptRole::System,
                    content: system.to_string(),
                },
                PromptMessage {
                    role: PromptRole::User,
                    content: USER_PREAMBLE.to_string(),
                },
                PromptMessage {
                    role: PromptRole::User,
                    content: payload,
                },
            ],
            simplified,
            estimated_tokens,
        })
    }

    /// Interpret the generator's reply to `request`.
    ///
    /// # Errors
    /// See [`prompt::parse_response`].
    pub fn parse(&self, request: &RewriteRequest, raw: &str) -> Result<String> {
        prompt::parse_response(&request.commit_id, raw, request.simplified)
    }
}
