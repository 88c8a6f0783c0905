//! Message generation service.
//!
//! Prepares a request per candidate, sends it to the chat model and
//! journals the resulting decision. Failures are logged and skipped.

use std::time::Instant;

use anyhow::{Context, Result};
use gitrewrite_core::batcher::{PromptMessage, PromptRole};
use gitrewrite_core::{Batcher, ByteHeuristic, RewriteDecision, RewriteRequest, TokenEstimator};
use gitrewrite_git::RewriteCandidate;
use gitrewrite_ollama::{ChatApi, ChatMessage, ChatRequest};

use super::RunContext;

/// Why a single commit got no new message.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Core(#[from] gitrewrite_core::Error),

    #[error(transparent)]
    Chat(#[from] gitrewrite_ollama::Error),
}

/// Outcome of a generation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    pub generated: usize,
    pub failed: usize,
    /// The pass ended early because of an interrupt.
    pub stopped: bool,
}

/// Service for generating replacement messages with trait-based dependencies.
pub struct GenerateService<'a, C: ChatApi, E: TokenEstimator = ByteHeuristic> {
    client: &'a C,
    batcher: Batcher<E>,
}

#[allow(clippy::future_not_send)]
impl<'a, C: ChatApi, E: TokenEstimator> GenerateService<'a, C, E> {
    /// Create a new generate service.
    #[must_use]
    pub const fn new(client: &'a C, batcher: Batcher<E>) -> Self {
        Self { client, batcher }
    }

    /// Generate a decision for one candidate.
    ///
    /// The request is checked against the context window before anything is
    /// sent, so an oversized commit never reaches the model.
    pub async fn generate(
        &self,
        candidate: &RewriteCandidate,
    ) -> std::result::Result<RewriteDecision, GenerateError> {
        let request = self.batcher.prepare(candidate)?;
        let raw = self.client.chat(&chat_request(&request)).await?;
        let message = self.batcher.parse(&request, &raw)?;

        Ok(RewriteDecision::new(
            candidate.commit.id.clone(),
            &candidate.commit.message,
            message,
            candidate.files.len(),
        ))
    }

    /// Generate decisions for `pending`, oldest first, journaling each one.
    ///
    /// # Errors
    /// Returns error only if the journal cannot be written.
    pub async fn run(
        &self,
        pending: &[RewriteCandidate],
        ctx: &RunContext<'_>,
    ) -> Result<GenerateSummary> {
        let mut summary = GenerateSummary::default();

        for candidate in pending {
            if ctx.stopped() {
                summary.stopped = true;
                break;
            }

            let short = candidate.commit.short_id();
            ctx.progress.begin(short);
            let started = Instant::now();

            match self.generate(candidate).await {
                Ok(decision) => {
                    tracing::debug!(
                        commit = %short,
                        message = %decision.rewritten_message,
                        "generated message"
                    );
                    let mut journal = ctx.journal();
                    journal.record(decision);
                    if journal.needs_flush(ctx.checkpoint_interval) || ctx.stopped() {
                        journal.flush().context("Failed to write checkpoint")?;
                    }
                    drop(journal);

                    ctx.progress.succeed(started.elapsed());
                    summary.generated += 1;
                }
                Err(e) => {
                    tracing::warn!(commit = %short, cause = %e, "skipping commit");
                    ctx.progress.fail();
                    summary.failed += 1;
                }
            }
        }

        ctx.journal()
            .flush()
            .context("Failed to write checkpoint")?;
        Ok(summary)
    }
}

fn chat_request(request: &RewriteRequest) -> ChatRequest {
    let messages = request.messages.iter().map(chat_message).collect();
    ChatRequest::new(request.model.clone(), messages, request.temperature)
        .with_format(request.format.clone())
}

fn chat_message(message: &PromptMessage) -> ChatMessage {
    match message.role {
        PromptRole::System => ChatMessage::system(message.content.clone()),
        PromptRole::User => ChatMessage::user(message.content.clone()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_mocks::{MockChat, TestRun, candidate};
    use gitrewrite_core::CheckpointJournal;
    use gitrewrite_git::FileChange;

    fn batcher() -> Batcher {
        Batcher::new("mock", 0.1, 8192)
    }

    #[tokio::test]
    async fn test_generate_renders_decision() {
        let chat = MockChat::new()
            .with_message("aaaa1111", "feat", "add parser", "core")
            .with_message("aaaa1111", "docs", "describe parser", "");
        let service = GenerateService::new(&chat, batcher());

        let decision = service.generate(&candidate("aaaa1111", "wip\n")).await.unwrap();
        assert_eq!(decision.commit_id, "aaaa1111");
        assert_eq!(decision.original_message, "wip");
        assert_eq!(decision.rewritten_message, "feat: add parser (core)\ndocs: describe parser");
        assert!(!decision.applied);
    }

    #[tokio::test]
    async fn test_overflow_never_calls_chat() {
        let chat = MockChat::new();
        let service = GenerateService::new(&chat, Batcher::new("mock", 0.1, 2048));

        let mut big = candidate("bbbb2222", "wip");
        big.files.push(FileChange {
            path: "huge.txt".into(),
            diff: "x".repeat(8000),
        });

        let err = service.generate(&big).await.unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Core(gitrewrite_core::Error::ContextOverflow { .. })
        ));
        assert!(chat.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_skips_failures_and_journals_the_rest() {
        let dir = tempfile::TempDir::new().unwrap();
        let run = TestRun::new(CheckpointJournal::new(dir.path().join("j.json")));
        let chat = MockChat::new()
            .with_message("aaaa1111", "fix", "one", "a")
            .with_error("bbbb2222", "model not found")
            .with_message("cccc3333", "chore", "three", "c");
        let pending = vec![
            candidate("aaaa1111", "x"),
            candidate("bbbb2222", "y"),
            candidate("cccc3333", "z"),
        ];

        let summary = GenerateService::new(&chat, batcher())
            .run(&pending, &run.context())
            .await
            .unwrap();

        assert_eq!(summary.generated, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.stopped);
        assert_eq!(run.progress.snapshot().failed, 1);

        let on_disk = CheckpointJournal::load(dir.path().join("j.json"));
        assert_eq!(on_disk.len(), 2);
        assert!(on_disk.contains("aaaa1111"));
        assert!(!on_disk.contains("bbbb2222"));
    }

    #[tokio::test]
    async fn test_run_honors_stop_flag() {
        let dir = tempfile::TempDir::new().unwrap();
        let run = TestRun::new(CheckpointJournal::new(dir.path().join("j.json")));
        run.journal.lock().unwrap().record(RewriteDecision::new(
            "aaaa1111",
            "wip",
            "feat: add parser (core)",
            1,
        ));
        assert!(!dir.path().join("j.json").exists());
        run.stop.store(true, std::sync::atomic::Ordering::SeqCst);
        let chat = MockChat::new();

        let summary = GenerateService::new(&chat, batcher())
            .run(&[candidate("bbbb2222", "x")], &run.context())
            .await
            .unwrap();

        assert!(summary.stopped);
        assert_eq!(summary.generated, 0);
        assert!(chat.calls().is_empty());

        // Decisions made before the stop are on disk
        let on_disk = CheckpointJournal::load(dir.path().join("j.json"));
        assert_eq!(on_disk.len(), 1);
        assert_eq!(
            on_disk.get("aaaa1111").unwrap().rewritten_message,
            "feat: add parser (core)"
        );
    }

    #[tokio::test]
    async fn test_malformed_reply_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let run = TestRun::new(CheckpointJournal::new(dir.path().join("j.json")));
        let chat = MockChat::new().with_reply("aaaa1111", "not json");

        let summary = GenerateService::new(&chat, batcher())
            .run(&[candidate("aaaa1111", "x")], &run.context())
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert!(run.journal.lock().unwrap().is_empty());
    }
}
