//! Replay service: rebuild every commit in order with journaled messages.

use std::time::Instant;

use anyhow::{Context, Result};
use gitrewrite_git::{CommitRecord, ReplayOutcome, ReplaySink};

use super::RunContext;

/// Outcome of a replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Commits recreated in the target.
    pub applied: usize,
    /// Commits skipped because their tree matched the parent's.
    pub unchanged: usize,
    /// Short id and cause for each commit that could not be replayed.
    pub failed: Vec<(String, String)>,
    pub stopped: bool,
}

/// Service for replaying history with trait-based dependencies.
pub struct ReplayService<'a, R: ReplaySink> {
    sink: &'a R,
}

impl<'a, R: ReplaySink> ReplayService<'a, R> {
    /// Create a new replay service.
    #[must_use]
    pub const fn new(sink: &'a R) -> Self {
        Self { sink }
    }

    /// Replay `commits` oldest first.
    ///
    /// Each commit uses its journaled message when one exists and its
    /// original message otherwise. Journaled commits are marked applied once
    /// replayed. A failing commit is logged and skipped.
    ///
    /// # Errors
    /// Returns error only if the journal cannot be written.
    pub fn run(&self, commits: &[CommitRecord], ctx: &RunContext<'_>) -> Result<ReplaySummary> {
        let messages = ctx.journal().rewritten_messages();
        let mut summary = ReplaySummary::default();

        for commit in commits {
            if ctx.stopped() {
                summary.stopped = true;
                break;
            }

            let short = commit.short_id();
            ctx.progress.begin(short);
            let started = Instant::now();
            let message = messages.get(&commit.id).map_or(commit.message.as_str(), String::as_str);

            match self.sink.apply_commit(commit, message) {
                Ok(outcome) => {
                    match outcome {
                        ReplayOutcome::Committed(oid) => {
                            tracing::debug!(commit = %short, new = %oid, "replayed commit");
                            summary.applied += 1;
                        }
                        ReplayOutcome::Unchanged => {
                            tracing::debug!(commit = %short, "tree unchanged, no commit created");
                            summary.unchanged += 1;
                        }
                    }
                    if messages.contains_key(&commit.id) {
                        ctx.journal().mark_applied(&commit.id);
                    }
                    ctx.progress.succeed(started.elapsed());
                }
                Err(e) => {
                    tracing::warn!(commit = %short, cause = %e, "skipping commit");
                    ctx.progress.fail();
                    summary.failed.push((short.to_string(), e.to_string()));
                }
            }
        }

        ctx.journal()
            .flush()
            .context("Failed to write journal")?;
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_mocks::{MockReplaySink, TestRun, record};
    use gitrewrite_core::{CheckpointJournal, RewriteDecision};

    fn journal_with(dir: &std::path::Path, entries: &[(&str, &str)]) -> CheckpointJournal {
        let mut journal = CheckpointJournal::new(dir.join("j.json"));
        for (id, message) in entries {
            journal.record(RewriteDecision::new(*id, "wip", *message, 1));
        }
        journal
    }

    #[test]
    fn test_uses_journaled_message_or_original() {
        let dir = tempfile::TempDir::new().unwrap();
        let run = TestRun::new(journal_with(dir.path(), &[("bbbb2222", "fix: b (core)")]));
        let sink = MockReplaySink::new();
        let commits = vec![record("aaaa1111", "Initial import"), record("bbbb2222", "wip")];

        let summary = ReplayService::new(&sink).run(&commits, &run.context()).unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(
            sink.calls(),
            vec![
                ("aaaa1111".to_string(), "Initial import".to_string()),
                ("bbbb2222".to_string(), "fix: b (core)".to_string()),
            ]
        );
        let journal = run.journal.lock().unwrap();
        assert!(journal.get("bbbb2222").unwrap().applied);
    }

    #[test]
    fn test_failure_is_skipped_and_run_continues() {
        let dir = tempfile::TempDir::new().unwrap();
        let run = TestRun::new(journal_with(
            dir.path(),
            &[("aaaa1111", "feat: a (x)"), ("bbbb2222", "feat: b (x)")],
        ));
        let sink = MockReplaySink::new().fail_on("aaaa1111");
        let commits = vec![record("aaaa1111", "wip"), record("bbbb2222", "wip")];

        let summary = ReplayService::new(&sink).run(&commits, &run.context()).unwrap();

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "aaaa1111");

        let on_disk = CheckpointJournal::load(dir.path().join("j.json"));
        assert!(!on_disk.get("aaaa1111").unwrap().applied);
        assert!(on_disk.get("bbbb2222").unwrap().applied);
    }

    #[test]
    fn test_unchanged_counts_as_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        let run = TestRun::new(journal_with(dir.path(), &[("aaaa1111", "chore: noop (x)")]));
        let sink = MockReplaySink::new().unchanged_on("aaaa1111");

        let summary = ReplayService::new(&sink)
            .run(&[record("aaaa1111", "wip")], &run.context())
            .unwrap();

        assert_eq!(summary.applied, 0);
        assert_eq!(summary.unchanged, 1);
        assert!(run.journal.lock().unwrap().get("aaaa1111").unwrap().applied);
    }
}
