//! In-place apply service: reword journaled commits inside the source repository.
//!
//! Commits are rewritten newest first. Rewording a commit changes the ids of
//! everything after it but leaves older ids intact, so the ids still waiting
//! in the journal stay valid for the rest of the run.

use gitrewrite_core::CheckpointJournal;
use gitrewrite_git::InPlaceOps;

/// Errors from an in-place apply.
#[derive(Debug, thiserror::Error)]
pub enum InPlaceError {
    /// A reword failed; `applied` commits were rewritten before it.
    #[error("failed to reword {commit} after {applied} commit(s) were rewritten")]
    Reword {
        commit: String,
        applied: usize,
        #[source]
        source: gitrewrite_git::Error,
    },

    #[error("failed to write journal: {0}")]
    Journal(#[from] gitrewrite_core::Error),
}

/// Outcome of an in-place apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InPlaceSummary {
    pub applied: usize,
    /// Journal entries already applied or no longer in history.
    pub skipped: usize,
}

/// Service for rewording commits in place with trait-based dependencies.
pub struct InPlaceService<'a, I: InPlaceOps> {
    ops: &'a I,
}

impl<'a, I: InPlaceOps> InPlaceService<'a, I> {
    /// Create a new in-place service.
    #[must_use]
    pub const fn new(ops: &'a I) -> Self {
        Self { ops }
    }

    /// Reword every unapplied journal entry, walking `newest_first_ids`.
    ///
    /// The journal is flushed after each successful reword. The first
    /// failure stops the run.
    ///
    /// # Errors
    /// Returns `Reword` on the first failing commit, or `Journal` if the
    /// journal cannot be written.
    pub fn apply(
        &self,
        newest_first_ids: &[String],
        journal: &mut CheckpointJournal,
    ) -> Result<InPlaceSummary, InPlaceError> {
        let mut summary = InPlaceSummary::default();

        let missing = journal
            .decisions()
            .iter()
            .filter(|d| !d.applied && !newest_first_ids.contains(&d.commit_id))
            .count();
        if missing > 0 {
            tracing::warn!(count = missing, "journal entries not found in current history");
            summary.skipped += missing;
        }

        for id in newest_first_ids {
            let Some(decision) = journal.get(id) else {
                continue;
            };
            if decision.applied {
                summary.skipped += 1;
                continue;
            }

            let message = decision.rewritten_message.clone();
            let short = decision.short_id().to_string();

            self.ops
                .reword(id, &message)
                .map_err(|source| InPlaceError::Reword {
                    commit: short.clone(),
                    applied: summary.applied,
                    source,
                })?;

            tracing::debug!(commit = %short, "reworded commit in place");
            journal.mark_applied(id);
            journal.flush()?;
            summary.applied += 1;
        }

        Ok(summary)
    }
}
