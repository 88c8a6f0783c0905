//! Resumable checkpoint journal of rewrite decisions.
//!
//! The journal is a pretty-printed JSON array of [`RewriteDecision`] values.
//! Entries are keyed by commit id, never removed and never overwritten, so a
//! rerun only generates messages for commits that are not yet present.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use gitrewrite_git::RewriteCandidate;

use crate::decision::RewriteDecision;
use crate::error::Result;

/// Default number of new decisions between automatic flushes.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 5;

/// Ordered, commit-addressable store of rewrite decisions.
#[derive(Debug, Clone)]
pub struct CheckpointJournal {
    path: PathBuf,
    decisions: Vec<RewriteDecision>,
    index: HashMap<String, usize>,
    unflushed: usize,
}

impl CheckpointJournal {
    /// Create an empty journal that will be written to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            decisions: Vec::new(),
            index: HashMap::new(),
            unflushed: 0,
        }
    }

    /// Load a journal from disk.
    ///
    /// A missing file gives an empty journal. A file that cannot be read or
    /// parsed is logged and also treated as empty.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut journal = Self::new(path);
        if !journal.path.exists() {
            return journal;
        }

        let parsed: Result<Vec<RewriteDecision>> = fs::read_to_string(&journal.path)
            .map_err(crate::Error::from)
            .and_then(|content| serde_json::from_str(&content).map_err(crate::Error::from));

        match parsed {
            Ok(decisions) => {
                for decision in decisions {
                    journal.insert(decision);
                }
                tracing::debug!(
                    path = %journal.path.display(),
                    entries = journal.len(),
                    "loaded checkpoint journal"
                );
            }
            Err(e) => {
                tracing::error!(
                    path = %journal.path.display(),
                    error = %e,
                    "ignoring unreadable checkpoint journal"
                );
            }
        }

        journal
    }

    /// Path the journal is written to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Whether a decision exists for `commit_id`.
    #[must_use]
    pub fn contains(&self, commit_id: &str) -> bool {
        self.index.contains_key(commit_id)
    }

    /// Look up the decision for a commit.
    #[must_use]
    pub fn get(&self, commit_id: &str) -> Option<&RewriteDecision> {
        self.index.get(commit_id).map(|&idx| &self.decisions[idx])
    }

    /// All decisions in the order they were recorded.
    #[must_use]
    pub fn decisions(&self) -> &[RewriteDecision] {
        &self.decisions
    }

    /// Ids of every commit that already has a decision.
    #[must_use]
    pub fn processed_ids(&self) -> HashSet<&str> {
        self.index.keys().map(String::as_str).collect()
    }

    /// Candidates that still need a decision, in their original order.
    #[must_use]
    pub fn pending<'a>(&self, candidates: &'a [RewriteCandidate]) -> Vec<&'a RewriteCandidate> {
        candidates
            .iter()
            .filter(|c| !self.contains(&c.commit.id))
            .collect()
    }

    /// Add a decision unless one already exists for its commit.
    ///
    /// Returns `false` and leaves the journal untouched for duplicates.
    pub fn record(&mut self, decision: RewriteDecision) -> bool {
        if self.contains(&decision.commit_id) {
            tracing::debug!(commit = %decision.short_id(), "decision already journaled");
            return false;
        }
        self.insert(decision);
        self.unflushed += 1;
        true
    }

    fn insert(&mut self, decision: RewriteDecision) {
        if self.index.contains_key(&decision.commit_id) {
            return;
        }
        self.index
            .insert(decision.commit_id.clone(), self.decisions.len());
        self.decisions.push(decision);
    }

    /// Mark a decision as applied. Applied decisions stay applied.
    ///
    /// Returns `false` if no decision exists for `commit_id`.
    pub fn mark_applied(&mut self, commit_id: &str) -> bool {
        match self.index.get(commit_id) {
            Some(&idx) => {
                let decision = &mut self.decisions[idx];
                if !decision.applied {
                    decision.applied = true;
                    self.unflushed += 1;
                }
                true
            }
            None => false,
        }
    }

    /// Map of commit id to rewritten message.
    #[must_use]
    pub fn rewritten_messages(&self) -> HashMap<String, String> {
        self.decisions
            .iter()
            .map(|d| (d.commit_id.clone(), d.rewritten_message.clone()))
            .collect()
    }

    /// Whether at least `interval` changes happened since the last flush.
    #[must_use]
    pub const fn needs_flush(&self, interval: usize) -> bool {
        interval > 0 && self.unflushed >= interval
    }

    /// Write the journal to disk.
    ///
    /// The content goes to a temporary sibling first and is then renamed
    /// over the journal, so readers never see a partial file.
    ///
    /// # Errors
    /// Returns error if serialization, the write or the rename fails.
    pub fn flush(&mut self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.decisions)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            entries = self.decisions.len(),
            "checkpoint journal flushed"
        );
        self.unflushed = 0;
        Ok(())
    }
}
