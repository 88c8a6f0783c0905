//! Per-file diff extraction between a commit and its first parent.

use git2::{Commit, DiffOptions as Git2DiffOptions, Patch};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Repository;
use crate::error::Result;

/// Default byte cap applied to each file's diff text.
pub const DEFAULT_MAX_DIFF_LENGTH: usize = 2048;

/// A single changed file and its (possibly truncated) patch text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path after the change, or before it for deletions.
    pub path: String,
    /// Unified diff text, at most `max_diff_length` bytes.
    pub diff: String,
}

/// Options controlling diff extraction.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Maximum number of bytes kept from each file's patch.
    pub max_diff_length: usize,
    /// Paths matching this pattern are left out entirely.
    pub exclude: Option<Regex>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            max_diff_length: DEFAULT_MAX_DIFF_LENGTH,
            exclude: None,
        }
    }
}

impl DiffOptions {
    /// Check whether a path is filtered out by the exclusion pattern.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude.as_ref().is_some_and(|re| re.is_match(path))
    }
}

impl Repository {
    /// Compute the changed files of a commit against its first parent.
    ///
    /// Root commits are diffed against the empty tree. Merge commits only
    /// see the changes relative to their first parent.
    ///
    /// # Errors
    /// Returns error if either tree cannot be resolved or the diff fails.
    pub fn file_changes(&self, commit: &Commit<'_>, options: &DiffOptions) -> Result<Vec<FileChange>> {
        let new_tree = commit.tree()?;
        let old_tree = match commit.parent_ids().next() {
            Some(parent_id) => Some(self.inner().find_commit(parent_id)?.tree()?),
            None => None,
        };

        let mut diff_opts = Git2DiffOptions::new();
        diff_opts.context_lines(3);
        let diff = self.inner().diff_tree_to_tree(
            old_tree.as_ref(),
            Some(&new_tree),
            Some(&mut diff_opts),
        )?;

        let mut changes = Vec::with_capacity(diff.deltas().len());
        for (idx, delta) in diff.deltas().enumerate() {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().into_owned());
            let Some(path) = path else {
                continue;
            };

            if options.is_excluded(&path) {
                continue;
            }

            let text = match Patch::from_diff(&diff, idx)? {
                Some(mut patch) => {
                    let buf = patch.to_buf()?;
                    String::from_utf8_lossy(&buf).into_owned()
                }
                None => String::new(),
            };

            changes.push(FileChange {
                path,
                diff: truncate_diff(&text, options.max_diff_length).to_string(),
            });
        }

        Ok(changes)
    }
}

/// Cut a diff down to at most `max_len` bytes.
///
/// The cut is a plain byte cap that may land mid-line; it only moves back as
/// far as needed to stay on a UTF-8 character boundary.
#[must_use]
pub fn truncate_diff(diff: &str, max_len: usize) -> &str {
    if diff.len() <= max_len {
        return diff;
    }

    let mut end = max_len;
    while !diff.is_char_boundary(end) {
        end -= 1;
    }
    &diff[..end]
}
