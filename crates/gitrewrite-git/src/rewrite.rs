//! In-place message rewrite through an interactive rebase.
//!
//! The rebase is driven by two editor substitutions: a sequence editor that
//! turns the target's `pick` line into `reword`, and a message editor that
//! replaces the commit message buffer. Both read a [`RewritePlan`] from disk,
//! so the editor program can be a separate process.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::Repository;
use crate::error::{Error, Result};
use crate::traits::InPlaceOps;

/// Shortest abbreviated id accepted when matching todo lines.
const MIN_ID_PREFIX: usize = 4;

const PLAN_FILE: &str = "rewrite-plan.json";

/// What to rewrite during one in-place run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewritePlan {
    pub target_commit_id: String,
    pub new_message: String,
}

impl RewritePlan {
    /// Read a plan file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the plan as JSON.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Check whether an abbreviated or full id names the target commit.
    fn is_target(&self, id: &str) -> bool {
        id.len() >= MIN_ID_PREFIX
            && id.chars().all(|c| c.is_ascii_hexdigit())
            && self
                .target_commit_id
                .to_ascii_lowercase()
                .starts_with(&id.to_ascii_lowercase())
    }
}

/// Supplies the edits made while a rebase is running.
#[allow(clippy::missing_errors_doc)]
pub trait RewriteInstructionProvider {
    /// Transform the rebase todo list.
    fn transform_sequence(&self, lines: Vec<String>) -> Result<Vec<String>>;

    /// The replacement message for a commit, or `None` to keep the buffer.
    fn provide_message(&self, commit_id: &str) -> Option<String>;
}

impl RewriteInstructionProvider for RewritePlan {
    fn transform_sequence(&self, mut lines: Vec<String>) -> Result<Vec<String>> {
        let matches: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| {
                let mut tokens = line.split_whitespace();
                matches!(tokens.next(), Some("pick" | "p"))
                    && tokens.next().is_some_and(|id| self.is_target(id))
            })
            .map(|(idx, _)| idx)
            .collect();

        match matches.as_slice() {
            [] => Err(Error::Sequence(format!(
                "commit {} not found in rebase todo list",
                self.target_commit_id
            ))),
            [idx] => {
                let reworded = lines[*idx]
                    .trim_start()
                    .split_once(char::is_whitespace)
                    .map_or_else(String::new, |(_, rest)| format!("reword {}", rest.trim_start()));
                lines[*idx] = reworded;
                Ok(lines)
            }
            _ => Err(Error::Sequence(format!(
                "commit {} matches {} lines in rebase todo list",
                self.target_commit_id,
                matches.len()
            ))),
        }
    }

    fn provide_message(&self, commit_id: &str) -> Option<String> {
        if commit_id.is_empty() || self.is_target(commit_id) {
            Some(self.new_message.clone())
        } else {
            None
        }
    }
}

/// Rewrite a rebase todo file in place.
///
/// # Errors
/// Returns error if the file cannot be read or written, or the provider
/// rejects the todo list.
pub fn edit_sequence<P: RewriteInstructionProvider>(provider: &P, todo_path: &Path) -> Result<()> {
    let content = fs::read_to_string(todo_path)?;
    let lines = content.lines().map(String::from).collect();
    let mut edited = provider.transform_sequence(lines)?.join("\n");
    edited.push('\n');
    fs::write(todo_path, edited)?;
    Ok(())
}

/// Replace a commit message buffer.
///
/// The commit being reworded is read from `rebase-merge/done` next to the
/// buffer. When it cannot be determined, the message is applied anyway.
///
/// # Errors
/// Returns error if the buffer cannot be written.
pub fn edit_message<P: RewriteInstructionProvider>(provider: &P, buffer_path: &Path) -> Result<()> {
    let current = buffer_path
        .parent()
        .and_then(|git_dir| fs::read_to_string(git_dir.join("rebase-merge").join("done")).ok())
        .and_then(|done| last_done_commit(&done))
        .unwrap_or_default();

    if let Some(message) = provider.provide_message(&current) {
        fs::write(buffer_path, message)?;
    }
    Ok(())
}

fn last_done_commit(done: &str) -> Option<String> {
    done.lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty() && !line.starts_with('#'))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(String::from)
}

/// Lifecycle of one in-place rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteState {
    Idle,
    AbortingPriorState,
    Rewriting,
    Completed,
    Failed,
}

/// Rewords commits of an existing repository with `git rebase -i`.
///
/// The editor program is invoked as `<editor> editor sequence <plan> <file>`
/// and `<editor> editor message <plan> <file>`.
pub struct InPlaceRewriter {
    workdir: PathBuf,
    git_dir: PathBuf,
    editor: PathBuf,
    state: Cell<RewriteState>,
}

impl InPlaceRewriter {
    /// Create a rewriter for `repo` using `editor` as the editor program.
    ///
    /// # Errors
    /// Returns `NotARepository` for bare repositories.
    pub fn new(repo: &Repository, editor: impl Into<PathBuf>) -> Result<Self> {
        let workdir = repo.workdir().ok_or(Error::NotARepository)?.to_path_buf();
        Ok(Self {
            workdir,
            git_dir: repo.git_dir().to_path_buf(),
            editor: editor.into(),
            state: Cell::new(RewriteState::Idle),
        })
    }

    /// State reached by the last run.
    #[must_use]
    pub fn state(&self) -> RewriteState {
        self.state.get()
    }

    fn transition(&self, next: RewriteState) {
        tracing::debug!(from = ?self.state.get(), to = ?next, "in-place rewrite state");
        self.state.set(next);
    }

    /// Replace the message of `target` and rebuild every descendant.
    ///
    /// # Errors
    /// Returns `CommitNotFound` if the target cannot be resolved, or
    /// `RewriteFailed` with the rebase output if git reports a failure.
    pub fn rewrite(&self, target: &str, message: &str) -> Result<()> {
        self.transition(RewriteState::Idle);

        let repo = Repository::open(&self.workdir)?;
        let oid = repo.resolve_commit(target)?;
        let base = repo
            .first_parent(oid)?
            .map_or_else(|| "--root".to_string(), |p| p.to_string());
        drop(repo);

        let scratch = TempDir::new()?;
        let plan_path = scratch.path().join(PLAN_FILE);
        RewritePlan {
            target_commit_id: oid.to_string(),
            new_message: message.to_string(),
        }
        .save(&plan_path)?;

        self.transition(RewriteState::AbortingPriorState);
        if let Err(e) = self.abort_prior() {
            self.transition(RewriteState::Failed);
            return Err(e);
        }

        self.transition(RewriteState::Rewriting);
        let output = Command::new("git")
            .args(["rebase", "-i", "--no-autosquash", &base])
            .env("GIT_SEQUENCE_EDITOR", self.editor_command("sequence", &plan_path))
            .env("GIT_EDITOR", self.editor_command("message", &plan_path))
            .current_dir(&self.workdir)
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                self.transition(RewriteState::Failed);
                return Err(Error::Command(e.to_string()));
            }
        };

        if output.status.success() {
            self.transition(RewriteState::Completed);
            Ok(())
        } else {
            self.transition(RewriteState::Failed);
            Err(Error::RewriteFailed {
                output: combined_output(&output),
            })
        }
    }

    /// Clear any rebase left behind by an earlier run.
    fn abort_prior(&self) -> Result<()> {
        let stale = self.git_dir.join("rebase-merge");
        if stale.exists() {
            tracing::warn!(path = %stale.display(), "removing stale rebase state");
            fs::remove_dir_all(&stale)?;
        }

        let output = Command::new("git")
            .args(["rebase", "--abort"])
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| Error::Command(e.to_string()))?;

        let text = combined_output(&output);
        if output.status.success() || text.to_lowercase().contains("no rebase in progress") {
            Ok(())
        } else {
            Err(Error::Command(text))
        }
    }

    fn editor_command(&self, mode: &str, plan: &Path) -> String {
        format!(
            "{} editor {mode} {}",
            shell_quote(&self.editor.to_string_lossy()),
            shell_quote(&plan.to_string_lossy())
        )
    }
}

impl InPlaceOps for InPlaceRewriter {
    fn reword(&self, target: &str, message: &str) -> Result<()> {
        self.rewrite(target, message)
    }
}

fn combined_output(output: &std::process::Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

/// Quote a string for `sh`, which git uses to run editor commands.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
