//! Error types for gitrewrite-git.

use std::path::PathBuf;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failures while reading, replaying or rewriting history.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The path is not inside a repository, or the repository is bare.
    #[error("not a git repository")]
    NotARepository,

    /// Commit or revision could not be resolved.
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// HEAD does not point at a branch.
    #[error("HEAD is detached, check out the default branch first")]
    DetachedHead,

    /// Tracked files differ from HEAD.
    #[error("working tree has uncommitted changes, commit or stash them first")]
    DirtyWorkingDirectory,

    /// The named remote is missing or has no URL.
    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    /// Default branch could not be determined.
    #[error("could not determine the default branch")]
    NoDefaultBranch,

    /// A commit carries a timestamp chrono cannot represent.
    #[error("invalid commit time: {0}")]
    InvalidTime(String),

    /// The replay target directory already exists.
    #[error("directory {0} already exists")]
    TargetExists(PathBuf),

    /// Tree content could not be materialized.
    #[error("failed to extract {path}: {message}")]
    Extract { path: String, message: String },

    /// A rebase todo list did not contain exactly one matching pick line.
    #[error("{0}")]
    Sequence(String),

    /// The history rewrite exited with a failure status.
    #[error("rebase failed: {output}")]
    RewriteFailed { output: String },

    /// A git subprocess could not be run or reported an error.
    #[error("git command failed: {0}")]
    Command(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (rewrite plan files).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("libgit2: {0}")]
    Git2(#[from] git2::Error),
}
