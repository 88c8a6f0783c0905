//! # gitrewrite-git
//!
//! Git layer for gitrewrite, built on git2-rs.
//! Walks history, extracts per-file diffs, replays commits into a new
//! repository and rewords commits in place through an interactive rebase.

mod diff;
mod error;
mod history;
mod replay;
mod repository;
mod rewrite;
mod traits;

pub use diff::{DEFAULT_MAX_DIFF_LENGTH, DiffOptions, FileChange, truncate_diff};
pub use error::{Error, Result};
pub use git2::Oid;
pub use history::{
    CommitRecord, DEFAULT_MAX_MSG_LENGTH, History, RewriteCandidate, WalkOptions, needs_rewrite,
    to_git_time,
};
pub use replay::{ReplayOutcome, Replayer, extract_tree, sibling_path};
pub use repository::{Repository, repo_name};
pub use rewrite::{
    InPlaceRewriter, RewriteInstructionProvider, RewritePlan, RewriteState, edit_message,
    edit_sequence,
};
pub use traits::{InPlaceOps, ReplaySink};
