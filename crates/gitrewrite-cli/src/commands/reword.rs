//! `gitrewrite reword` command - replace one commit message in place.

use std::path::Path;

use anyhow::{Context, Result, bail};
use gitrewrite_git::{Error as GitError, InPlaceRewriter};

use super::utils;
use crate::output;

/// Run the reword command.
pub fn run(repo_path: &Path, commit: &str, message: &str) -> Result<()> {
    if message.trim().is_empty() {
        bail!("Commit message cannot be empty");
    }

    let repo = utils::open_repo(repo_path)?;
    repo.require_clean()?;
    let target = repo
        .resolve_commit(commit)
        .with_context(|| format!("Cannot find commit '{commit}'"))?;

    let editor = std::env::current_exe().context("Cannot locate the gitrewrite executable")?;
    let rewriter = InPlaceRewriter::new(&repo, editor)?;

    match rewriter.rewrite(&target.to_string(), message) {
        Ok(()) => {
            let short = repo.short_id(target).unwrap_or_else(|_| target.to_string());
            output::success(&format!("Reworded {short}"));
            Ok(())
        }
        Err(GitError::RewriteFailed { output: git_output }) => {
            output::error("git output:");
            eprintln!("{}", git_output.trim_end());
            bail!(
                "Failed to reword {commit} - inspect the repository with `git status` and recover manually"
            )
        }
        Err(e) => Err(e).context("Failed to reword commit"),
    }
}
