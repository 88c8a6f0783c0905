use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use gitrewrite_git::{CommitRecord, DEFAULT_MAX_MSG_LENGTH, Repository, repo_name};
use inquire::Confirm;
use inquire::error::InquireError;

use crate::output;

/// Open the repository at `path`.
pub fn open_repo(path: &Path) -> Result<Repository> {
    Repository::open(path)
        .with_context(|| format!("Not a git repository: {}", path.display()))
}

/// Ensure HEAD is on the repository's default branch and return its name.
///
/// When no default branch can be detected the current branch is used.
pub fn ensure_default_branch(repo: &Repository) -> Result<String> {
    let current = repo
        .current_branch()
        .context("Cannot rewrite history from a detached HEAD")?;

    match repo.default_branch() {
        Ok(default) if default == current => Ok(current),
        Ok(default) => bail!(
            "Repository is on branch '{current}', not the default branch '{default}' - check out '{default}' first"
        ),
        Err(e) => {
            tracing::warn!(error = %e, "could not detect default branch");
            output::warn(&format!(
                "Could not detect the default branch, using current branch '{current}'"
            ));
            Ok(current)
        }
    }
}

/// Ask for confirmation before a destructive or long-running step.
///
/// `yes` skips the prompt. Without a terminal to ask on, `--yes` is required.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !console::user_attended() {
        bail!("Not running interactively - pass --yes to confirm");
    }

    match Confirm::new(prompt).with_default(false).prompt() {
        Ok(confirmed) => Ok(confirmed),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(false),
        Err(e) => Err(e).context("Confirmation failed"),
    }
}

/// Print a fatal error and exit with status 1.
///
/// Pauses briefly when a person is watching stderr so the message is not
/// lost under progress output.
pub fn fatal(e: &anyhow::Error) -> ! {
    output::error(&format!("{e:#}"));
    if console::user_attended_stderr() {
        std::thread::sleep(Duration::from_secs(2));
    }
    std::process::exit(1);
}

/// Default journal location: `<repo-name>-rewrite-changes.json` in the
/// current directory, unless `output` is given.
pub fn journal_path(output: Option<&Path>, repo_path: &Path) -> PathBuf {
    output.map_or_else(
        || PathBuf::from(format!("{}-rewrite-changes.json", repo_name(repo_path))),
        Path::to_path_buf,
    )
}

/// Every commit reachable from HEAD, oldest first, without diffs.
pub fn all_commits(repo: &Repository) -> Result<Vec<CommitRecord>> {
    let mut commits = repo
        .log_newest_first()?
        .into_iter()
        .map(|oid| repo.commit_record(oid, DEFAULT_MAX_MSG_LENGTH))
        .collect::<gitrewrite_git::Result<Vec<_>>>()
        .context("Failed to read commit history")?;
    commits.reverse();
    Ok(commits)
}
