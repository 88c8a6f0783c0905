//! `gitrewrite apply` command - apply a saved journal without the model.

use anyhow::{Context, Result, bail};
use gitrewrite_core::{CheckpointJournal, Config};
use gitrewrite_git::InPlaceRewriter;

use super::ApplyArgs;
use super::run::{ReplayOptions, replay_into, target_path};
use super::utils;
use crate::output;
use crate::services::{InPlaceError, InPlaceService};
use crate::worker::Shared;

/// Run the apply command.
pub fn run(args: &ApplyArgs) -> Result<()> {
    if !args.file.exists() {
        bail!("Journal file {} does not exist", args.file.display());
    }
    let journal = CheckpointJournal::load(&args.file);
    if journal.is_empty() {
        bail!("Journal file {} has no entries", args.file.display());
    }

    let repo = utils::open_repo(&args.repo)?;
    let config = Config::load(Config::path_in(repo.git_dir())).context("Failed to load config")?;
    let default_branch = utils::ensure_default_branch(&repo)?;
    let workdir = repo
        .workdir()
        .context("Cannot rewrite a bare repository")?
        .to_path_buf();

    let pending = journal.decisions().iter().filter(|d| !d.applied).count();
    output::info(&format!(
        "{} journal entries, {} not yet applied",
        journal.len(),
        pending
    ));

    if args.in_place {
        return apply_in_place(args, &repo, journal);
    }

    let target = target_path(&workdir, args.output_repo.as_deref());
    if target.exists() {
        bail!("Output repository {} already exists", target.display());
    }
    if !utils::confirm(
        &format!("Write the rewritten history to {}?", target.display()),
        args.yes,
    )? {
        output::info("Cancelled");
        return Ok(());
    }

    let commits = utils::all_commits(&repo)?;
    let shared = Shared::new(journal, commits.len());
    replay_into(
        repo,
        commits,
        &default_branch,
        &target,
        &shared,
        &ReplayOptions {
            keep_empty_commits: config.general.keep_empty_commits,
            checkpoint_interval: config.general.checkpoint_interval.max(1),
            journal_path: &args.file,
        },
    )
}

fn apply_in_place(
    args: &ApplyArgs,
    repo: &gitrewrite_git::Repository,
    mut journal: CheckpointJournal,
) -> Result<()> {
    repo.require_clean()?;

    output::warn("This rewrites the history of the existing repository.");
    if !utils::confirm("Rewrite commit messages in place?", args.yes)? {
        output::info("Cancelled");
        return Ok(());
    }

    let editor = std::env::current_exe().context("Cannot locate the gitrewrite executable")?;
    let rewriter = InPlaceRewriter::new(repo, editor)?;
    let newest_first: Vec<String> = repo
        .log_newest_first()?
        .into_iter()
        .map(|oid| oid.to_string())
        .collect();

    match InPlaceService::new(&rewriter).apply(&newest_first, &mut journal) {
        Ok(summary) => {
            if summary.skipped > 0 {
                output::info(&format!("{} entries skipped", summary.skipped));
            }
            output::success(&format!("Rewrote {} commit message(s) in place", summary.applied));
            Ok(())
        }
        Err(InPlaceError::Reword {
            commit,
            applied,
            source,
        }) => {
            if let gitrewrite_git::Error::RewriteFailed { output: git_output } = &source {
                output::error(&format!("git output while rewording {commit}:"));
                eprintln!("{}", git_output.trim_end());
            } else {
                output::error(&source.to_string());
            }
            bail!(
                "Failed to reword {commit} after {applied} commit(s) were rewritten\n\
                 The repository may be mid-rebase - inspect it with `git status` and recover manually (e.g. `git rebase --abort`)"
            )
        }
        Err(e) => Err(e.into()),
    }
}
