//! `gitrewrite run` command - generate new messages and replay history.
//!
//! Runs in two phases. Generation asks the model for a message per
//! candidate and journals each decision. Replay then rebuilds the whole
//! history in a sibling repository using the journaled messages.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use gitrewrite_core::{Batcher, CheckpointJournal, Config};
use gitrewrite_git::{
    CommitRecord, DiffOptions, Replayer, Repository, RewriteCandidate, WalkOptions, repo_name,
    sibling_path,
};
use gitrewrite_ollama::OllamaClient;
use regex::Regex;

use super::RunArgs;
use super::utils;
use crate::output;
use crate::services::{GenerateService, ReplayService};
use crate::worker::{self, Shared, Supervised};

/// Effective settings after merging flags over the config file.
struct Settings {
    max_msg_length: usize,
    max_diff_length: usize,
    max_files: usize,
    checkpoint_interval: usize,
    keep_empty_commits: bool,
    model: String,
    temperature: f64,
    exclude: Option<Regex>,
}

impl Settings {
    fn resolve(args: &RunArgs, config: &Config) -> Result<Self> {
        let exclude = args
            .exclude
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| format!("Invalid --exclude pattern '{pattern}'"))
            })
            .transpose()?;

        Ok(Self {
            max_msg_length: args.max_length.unwrap_or(config.general.max_msg_length),
            max_diff_length: args.max_diff.unwrap_or(config.general.max_diff_length),
            max_files: args.max_files.unwrap_or(config.general.max_files_per_commit),
            checkpoint_interval: config.general.checkpoint_interval.max(1),
            keep_empty_commits: config.general.keep_empty_commits,
            model: args.model.clone().unwrap_or_else(|| config.ollama.model.clone()),
            temperature: args.temperature.unwrap_or(config.ollama.temperature),
            exclude,
        })
    }
}

/// Run the run command.
pub fn run(args: &RunArgs) -> Result<()> {
    let repo = utils::open_repo(&args.repo)?;
    let config = Config::load(Config::path_in(repo.git_dir())).context("Failed to load config")?;
    let settings = Settings::resolve(args, &config)?;
    let default_branch = utils::ensure_default_branch(&repo)?;
    let workdir = repo
        .workdir()
        .context("Cannot rewrite a bare repository")?
        .to_path_buf();

    // Check the model server before doing any work
    let client = OllamaClient::from_env(args.ollama_host.as_deref(), config.ollama.host.as_deref())
        .context("Failed to create Ollama client")?;
    let context_window = connect(&client, &settings.model)?;
    tracing::info!(
        host = %client.base_url(),
        model = %settings.model,
        context_window,
        "connected to Ollama"
    );

    output::info("Scanning history...");
    let history = repo
        .history(&WalkOptions {
            max_msg_length: settings.max_msg_length,
            diff: DiffOptions {
                max_diff_length: settings.max_diff_length,
                exclude: settings.exclude.clone(),
            },
        })
        .context("Failed to walk history")?;

    if history.all.is_empty() {
        output::success("No commits on the default branch - nothing to rewrite");
        return Ok(());
    }

    let journal_path = utils::journal_path(args.output.as_deref(), &workdir);
    let journal = CheckpointJournal::load(&journal_path);
    let pending: Vec<RewriteCandidate> = journal
        .pending(&history.to_rewrite)
        .into_iter()
        .cloned()
        .collect();

    output::info(&format!(
        "{} of {} commits need a new message, {} already in {}",
        history.to_rewrite.len(),
        history.all.len(),
        history.to_rewrite.len() - pending.len(),
        journal_path.display()
    ));

    let target = if args.dry_run {
        None
    } else {
        let path = target_path(&workdir, args.output_repo.as_deref());
        if path.exists() {
            bail!("Output repository {} already exists", path.display());
        }
        Some(path)
    };

    let prompt = match (&target, pending.len()) {
        (None, n) => format!("Generate {n} message(s) with {}?", settings.model),
        (Some(path), 0) => format!("Write the history to {}?", path.display()),
        (Some(path), n) => format!(
            "Generate {n} message(s) with {} and write the rewritten history to {}?",
            settings.model,
            path.display()
        ),
    };
    if !utils::confirm(&prompt, args.yes)? {
        output::info("Cancelled");
        return Ok(());
    }

    let shared = Shared::new(journal, pending.len());

    if !pending.is_empty() {
        let batcher = Batcher::new(settings.model.clone(), settings.temperature, context_window)
            .max_files(settings.max_files)
            .summarize_oversized(args.summarize_oversized);
        let job_shared = shared.clone();
        let interval = settings.checkpoint_interval;

        let outcome = worker::supervise(&shared, "Generating", move || {
            let ctx = job_shared.context(interval);
            worker::block_on(GenerateService::new(&client, batcher).run(&pending, &ctx))?
        })?;

        let summary = match outcome {
            Supervised::Finished(summary) if !summary.stopped => summary,
            _ => exit_interrupted(&journal_path),
        };
        if summary.failed > 0 {
            output::warn(&format!(
                "{} commit(s) were skipped - rerun to retry them",
                summary.failed
            ));
        }
        output::success(&format!("Generated {} message(s)", summary.generated));
    }

    let Some(target) = target else {
        print_decisions(&shared, &history.all);
        output::success(&format!("Dry run complete - journal saved to {}", journal_path.display()));
        return Ok(());
    };

    replay_into(
        repo,
        history.all,
        &default_branch,
        &target,
        &shared,
        &ReplayOptions {
            keep_empty_commits: settings.keep_empty_commits,
            checkpoint_interval: settings.checkpoint_interval,
            journal_path: &journal_path,
        },
    )
}

/// Ping the server and look up the model's context window.
fn connect(client: &OllamaClient, model: &str) -> Result<usize> {
    worker::block_on(async {
        client
            .ping()
            .await
            .with_context(|| format!("Cannot reach Ollama at {}", client.base_url()))?;
        client
            .context_length(model)
            .await
            .with_context(|| format!("Cannot determine the context window of model '{model}'"))
    })?
}

fn print_decisions(shared: &Shared, commits: &[CommitRecord]) {
    let journal = shared
        .journal
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    output::hr();
    for commit in commits {
        if let Some(decision) = journal.get(&commit.id) {
            output::detail(&output::rewrite_line(
                commit.short_id(),
                &decision.original_message,
                &decision.rewritten_message,
            ));
        }
    }
    output::hr();
}

pub struct ReplayOptions<'a> {
    pub keep_empty_commits: bool,
    pub checkpoint_interval: usize,
    pub journal_path: &'a Path,
}

/// Replay `commits` from `source` into a new repository at `target`.
pub fn replay_into(
    source: Repository,
    commits: Vec<CommitRecord>,
    default_branch: &str,
    target: &Path,
    shared: &Shared,
    options: &ReplayOptions<'_>,
) -> Result<()> {
    let replayer = Replayer::create(source, target, default_branch)
        .with_context(|| format!("Failed to create {}", target.display()))?
        .keep_empty_commits(options.keep_empty_commits);

    match replayer.copy_origin() {
        Ok(url) => tracing::info!(%url, "copied origin remote"),
        Err(e) => tracing::debug!(error = %e, "origin remote not copied"),
    }

    let total = commits.len();
    let shared = shared.with_progress(total);
    let job_shared = shared.clone();
    let interval = options.checkpoint_interval;

    let outcome = worker::supervise(&shared, "Replaying", move || {
        let ctx = job_shared.context(interval);
        ReplayService::new(&replayer).run(&commits, &ctx)
    })?;

    let summary = match outcome {
        Supervised::Finished(summary) if !summary.stopped => summary,
        _ => exit_interrupted(options.journal_path),
    };

    for (commit, cause) in &summary.failed {
        output::warn(&format!("Could not replay {commit}: {cause}"));
    }
    if summary.unchanged > 0 {
        output::info(&format!(
            "{} commit(s) had no changes and were not recreated",
            summary.unchanged
        ));
    }
    output::success(&format!(
        "Replayed {} of {} commits into {}",
        summary.applied + summary.unchanged,
        total,
        target.display()
    ));
    Ok(())
}

fn exit_interrupted(journal_path: &Path) -> ! {
    output::warn(&format!(
        "Interrupted - progress saved to {}, rerun to resume",
        journal_path.display()
    ));
    std::process::exit(130);
}

/// Where the rewritten repository goes: next to `source`, named `name` or
/// `<repo-name>-rewritten`.
pub fn target_path(source: &Path, name: Option<&str>) -> PathBuf {
    name.map_or_else(
        || sibling_path(source, &format!("{}-rewritten", repo_name(source))),
        |name| sibling_path(source, name),
    )
}
