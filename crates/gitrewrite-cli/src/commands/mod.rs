//! Command-line definitions and command implementations.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

pub mod apply;
pub mod completions;
pub mod editor;
pub mod reword;
pub mod run;
pub mod utils;

#[derive(Parser)]
#[command(
    name = "gitrewrite",
    about = "Rewrite low-quality commit messages using a local LLM",
    version
)]
pub struct Cli {
    /// Only print errors and warnings.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate new messages and replay history into a new repository.
    Run(RunArgs),

    /// Apply a saved rewrite journal without contacting the model.
    Apply(ApplyArgs),

    /// Replace the message of a single commit in place.
    Reword {
        /// Path to the repository.
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Commit to reword (full or abbreviated id).
        commit: String,

        /// New commit message.
        #[arg(long, short)]
        message: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },

    /// Editor used internally during in-place rewrites.
    #[command(hide = true)]
    Editor {
        mode: EditorMode,
        /// Rewrite plan file.
        plan: PathBuf,
        /// File handed over by git.
        file: PathBuf,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the repository to rewrite.
    #[arg(long)]
    pub repo: PathBuf,

    /// Rewrite messages with at most this many bytes.
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Ollama model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Per-file diff size cap in bytes.
    #[arg(long)]
    pub max_diff: Option<usize>,

    /// Maximum files sent for one commit.
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Only generate messages; do not create a new repository.
    #[arg(long)]
    pub dry_run: bool,

    /// Journal file for generated messages.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Leave out files whose path matches this regex.
    #[arg(long)]
    pub exclude: Option<String>,

    /// Summarize commits over the file limit from metadata only.
    #[arg(long)]
    pub summarize_oversized: bool,

    /// Write detailed logs to this file.
    #[arg(long)]
    pub debug_log: Option<PathBuf>,

    /// Name of the new repository, created next to the source.
    #[arg(long)]
    pub output_repo: Option<String>,

    /// Ollama server address (overrides OLLAMA_HOST).
    #[arg(long)]
    pub ollama_host: Option<String>,

    /// Do not ask for confirmation.
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Path to the repository the journal was generated from.
    #[arg(long)]
    pub repo: PathBuf,

    /// Journal file to apply.
    #[arg(long)]
    pub file: PathBuf,

    /// Rewrite the existing repository instead of creating a new one.
    #[arg(long)]
    pub in_place: bool,

    /// Name of the new repository, created next to the source.
    #[arg(long, conflicts_with = "in_place")]
    pub output_repo: Option<String>,

    /// Do not ask for confirmation.
    #[arg(long, short)]
    pub yes: bool,
}

/// Which file git asked the editor to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EditorMode {
    /// The interactive rebase todo list.
    Sequence,
    /// A commit message buffer.
    Message,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "gitrewrite",
            "run",
            "--repo",
            "/tmp/project",
            "--max-length",
            "20",
            "--dry-run",
            "--exclude",
            r"\.lock$",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.repo, PathBuf::from("/tmp/project"));
        assert_eq!(args.max_length, Some(20));
        assert!(args.dry_run);
        assert!(!args.yes);
        assert_eq!(args.exclude.as_deref(), Some(r"\.lock$"));
    }

    #[test]
    fn test_apply_rejects_output_repo_in_place() {
        let result = Cli::try_parse_from([
            "gitrewrite",
            "apply",
            "--repo",
            ".",
            "--file",
            "j.json",
            "--in-place",
            "--output-repo",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_editor_subcommand() {
        let cli = Cli::try_parse_from(["gitrewrite", "editor", "sequence", "plan.json", "todo"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Editor {
                mode: EditorMode::Sequence,
                ..
            }
        ));
    }
}
