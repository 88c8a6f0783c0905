//! gitrewrite CLI - rewrite low-quality commit messages with a local LLM.

use clap::Parser;

mod commands;
mod logging;
mod output;
mod services;
mod worker;

use commands::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    output::set_quiet(cli.quiet);

    let debug_log = match &cli.command {
        Commands::Run(args) => args.debug_log.clone(),
        _ => None,
    };
    if let Err(e) = logging::init(debug_log.as_deref()) {
        commands::utils::fatal(&e);
    }

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(&args),
        Commands::Apply(args) => commands::apply::run(&args),
        Commands::Reword {
            repo,
            commit,
            message,
        } => commands::reword::run(&repo, &commit, &message),
        Commands::Completions { shell } => commands::completions::run(shell),
        Commands::Editor { mode, plan, file } => commands::editor::run(mode, &plan, &file),
    };

    if let Err(e) = result {
        commands::utils::fatal(&e);
    }
}
