//! Console messages for the gitrewrite commands.
//!
//! Progress and results go to stdout and are silenced by `--quiet`. Warnings
//! and errors go to stderr unconditionally.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;

static QUIET: AtomicBool = AtomicBool::new(false);

/// Silence stdout messages for the rest of the process.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

fn say(marker: impl Display, msg: &str) {
    if !is_quiet() {
        println!("{marker} {msg}");
    }
}

/// `✓ msg` on stdout.
pub fn success(msg: &str) {
    say("✓".green(), msg);
}

/// `→ msg` on stdout.
pub fn info(msg: &str) {
    say("→".blue(), msg);
}

/// `! msg` on stderr, shown even in quiet mode.
pub fn warn(msg: &str) {
    eprintln!("{} {msg}", "!".yellow());
}

/// `✗ msg` on stderr, shown even in quiet mode.
pub fn error(msg: &str) {
    eprintln!("{} {msg}", "✗".red());
}

/// An unprefixed line under a preceding message.
pub fn detail(msg: &str) {
    if !is_quiet() {
        println!("{msg}");
    }
}

/// Dimmed separator rule.
pub fn hr() {
    if !is_quiet() {
        println!("{}", "─".repeat(50).dimmed());
    }
}

/// Format a before/after pair for one commit.
#[must_use]
pub fn rewrite_line(short_id: &str, original: &str, rewritten: &str) -> String {
    let first_line = rewritten.lines().next().unwrap_or_default();
    let more = rewritten.lines().count().saturating_sub(1);
    let suffix = if more > 0 {
        format!(" {}", format!("(+{more} more)").dimmed())
    } else {
        String::new()
    };
    format!(
        "  {} {} {} {}{}",
        short_id.yellow(),
        original.trim().dimmed(),
        "→".blue(),
        first_line,
        suffix
    )
}

/// Render a duration as `1h02m`, `3m05s` or `42s`.
#[must_use]
pub fn duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m{s:02}s"),
        (h, m, _) => format!("{h}h{m:02}m"),
    }
}
