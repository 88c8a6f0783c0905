//! `gitrewrite editor` - editor substitution for in-place rewrites.
//!
//! git runs this as `GIT_SEQUENCE_EDITOR` and `GIT_EDITOR` while an
//! in-place rewrite is in progress; it is not meant to be called by hand.

use std::path::Path;

use anyhow::{Context, Result};
use gitrewrite_git::{RewritePlan, edit_message, edit_sequence};

use super::EditorMode;

pub fn run(mode: EditorMode, plan: &Path, file: &Path) -> Result<()> {
    let plan = RewritePlan::load(plan)
        .with_context(|| format!("Failed to read rewrite plan {}", plan.display()))?;

    match mode {
        EditorMode::Sequence => edit_sequence(&plan, file).context("Failed to edit rebase todo list")?,
        EditorMode::Message => edit_message(&plan, file).context("Failed to edit commit message")?,
    }
    Ok(())
}
