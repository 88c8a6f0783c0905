//! Trait seams for the two ways of applying rewritten messages.
//!
//! Services in the CLI depend on these traits instead of concrete types so
//! they can be driven by mocks in tests.

use crate::Result;
use crate::history::CommitRecord;
use crate::replay::ReplayOutcome;

/// Destination that recreates commits one at a time, oldest first.
#[allow(clippy::missing_errors_doc)]
pub trait ReplaySink {
    /// Recreate `commit` with `message` on top of the previously replayed one.
    fn apply_commit(&self, commit: &CommitRecord, message: &str) -> Result<ReplayOutcome>;
}

/// Repository whose existing commits can be reworded.
#[allow(clippy::missing_errors_doc)]
pub trait InPlaceOps {
    /// Replace the message of the commit named by `target`.
    fn reword(&self, target: &str, message: &str) -> Result<()>;
}
