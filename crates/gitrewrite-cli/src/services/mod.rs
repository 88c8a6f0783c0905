//! Service layer for business logic with dependency injection.
//!
//! Services accept trait-based collaborators (`ChatApi`, `ReplaySink`,
//! `InPlaceOps`) so the rewrite pipeline can be tested with mocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use gitrewrite_core::{CheckpointJournal, Progress};

pub mod generate;
pub mod inplace;
pub mod replay;

#[cfg(test)]
pub mod test_mocks;

pub use generate::GenerateService;
pub use inplace::{InPlaceError, InPlaceService};
pub use replay::ReplayService;

/// Shared state a service reports into while processing commits.
pub struct RunContext<'a> {
    pub stop: &'a AtomicBool,
    pub progress: &'a Progress,
    pub journal: &'a Mutex<CheckpointJournal>,
    /// New decisions between journal flushes.
    pub checkpoint_interval: usize,
}

impl RunContext<'_> {
    /// Whether an interrupt asked the worker to stop.
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn journal(&self) -> MutexGuard<'_, CheckpointJournal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
