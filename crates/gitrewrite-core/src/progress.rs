//! Shared progress counters for a rewrite run.
//!
//! The worker updates a [`Progress`] while processing commits and the UI
//! reads it through [`Progress::snapshot`]. All methods take `&self` so the
//! value can be shared behind an `Arc`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Progress {
    total: AtomicUsize,
    processed: AtomicUsize,
    failed: AtomicUsize,
    started: Instant,
    samples: Mutex<Vec<Duration>>,
    current: Mutex<String>,
}

/// Point-in-time copy of the progress counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// Mean time per successfully processed commit.
    pub average: Option<Duration>,
    /// Estimated time left for the remaining commits.
    pub eta: Option<Duration>,
    pub current: String,
}

impl ProgressSnapshot {
    /// Commits that are neither processed nor failed.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed + self.failed)
    }
}

impl Progress {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total: AtomicUsize::new(total),
            processed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            started: Instant::now(),
            samples: Mutex::new(Vec::new()),
            current: Mutex::new(String::new()),
        }
    }

    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Record the label of the item being worked on.
    pub fn begin(&self, label: impl Into<String>) {
        *lock(&self.current) = label.into();
    }

    /// Count a successful item and the time it took.
    pub fn succeed(&self, took: Duration) {
        lock(&self.samples).push(took);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fail(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let processed = self.processed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);

        let average = {
            let samples = lock(&self.samples);
            u32::try_from(samples.len())
                .ok()
                .filter(|&n| n > 0)
                .map(|n| samples.iter().sum::<Duration>() / n)
        };

        let remaining = total.saturating_sub(processed + failed);
        let eta = average.and_then(|avg| {
            u32::try_from(remaining).ok().map(|r| avg * r)
        });

        ProgressSnapshot {
            total,
            processed,
            failed,
            elapsed: self.started.elapsed(),
            average,
            eta,
            current: lock(&self.current).clone(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let progress = Progress::new(3);
        let snap = progress.snapshot();
        assert_eq!(snap.total, 3);
        assert_eq!(snap.processed, 0);
        assert_eq!(snap.remaining(), 3);
        assert!(snap.average.is_none());
        assert!(snap.eta.is_none());
    }

    #[test]
    fn test_average_and_eta() {
        let progress = Progress::new(4);
        progress.begin("abc12345");
        progress.succeed(Duration::from_secs(2));
        progress.succeed(Duration::from_secs(4));
        progress.fail();

        let snap = progress.snapshot();
        assert_eq!(snap.processed, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.current, "abc12345");
        assert_eq!(snap.average, Some(Duration::from_secs(3)));
        assert_eq!(snap.eta, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_set_total() {
        let progress = Progress::new(0);
        progress.set_total(7);
        assert_eq!(progress.snapshot().remaining(), 7);
    }
}
