//! Worker thread supervision.
//!
//! Commits are processed one at a time on a dedicated worker thread. The
//! calling thread watches for Ctrl-C and SIGTERM, renders progress and, on
//! interrupt, raises the stop flag and flushes the journal before returning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use gitrewrite_core::{CheckpointJournal, Progress, ProgressSnapshot};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::oneshot;

use crate::output;
use crate::services::RunContext;

const TICK: Duration = Duration::from_millis(200);

/// State shared between the supervisor and the worker.
#[derive(Clone)]
pub struct Shared {
    pub stop: Arc<AtomicBool>,
    pub progress: Arc<Progress>,
    pub journal: Arc<Mutex<CheckpointJournal>>,
}

impl Shared {
    pub fn new(journal: CheckpointJournal, total: usize) -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(Progress::new(total)),
            journal: Arc::new(Mutex::new(journal)),
        }
    }

    /// Same stop flag and journal, fresh progress counters.
    pub fn with_progress(&self, total: usize) -> Self {
        Self {
            stop: Arc::clone(&self.stop),
            progress: Arc::new(Progress::new(total)),
            journal: Arc::clone(&self.journal),
        }
    }

    pub fn context(&self, checkpoint_interval: usize) -> RunContext<'_> {
        RunContext {
            stop: &self.stop,
            progress: &self.progress,
            journal: &self.journal,
            checkpoint_interval,
        }
    }

    /// Flush the journal, waiting for the worker to release it.
    pub fn flush_journal(&self) -> Result<()> {
        let mut journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        journal
            .flush()
            .with_context(|| format!("Failed to write journal {}", journal.path().display()))
    }
}

pub enum Supervised<T> {
    Finished(T),
    Interrupted,
}

/// Run `job` on a worker thread until it finishes or the user interrupts.
pub fn supervise<T, F>(shared: &Shared, label: &str, job: F) -> Result<Supervised<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    supervise_until(shared, label, job, interrupted())
}

/// Run `job` on a worker thread until it finishes or `interrupt` resolves.
fn supervise_until<T, F, I>(
    shared: &Shared,
    label: &str,
    job: F,
    interrupt: I,
) -> Result<Supervised<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
    I: Future<Output = ()>,
{
    let (tx, rx) = oneshot::channel();
    let handle = std::thread::Builder::new()
        .name("gitrewrite-worker".into())
        .spawn(move || {
            let _ = tx.send(job());
        })
        .context("Failed to start worker thread")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let bar = progress_bar(label);
    let outcome = runtime.block_on(watch(&shared.progress, &bar, rx, interrupt));

    match outcome {
        Watch::Done(result) => {
            bar.finish_and_clear();
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
            result.map(Supervised::Finished)
        }
        Watch::Interrupted => {
            bar.abandon();
            shared.stop.store(true, Ordering::SeqCst);
            tracing::info!("interrupted, flushing journal");
            shared.flush_journal()?;
            Ok(Supervised::Interrupted)
        }
    }
}

/// Run an async job to completion on the current (worker) thread.
pub fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

enum Watch<T> {
    Done(Result<T>),
    Interrupted,
}

async fn watch<T>(
    progress: &Progress,
    bar: &ProgressBar,
    mut done: oneshot::Receiver<Result<T>>,
    interrupt: impl Future<Output = ()>,
) -> Watch<T> {
    tokio::pin!(interrupt);
    let mut ticker = tokio::time::interval(TICK);

    loop {
        tokio::select! {
            result = &mut done => {
                render(bar, &progress.snapshot());
                return Watch::Done(
                    result.unwrap_or_else(|_| Err(anyhow!("Worker thread stopped unexpectedly"))),
                );
            }
            () = &mut interrupt => return Watch::Interrupted,
            _ = ticker.tick() => render(bar, &progress.snapshot()),
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn interrupted() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::debug!("keyboard interrupt"),
            Err(e) => {
                tracing::warn!("failed to install Ctrl-C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate() => tracing::debug!("SIGTERM received"),
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::warn!("failed to install SIGTERM handler: {err}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

fn progress_bar(label: &str) -> ProgressBar {
    if output::is_quiet() || !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_prefix(label.to_string());
    bar
}

fn render(bar: &ProgressBar, snapshot: &ProgressSnapshot) {
    bar.set_length(snapshot.total as u64);
    bar.set_position((snapshot.processed + snapshot.failed) as u64);
    bar.set_message(status_line(snapshot));
}

fn status_line(snapshot: &ProgressSnapshot) -> String {
    let mut parts = Vec::new();
    if snapshot.failed > 0 {
        parts.push(format!("{} failed", snapshot.failed));
    }
    if let Some(eta) = snapshot.eta {
        parts.push(format!("eta {}", output::duration(eta)));
    }
    if !snapshot.current.is_empty() {
        parts.push(snapshot.current.clone());
    }
    parts.join(" · ")
}
