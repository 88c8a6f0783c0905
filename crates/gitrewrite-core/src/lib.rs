//! # gitrewrite-core
//!
//! Core library for gitrewrite: the rewrite decision model, the resumable
//! checkpoint journal, candidate batching for the message generator, and
//! configuration.

pub mod batcher;
pub mod config;
pub mod decision;
pub mod error;
pub mod journal;
pub mod progress;
pub mod prompt;
pub mod token;

pub use batcher::{Batcher, RewriteRequest};
pub use config::Config;
pub use decision::RewriteDecision;
pub use error::{Error, Result};
pub use journal::CheckpointJournal;
pub use progress::{Progress, ProgressSnapshot};
pub use token::{ByteHeuristic, TokenEstimator};
