//! # gitrewrite-ollama
//!
//! Client for the Ollama HTTP API, used by gitrewrite to generate commit
//! messages and to discover a model's context window.

mod client;
mod error;
mod traits;
mod types;

pub use client::{DEFAULT_HOST, DEFAULT_PORT, OllamaClient, normalize_host, resolve_host};
pub use error::{Error, Result};
pub use traits::ChatApi;
pub use types::{ChatMessage, ChatOptions, ChatRequest, Role};
