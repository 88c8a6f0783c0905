//! Trait abstraction over the message generator.
//!
//! Services depend on [`ChatApi`] rather than [`crate::OllamaClient`] so
//! tests can substitute canned replies.

use crate::Result;
use crate::types::ChatRequest;

/// Operations gitrewrite needs from a chat model server.
pub trait ChatApi: Send + Sync {
    /// Check that the server answers.
    fn ping(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Context window size of `model`, in tokens.
    fn context_length(&self, model: &str) -> impl std::future::Future<Output = Result<usize>> + Send;

    /// Send a chat request and return the reply text.
    fn chat(&self, request: &ChatRequest) -> impl std::future::Future<Output = Result<String>> + Send;
}
