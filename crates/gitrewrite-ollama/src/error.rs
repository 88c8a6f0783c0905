//! Error types for gitrewrite-ollama.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to an Ollama server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// API error with status code.
    #[error("Ollama API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// The model metadata has no usable context length.
    #[error("could not determine context size for model {0}")]
    NoContextLength(String),

    /// Network error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("failed to parse Ollama response: {0}")]
    Parse(#[from] serde_json::Error),
}
