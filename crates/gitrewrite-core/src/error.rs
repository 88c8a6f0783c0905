//! Error types for gitrewrite-core.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gitrewrite-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request would not fit in the model's context window.
    #[error("commit {commit} would exceed model context window ({needed} tokens needed, {available} available)")]
    ContextOverflow {
        commit: String,
        needed: usize,
        available: usize,
    },

    /// The commit touches more files than a single request may carry.
    #[error("commit {commit} has too many files ({count}, limit {limit}) - use --summarize-oversized to process it")]
    TooManyFiles {
        commit: String,
        count: usize,
        limit: usize,
    },

    /// The generator's reply was not the expected JSON document.
    #[error("failed to parse response for commit {commit}: {message}")]
    MalformedResponse {
        commit: String,
        message: String,
        /// Response body, truncated for logging.
        raw: String,
    },

    /// The reply parsed but contained no entry with an allowed type.
    #[error("response for commit {0} contained no usable messages")]
    NoUsableEntries(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Git operation error.
    #[error("git error: {0}")]
    Git(#[from] gitrewrite_git::Error),
}
