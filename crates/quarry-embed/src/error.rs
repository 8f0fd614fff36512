//! Error types for quarry-embed.

/// Errors that can occur while producing embeddings.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider kept answering 429 after all retries.
    #[error("rate limited")]
    RateLimited,

    /// Provider answered with a non-success status.
    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    /// Provider returned a different number of vectors than texts sent.
    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, EmbedError>;
