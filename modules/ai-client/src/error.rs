use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiClientError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status after retries are exhausted.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response did not contain the forced tool call, or its payload
    /// did not match the requested schema.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl AiClientError {
    /// Rate-limit and server errors are retried before surfacing.
    pub fn is_retryable_status(status: u16) -> bool {
        status == 429 || (500..=599).contains(&status)
    }
}
