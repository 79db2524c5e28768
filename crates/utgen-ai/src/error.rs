//! Error types for provider calls

use thiserror::Error;

/// Errors returned by a [`ChatProvider`](crate::ChatProvider).
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP 429
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The prompt plus history no longer fits the model's window
    #[error("context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// Rejected API key
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Any other non-success status
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Success status with a body we could not read
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("unknown AI provider: {0} (expected chatgpt or claude)")]
    UnknownProvider(String),

    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
}

impl ProviderError {
    /// Errors the session retries internally.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::ContextLengthExceeded(_))
    }

    /// Classify a non-success response.
    ///
    /// Both Anthropic and OpenAI wrap errors as `{"error": {"message": ..}}`;
    /// other bodies are used verbatim.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = error_message(body);
        let lower = message.to_lowercase();
        match status {
            429 => Self::RateLimited(message),
            400 | 413 if lower.contains("context") || lower.contains("token") => {
                Self::ContextLengthExceeded(message)
            }
            401 | 403 => Self::Authentication(message),
            _ => Self::Api { status, message },
        }
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}

/// Result type for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
