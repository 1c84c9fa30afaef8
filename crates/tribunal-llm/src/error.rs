//! Error types for tribunal-llm

use thiserror::Error;

/// Errors a completion backend can surface.
///
/// See [`LlmError::is_transient`] for which ones are worth retrying.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport failure talking to the provider
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider answered with a non-success status
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Provider answered but carried no completion text
    #[error("provider returned no completion content")]
    EmptyResponse,

    /// The attempt did not resolve in time
    #[error("completion timed out after {0}ms")]
    Timeout(u64),

    /// Backend is missing required configuration
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// Failure injected by a scripted fake
    #[error("scripted failure: {0}")]
    Scripted(String),
}

impl LlmError {
    /// Whether a later attempt may succeed. A backend missing its
    /// configuration fails the same way every time.
    pub fn is_transient(&self) -> bool {
        !matches!(self, LlmError::NotConfigured(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

/// Result alias for completion operations.
pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display_includes_code_and_body() {
        let err = LlmError::Status {
            status: 429,
            body: "rate limited".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("rate limited"));
    }

    #[test]
    fn test_only_missing_configuration_is_permanent() {
        assert!(LlmError::Timeout(10).is_transient());
        assert!(LlmError::EmptyResponse.is_transient());
        assert!(LlmError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!LlmError::NotConfigured("no key".to_string()).is_transient());
    }

    #[test]
    fn test_timeout_error_display() {
        assert!(LlmError::Timeout(1500).to_string().contains("1500ms"));
    }
}
