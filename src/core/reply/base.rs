use std::time::Duration;

/// Error types for reply operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReplyError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Reply request timed out after {0:?}")]
    Timeout(Duration),
}

/// Base trait for reply (language-model) providers.
///
/// A single request/response exchange: the guest's final utterance text in,
/// the bot's reply text out. No streaming is assumed; failures are returned
/// as [`ReplyError`] rather than panicking.
#[async_trait::async_trait]
pub trait BaseReplyProvider: Send + Sync {
    /// Request a reply for the given guest utterance text.
    ///
    /// # Arguments
    /// * `text` - The final transcribed utterance to answer
    ///
    /// # Returns
    /// * `Result<String, ReplyError>` - The reply text or error
    async fn reply(&self, text: &str) -> Result<String, ReplyError>;

    /// Get provider-specific information
    fn provider_info(&self) -> &'static str {
        "unknown"
    }
}
