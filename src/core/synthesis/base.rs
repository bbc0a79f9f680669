//! Base trait abstraction for speech-synthesis collaborators.
//!
//! The controller depends on exactly three provider behaviors: a start
//! acknowledgment (the `speak` future resolving), a completion notification
//! (the returned oneshot receiver), and a best-effort stop that eventually
//! yields a completion or stopped notification through the same receiver.

use async_trait::async_trait;
use tokio::sync::oneshot;
use uuid::Uuid;

/// How a single spoken utterance ended at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Playback ran to its natural end
    Completed,
    /// Playback was stopped before completing
    Stopped,
    /// The provider failed mid-utterance
    Failed(String),
}

/// Error types for synthesis operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum SynthesisError {
    #[error("A synthesis job is already active: {0}")]
    AlreadyActive(Uuid),
    #[error("Provider not ready: {0}")]
    ProviderNotReady(String),
    #[error("Synthesis start failed: {0}")]
    StartFailed(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Result type for synthesis operations
pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Completion notification for one spoken utterance.
pub type SpeechCompletion = oneshot::Receiver<SpeechOutcome>;

/// Base trait for speech-synthesis providers.
///
/// Providers are shared behind an `Arc` and called from the controller's
/// drive task and cancel path concurrently, so methods take `&self` and
/// implementations use interior mutability.
#[async_trait]
pub trait BaseSynthesizer: Send + Sync {
    /// Begin synthesizing the given text.
    ///
    /// Resolves once the provider has accepted the request (start
    /// acknowledgment). The returned receiver yields exactly one
    /// [`SpeechOutcome`] when playback completes, is stopped, or fails.
    ///
    /// # Arguments
    /// * `text` - The text to synthesize
    async fn speak(&self, text: &str) -> SynthesisResult<SpeechCompletion>;

    /// Best-effort stop of the current playback.
    ///
    /// After a successful stop the in-flight completion receiver eventually
    /// yields `Stopped` (or `Completed`, if playback finished first).
    async fn stop(&self) -> SynthesisResult<()>;

    /// Get provider-specific information
    fn provider_info(&self) -> &'static str {
        "unknown"
    }
}
