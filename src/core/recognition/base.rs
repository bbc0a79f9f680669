use std::pin::Pin;
use std::sync::Arc;

use futures::Future;

/// Kind of a diarized recognition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptEventKind {
    /// Still-updating hypothesis for an utterance in progress.
    Partial,
    /// Terminated hypothesis; the utterance is complete.
    Final,
    /// The provider heard audio but could not transcribe it.
    NoMatch,
}

/// A single diarized recognition event emitted by the recognition provider.
///
/// Events are immutable once emitted. Ordering within a single speaker's
/// stream is causal (partials for an utterance precede its final), but events
/// from different speakers may interleave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    /// Whether this is a partial, final, or no-match result
    pub kind: TranscriptEventKind,
    /// Diarized speaker identity reported by the provider
    pub speaker_id: String,
    /// Transcribed text (empty for no-match events)
    pub text: String,
    /// Monotonic event counter assigned by the provider
    pub sequence: u64,
}

impl TranscriptEvent {
    /// Creates a partial (still-updating) event.
    pub fn partial(speaker_id: impl Into<String>, text: impl Into<String>, sequence: u64) -> Self {
        Self {
            kind: TranscriptEventKind::Partial,
            speaker_id: speaker_id.into(),
            text: text.into(),
            sequence,
        }
    }

    /// Creates a final (terminated) event.
    pub fn final_result(
        speaker_id: impl Into<String>,
        text: impl Into<String>,
        sequence: u64,
    ) -> Self {
        Self {
            kind: TranscriptEventKind::Final,
            speaker_id: speaker_id.into(),
            text: text.into(),
            sequence,
        }
    }

    /// Creates a no-match event.
    pub fn no_match(speaker_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            kind: TranscriptEventKind::NoMatch,
            speaker_id: speaker_id.into(),
            text: String::new(),
            sequence,
        }
    }
}

/// Session-level signals from the recognition provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionSessionEvent {
    /// The provider cancelled the session, optionally with a reason.
    Canceled { reason: Option<String> },
    /// The provider closed the stream normally.
    Stopped,
}

/// Error types for recognition operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecognitionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Type alias for transcript event callbacks
pub type TranscriptCallback =
    Arc<dyn Fn(TranscriptEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Type alias for session-level event callbacks
pub type SessionEventCallback =
    Arc<dyn Fn(RecognitionSessionEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Base trait for diarized speech-recognition providers.
///
/// Implementations deliver [`TranscriptEvent`]s through the registered
/// callback, potentially from their own execution contexts. Callbacks must
/// only enqueue work; they are never allowed to block on downstream calls.
#[async_trait::async_trait]
pub trait BaseRecognizer: Send + Sync {
    /// Start continuous transcription.
    ///
    /// # Returns
    /// * `Result<(), RecognitionError>` - Success or error
    async fn start(&mut self) -> Result<(), RecognitionError>;

    /// Stop continuous transcription and release the stream.
    ///
    /// # Returns
    /// * `Result<(), RecognitionError>` - Success or error
    async fn stop(&mut self) -> Result<(), RecognitionError>;

    /// Check if the provider is currently transcribing.
    fn is_running(&self) -> bool;

    /// Register a callback for transcript events (partial, final, no-match).
    ///
    /// # Arguments
    /// * `callback` - Callback invoked for every recognition event
    async fn on_transcript(&mut self, callback: TranscriptCallback)
        -> Result<(), RecognitionError>;

    /// Register a callback for session-level events (cancelled, stopped).
    ///
    /// These are terminal signals: after either event the provider will not
    /// deliver further transcript events.
    async fn on_session_event(
        &mut self,
        callback: SessionEventCallback,
    ) -> Result<(), RecognitionError>;

    /// Get provider-specific information
    fn provider_info(&self) -> &'static str;
}
