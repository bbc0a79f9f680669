//! Conversation configuration.

use std::time::Duration;

use crate::errors::{ConversationError, ConversationResult};

/// Configuration for the turn-taking controller.
///
/// The guest identity is a single configured value; barge-in decisions only
/// consider events from this speaker.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ConversationConfig {
    /// Diarized speaker id treated as the guest
    pub guest_speaker_id: String,
    /// Maximum time to wait for the reply collaborator (ms).
    ///
    /// An exceeded wait abandons the turn; the session returns to Listening
    /// without speaking.
    pub reply_timeout_ms: u64,
    /// Maximum time to wait for the synthesizer's start acknowledgment (ms).
    ///
    /// A job whose start is never acknowledged within this bound is treated
    /// as Failed rather than left hanging.
    pub speak_start_timeout_ms: u64,
    /// Maximum time a cancel waits for the job's terminal status (ms).
    ///
    /// If the provider never confirms the stop, the job is force-finished as
    /// Failed so cancellation stays bounded and observable.
    pub cancel_timeout_ms: u64,
    /// Capacity of the coordinator's event queue
    pub queue_capacity: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            guest_speaker_id: "Guest-1".to_string(),
            reply_timeout_ms: 15_000,
            speak_start_timeout_ms: 5_000,
            cancel_timeout_ms: 3_000,
            queue_capacity: 256,
        }
    }
}

impl ConversationConfig {
    /// Validate the configuration, rejecting values that would stall or
    /// deadlock the turn loop.
    pub fn validate(&self) -> ConversationResult<()> {
        if self.guest_speaker_id.trim().is_empty() {
            return Err(ConversationError::InvalidConfiguration(
                "guest_speaker_id must not be empty".to_string(),
            ));
        }
        if self.reply_timeout_ms == 0 {
            return Err(ConversationError::InvalidConfiguration(
                "reply_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.speak_start_timeout_ms == 0 {
            return Err(ConversationError::InvalidConfiguration(
                "speak_start_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.cancel_timeout_ms == 0 {
            return Err(ConversationError::InvalidConfiguration(
                "cancel_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConversationError::InvalidConfiguration(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn speak_start_timeout(&self) -> Duration {
        Duration::from_millis(self.speak_start_timeout_ms)
    }

    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_millis(self.cancel_timeout_ms)
    }
}
