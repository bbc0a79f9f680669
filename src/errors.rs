//! Error types for conversation sessions

use crate::core::{
    recognition::RecognitionError, reply::ReplyError, synthesis::SynthesisError,
};

/// Error types for conversation session operations.
///
/// Collaborator-boundary failures (recognition, reply, synthesis) are
/// recoverable: the turn is abandoned and the loop continues. `RaceViolation`
/// is a programming-defect class (an internal invariant breach that the
/// single-writer discipline should make unreachable) and is fatal to the
/// session when detected.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),
    #[error("Reply error: {0}")]
    Reply(#[from] ReplyError),
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Race violation: {0}")]
    RaceViolation(String),
}

/// Result type for conversation session operations
pub type ConversationResult<T> = Result<T, ConversationError>;
