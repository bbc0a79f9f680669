pub mod recognition;
pub mod reply;
pub mod session;
pub mod synthesis;
pub mod turn;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types for convenience
pub use recognition::{
    BaseRecognizer, RecognitionError, RecognitionSessionEvent, SessionEventCallback,
    TranscriptCallback, TranscriptEvent, TranscriptEventKind,
};

pub use reply::{BaseReplyProvider, OpenAiReplyProvider, ReplyConfig, ReplyError};

pub use session::ConversationSession;

pub use synthesis::{
    BaseSynthesizer, CancelOutcome, JobStatus, SpeechCompletion, SpeechOutcome,
    SynthesisController, SynthesisError, SynthesisJob, SynthesisResult,
};

pub use turn::{
    BargeInAction, BargeInDetector, CoordinatorMessage, SessionPhase, SessionState,
    TurnCoordinator, Utterance,
};
