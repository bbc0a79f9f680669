//! Diarized speech-recognition collaborator interface.
//!
//! The controller consumes an ordered stream of [`TranscriptEvent`]s (partial
//! and final hypotheses tagged with a speaker identity) plus terminal
//! session-level signals. Actual microphone capture and STT inference live
//! behind [`BaseRecognizer`].

pub mod base;

pub use base::{
    BaseRecognizer, RecognitionError, RecognitionSessionEvent, SessionEventCallback,
    TranscriptCallback, TranscriptEvent, TranscriptEventKind,
};
