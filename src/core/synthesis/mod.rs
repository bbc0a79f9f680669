//! # Synthesis
//!
//! The single active "bot utterance" resource. [`SynthesisController`] owns
//! the job slot and exposes the start/cancel protocol; the actual TTS
//! rendering lives behind [`BaseSynthesizer`].

pub mod base;
pub mod controller;
pub mod job;


pub use base::{BaseSynthesizer, SpeechCompletion, SpeechOutcome, SynthesisError, SynthesisResult};
pub use controller::{CancelOutcome, SynthesisController};
pub use job::{JobStatus, SynthesisJob};
