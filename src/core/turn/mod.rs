//! # Turn-taking
//!
//! The turn-taking / barge-in state machine: [`BargeInDetector`] classifies
//! transcript events, [`TurnCoordinator`] owns the
//! Listening -> AwaitingReply -> Speaking -> Listening loop under a
//! single-writer discipline, and [`SessionState`] publishes the phase.

pub mod coordinator;
pub mod detector;
pub mod state;

#[cfg(test)]
mod tests;

pub use coordinator::{CoordinatorMessage, TurnCoordinator};
pub use detector::{BargeInAction, BargeInDetector, Utterance};
pub use state::{SessionPhase, SessionState};
