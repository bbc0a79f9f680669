//! Conversation session phase, shared between the coordinator, the
//! synthesis controller, and the barge-in detector.
//!
//! The phase is published through a `tokio::sync::watch` channel so that
//! observers can block on a transition (with a timeout) instead of polling a
//! shared flag.

use tokio::sync::watch;
use tracing::debug;

/// Phase of the conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the guest's next final utterance
    Listening,
    /// A reply request is in flight to the language-model collaborator
    AwaitingReply,
    /// A synthesis job is pending or actively speaking
    Speaking,
    /// Session teardown has begun; no new turns are accepted
    Terminating,
    /// Session is over (terminal)
    Terminated,
}

/// Shared session state with a single phase value.
///
/// Writes go through [`set_phase`](Self::set_phase) /
/// [`transition_from`](Self::transition_from); reads are lock-free borrows of
/// the watch channel. There is exactly one instance per conversation.
pub struct SessionState {
    phase_tx: watch::Sender<SessionPhase>,
}

impl SessionState {
    /// Creates a new session state in the `Listening` phase.
    pub fn new() -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Listening);
        Self { phase_tx }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        *self.phase_tx.borrow()
    }

    /// True while a synthesis job is pending or speaking.
    pub fn is_speaking(&self) -> bool {
        self.phase() == SessionPhase::Speaking
    }

    /// Set the phase unconditionally, notifying observers on change.
    pub fn set_phase(&self, phase: SessionPhase) {
        self.phase_tx.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            debug!(from = ?current, to = ?phase, "session phase transition");
            *current = phase;
            true
        });
    }

    /// Set the phase only if the current phase matches `from`.
    ///
    /// Returns true if the transition was applied. Used by the synthesis
    /// controller to release `Speaking` back to `Listening` without clobbering
    /// a concurrent `Terminating` transition.
    pub fn transition_from(&self, from: SessionPhase, to: SessionPhase) -> bool {
        self.phase_tx.send_if_modified(|current| {
            if *current != from {
                return false;
            }
            debug!(from = ?from, to = ?to, "session phase transition");
            *current = to;
            true
        })
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Wait until the session reaches the given phase.
    pub async fn wait_for(&self, target: SessionPhase) {
        let mut rx = self.subscribe();
        loop {
            if *rx.borrow_and_update() == target {
                return;
            }
            // The sender lives in self, so changed() cannot fail here.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
