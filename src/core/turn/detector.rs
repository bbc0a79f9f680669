//! Barge-in detection.
//!
//! Decides, for each transcript event, whether it constitutes guest speech
//! that must interrupt an in-progress bot utterance. A guest *partial* during
//! bot speech is itself sufficient to interrupt; the detector never waits
//! for a final result to barge in.

use std::sync::Arc;

use tracing::debug;

use crate::core::recognition::{TranscriptEvent, TranscriptEventKind};

use super::state::{SessionPhase, SessionState};

/// The accumulated final text attributed to one guest turn.
///
/// Created from a guest Final event and consumed exactly once to request a
/// reply. The sequence id travels with the reply so a stale reply (answering
/// a superseded utterance) can be dropped without being spoken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub sequence: u64,
}

/// Decision for a single transcript event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BargeInAction {
    /// Not guest speech, a no-match, or an empty final: nothing to do
    Ignore,
    /// Guest speech in progress while the bot is not speaking; informational
    BufferPartial,
    /// Guest speech in progress during bot speech: cancel synthesis now
    Interrupt,
    /// A complete guest utterance ready for a reply
    PromoteFinal(Utterance),
    /// A complete guest utterance that arrived during bot speech: interrupt
    /// first, then promote. Covers the guest's utterance completing before
    /// the interrupt from its own partials was processed; interrupting an
    /// already-idle synthesis is a no-op, not an error.
    InterruptAndPromote(Utterance),
}

/// Per-event barge-in decisions against the configured guest identity.
pub struct BargeInDetector {
    guest_speaker_id: String,
    state: Arc<SessionState>,
}

impl BargeInDetector {
    pub fn new(guest_speaker_id: impl Into<String>, state: Arc<SessionState>) -> Self {
        Self {
            guest_speaker_id: guest_speaker_id.into(),
            state,
        }
    }

    /// Decide what a transcript event means for turn-taking.
    pub fn decide(&self, event: &TranscriptEvent) -> BargeInAction {
        if event.speaker_id != self.guest_speaker_id {
            return BargeInAction::Ignore;
        }

        match event.kind {
            TranscriptEventKind::NoMatch => {
                debug!(sequence = event.sequence, "speech could not be transcribed");
                BargeInAction::Ignore
            }
            TranscriptEventKind::Partial => {
                if self.state.is_speaking() {
                    BargeInAction::Interrupt
                } else {
                    BargeInAction::BufferPartial
                }
            }
            TranscriptEventKind::Final => {
                if event.text.trim().is_empty() {
                    // "Didn't catch that": an empty final never starts a turn.
                    debug!(sequence = event.sequence, "ignoring empty final result");
                    return BargeInAction::Ignore;
                }
                let utterance = Utterance {
                    text: event.text.clone(),
                    sequence: event.sequence,
                };
                if self.state.is_speaking() {
                    BargeInAction::InterruptAndPromote(utterance)
                } else {
                    BargeInAction::PromoteFinal(utterance)
                }
            }
        }
    }
}
