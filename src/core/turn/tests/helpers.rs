use std::sync::Arc;

use crate::config::ConversationConfig;
use crate::core::recognition::TranscriptEvent;
use crate::core::synthesis::SynthesisController;
use crate::core::test_support::{expect_phase, StubReplyProvider, StubSynthesizer};
use crate::core::turn::{CoordinatorMessage, SessionPhase, SessionState, TurnCoordinator};

/// A coordinator wired to stub collaborators, with direct queue access.
pub struct TurnHarness {
    pub coordinator: TurnCoordinator,
    pub state: Arc<SessionState>,
    pub controller: Arc<SynthesisController>,
    pub synthesizer: Arc<StubSynthesizer>,
    pub replies: Arc<StubReplyProvider>,
}

pub fn fast_config() -> ConversationConfig {
    ConversationConfig {
        reply_timeout_ms: 2_000,
        speak_start_timeout_ms: 500,
        cancel_timeout_ms: 500,
        ..Default::default()
    }
}

pub fn harness() -> TurnHarness {
    harness_with(fast_config())
}

pub fn harness_with(config: ConversationConfig) -> TurnHarness {
    let state = Arc::new(SessionState::new());
    let synthesizer = StubSynthesizer::new();
    let replies = StubReplyProvider::new();
    let controller = Arc::new(SynthesisController::new(
        synthesizer.clone(),
        state.clone(),
        &config,
    ));
    let coordinator = TurnCoordinator::spawn(
        config,
        state.clone(),
        controller.clone(),
        replies.clone(),
    );

    TurnHarness {
        coordinator,
        state,
        controller,
        synthesizer,
        replies,
    }
}

impl TurnHarness {
    pub async fn send(&self, event: TranscriptEvent) {
        self.coordinator
            .queue()
            .send(CoordinatorMessage::Transcript(event))
            .await
            .expect("coordinator should be running");
    }

    pub async fn expect_phase(&self, phase: SessionPhase) {
        expect_phase(&self.state, phase).await;
    }
}
