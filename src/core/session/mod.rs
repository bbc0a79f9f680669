//! Conversation session lifecycle.
//!
//! Wires the recognition provider, the reply collaborator, and the synthesis
//! controller into one running conversation. Recognition callbacks only
//! enqueue coordinator messages; every state transition happens on the
//! coordinator worker.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::ConversationConfig;
use crate::core::recognition::{
    BaseRecognizer, RecognitionSessionEvent, SessionEventCallback, TranscriptCallback,
};
use crate::core::reply::BaseReplyProvider;
use crate::core::synthesis::{BaseSynthesizer, SynthesisController};
use crate::core::turn::{CoordinatorMessage, SessionPhase, SessionState, TurnCoordinator};
use crate::errors::ConversationResult;

/// A single guest conversation from recognizer start to teardown.
pub struct ConversationSession {
    recognizer: RwLock<Box<dyn BaseRecognizer>>,
    coordinator: TurnCoordinator,
    state: Arc<SessionState>,
}

impl ConversationSession {
    /// Assemble a session over the three collaborators.
    ///
    /// Spawns the coordinator worker immediately; transcript flow begins only
    /// after [`start`](Self::start).
    pub fn new(
        config: ConversationConfig,
        recognizer: Box<dyn BaseRecognizer>,
        reply_provider: Arc<dyn BaseReplyProvider>,
        synthesizer: Arc<dyn BaseSynthesizer>,
    ) -> ConversationResult<Self> {
        config.validate()?;

        let state = Arc::new(SessionState::new());
        let controller = Arc::new(SynthesisController::new(
            synthesizer,
            state.clone(),
            &config,
        ));
        let coordinator = TurnCoordinator::spawn(config, state.clone(), controller, reply_provider);

        Ok(Self {
            recognizer: RwLock::new(recognizer),
            coordinator,
            state,
        })
    }

    /// Register the enqueue-only callbacks and start transcription.
    pub async fn start(&self) -> ConversationResult<()> {
        let mut recognizer = self.recognizer.write().await;

        let queue = self.coordinator.queue();
        let transcript_callback: TranscriptCallback = Arc::new(move |event| {
            let queue = queue.clone();
            Box::pin(async move {
                if queue
                    .send(CoordinatorMessage::Transcript(event))
                    .await
                    .is_err()
                {
                    warn!("transcript event dropped; coordinator already stopped");
                }
            })
        });
        recognizer.on_transcript(transcript_callback).await?;

        let queue = self.coordinator.queue();
        let session_callback: SessionEventCallback = Arc::new(move |event| {
            let queue = queue.clone();
            Box::pin(async move {
                let reason = match event {
                    RecognitionSessionEvent::Canceled { reason } => {
                        Some(reason.unwrap_or_else(|| "recognition cancelled".to_string()))
                    }
                    RecognitionSessionEvent::Stopped => None,
                };
                let _ = queue.send(CoordinatorMessage::Terminate { reason }).await;
            })
        });
        recognizer.on_session_event(session_callback).await?;

        recognizer.start().await?;
        info!(
            provider = recognizer.provider_info(),
            "conversation session started"
        );
        Ok(())
    }

    /// Current session phase.
    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Block until the session reaches `Terminated`, e.g. after the provider
    /// closes the stream.
    pub async fn wait_terminated(&self) {
        self.state.wait_for(SessionPhase::Terminated).await;
    }

    /// Tear the session down: cancel any outstanding synthesis, stop the
    /// recognizer, and wait for the coordinator worker to exit.
    ///
    /// If the session was terminated by an invariant breach, that error is
    /// returned here.
    pub async fn stop(&self) -> ConversationResult<()> {
        self.coordinator.terminate(None).await;
        self.state.wait_for(SessionPhase::Terminated).await;

        let stop_result = self.recognizer.write().await.stop().await;
        self.coordinator.join().await;
        stop_result?;
        if let Some(fault) = self.coordinator.take_fault() {
            return Err(fault);
        }

        info!("conversation session stopped");
        Ok(())
    }
}
