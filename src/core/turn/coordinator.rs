//! The single-writer turn coordinator.
//!
//! All concurrent producers (recognition callbacks, reply tasks, synthesis
//! watchers) enqueue [`CoordinatorMessage`]s; one worker task drains the
//! queue and owns every state transition. Event handlers never block on the
//! reply or synthesis collaborators, which preserves the per-speaker event
//! ordering that ad hoc callbacks cannot.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ConversationConfig;
use crate::core::recognition::TranscriptEvent;
use crate::errors::ConversationError;
use crate::core::reply::{BaseReplyProvider, ReplyError};
use crate::core::synthesis::{JobStatus, SynthesisController, SynthesisError, SynthesisJob};

use super::detector::{BargeInAction, BargeInDetector, Utterance};
use super::state::{SessionPhase, SessionState};

/// Messages processed by the coordinator worker.
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// A recognition event, enqueued by the recognizer callback
    Transcript(TranscriptEvent),
    /// The reply collaborator answered (or failed) for an utterance
    ReplyReady {
        sequence: u64,
        result: Result<String, ReplyError>,
    },
    /// A synthesis job reached a terminal status
    SynthesisDone { job_id: Uuid, status: JobStatus },
    /// Session termination signal (stream closed, fatal error, stop request)
    Terminate { reason: Option<String> },
}

/// Top-level turn-taking state machine handle.
///
/// Spawns the worker task on construction; producers clone
/// [`queue`](Self::queue) senders to feed it.
pub struct TurnCoordinator {
    queue: mpsc::Sender<CoordinatorMessage>,
    worker: Mutex<Option<JoinHandle<()>>>,
    fault: Arc<Mutex<Option<ConversationError>>>,
}

impl TurnCoordinator {
    /// Spawn the coordinator worker.
    pub fn spawn(
        config: ConversationConfig,
        state: Arc<SessionState>,
        controller: Arc<SynthesisController>,
        reply_provider: Arc<dyn BaseReplyProvider>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let fault = Arc::new(Mutex::new(None));

        let worker = TurnWorker {
            detector: BargeInDetector::new(config.guest_speaker_id.clone(), state.clone()),
            config,
            state,
            controller,
            reply_provider,
            queue_tx: queue_tx.clone(),
            expected_reply: None,
            pending: None,
            active_job: None,
            fault: fault.clone(),
            stopped: false,
        };
        let handle = tokio::spawn(worker.run(queue_rx));

        Self {
            queue: queue_tx,
            worker: Mutex::new(Some(handle)),
            fault,
        }
    }

    /// Take the fatal error that terminated the session, if any.
    pub fn take_fault(&self) -> Option<ConversationError> {
        self.fault.lock().take()
    }

    /// Sender for enqueueing messages from event handlers.
    pub fn queue(&self) -> mpsc::Sender<CoordinatorMessage> {
        self.queue.clone()
    }

    /// Request session termination. Safe to call after the worker exited.
    pub async fn terminate(&self, reason: Option<String>) {
        if self
            .queue
            .send(CoordinatorMessage::Terminate { reason })
            .await
            .is_err()
        {
            debug!("terminate requested but coordinator already stopped");
        }
    }

    /// Wait for the worker task to exit. Idempotent.
    pub async fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "coordinator worker panicked");
            }
        }
    }
}

/// The worker's owned turn state. Mutated only inside `run`.
struct TurnWorker {
    config: ConversationConfig,
    state: Arc<SessionState>,
    controller: Arc<SynthesisController>,
    reply_provider: Arc<dyn BaseReplyProvider>,
    detector: BargeInDetector,
    /// Cloned into spawned reply/watcher tasks so their results re-enter the queue
    queue_tx: mpsc::Sender<CoordinatorMessage>,
    /// Sequence id of the reply we are willing to accept; `None` means any
    /// arriving reply is stale
    expected_reply: Option<u64>,
    /// At most one utterance queued for the next turn (most-recent-wins)
    pending: Option<Utterance>,
    /// Id of the job currently being spoken for this session
    active_job: Option<Uuid>,
    /// Set when an invariant breach terminates the session
    fault: Arc<Mutex<Option<ConversationError>>>,
    stopped: bool,
}

impl TurnWorker {
    async fn run(mut self, mut queue_rx: mpsc::Receiver<CoordinatorMessage>) {
        info!("turn coordinator started");

        while let Some(message) = queue_rx.recv().await {
            self.handle_message(message).await;
            if self.stopped {
                break;
            }
        }

        info!("turn coordinator finished");
    }

    async fn handle_message(&mut self, message: CoordinatorMessage) {
        match message {
            CoordinatorMessage::Transcript(event) => self.handle_transcript(event).await,
            CoordinatorMessage::ReplyReady { sequence, result } => {
                self.handle_reply(sequence, result).await
            }
            CoordinatorMessage::SynthesisDone { job_id, status } => {
                self.handle_synthesis_done(job_id, status).await
            }
            CoordinatorMessage::Terminate { reason } => self.handle_terminate(reason).await,
        }
    }

    async fn handle_transcript(&mut self, event: TranscriptEvent) {
        match self.detector.decide(&event) {
            BargeInAction::Ignore => {}
            BargeInAction::BufferPartial => {
                debug!(
                    sequence = event.sequence,
                    text = %event.text,
                    "guest speech in progress"
                );
            }
            BargeInAction::Interrupt => self.handle_interrupt().await,
            BargeInAction::PromoteFinal(utterance) => self.promote(utterance).await,
            BargeInAction::InterruptAndPromote(utterance) => {
                self.handle_interrupt().await;
                self.promote(utterance).await;
            }
        }
    }

    /// Barge-in: return to Listening, cancelling synthesis if it is running.
    ///
    /// Interrupting an already-idle session degrades to a no-op; a stale
    /// phase read behind this decision is safe, never an error.
    async fn handle_interrupt(&mut self) {
        match self.state.phase() {
            SessionPhase::Speaking => {
                self.expected_reply = None;
                self.pending = None;
                if let Some(job_id) = self.active_job.take() {
                    let outcome = self.controller.cancel(job_id).await;
                    info!(job = %job_id, ?outcome, "barge-in cancelled synthesis");
                } else {
                    // A stale phase read with no tracked job degrades to a
                    // no-op cancellation, never an error.
                    debug!("interrupt with no tracked job");
                }
            }
            SessionPhase::AwaitingReply => {
                // The in-flight request completes on its own; its result is
                // dropped on arrival.
                self.expected_reply = None;
                self.pending = None;
                self.state.set_phase(SessionPhase::Listening);
                debug!("barge-in abandoned the in-flight reply");
            }
            _ => {
                debug!("interrupt with nothing to interrupt");
            }
        }
    }

    /// A complete guest utterance is ready for a reply.
    async fn promote(&mut self, utterance: Utterance) {
        match self.state.phase() {
            SessionPhase::Listening => self.request_reply(utterance).await,
            SessionPhase::AwaitingReply => {
                // Most-recent-wins: the new utterance supersedes the in-flight
                // request, whose reply is now stale. Only one request is in
                // flight at a time, so the new one waits its turn.
                debug!(
                    sequence = utterance.sequence,
                    "queueing utterance; superseding in-flight reply"
                );
                self.expected_reply = None;
                self.pending = Some(utterance);
            }
            SessionPhase::Speaking => {
                // Reachable only through a stale phase read; queue it rather
                // than drop guest speech.
                self.pending = Some(utterance);
            }
            SessionPhase::Terminating | SessionPhase::Terminated => {
                debug!(
                    sequence = utterance.sequence,
                    "dropping utterance during teardown"
                );
            }
        }
    }

    /// Submit an utterance to the reply collaborator without blocking the
    /// worker: the request runs in its own task and re-enters the queue as a
    /// `ReplyReady` message.
    async fn request_reply(&mut self, utterance: Utterance) {
        self.state.set_phase(SessionPhase::AwaitingReply);
        self.expected_reply = Some(utterance.sequence);

        let provider = self.reply_provider.clone();
        let queue = self.queue_tx.clone();
        let reply_timeout = self.config.reply_timeout();
        let sequence = utterance.sequence;
        debug!(sequence, text = %utterance.text, "requesting reply");

        tokio::spawn(async move {
            let result = match tokio::time::timeout(reply_timeout, provider.reply(&utterance.text))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ReplyError::Timeout(reply_timeout)),
            };
            if queue
                .send(CoordinatorMessage::ReplyReady { sequence, result })
                .await
                .is_err()
            {
                debug!(sequence, "coordinator stopped before the reply arrived");
            }
        });
    }

    async fn handle_reply(&mut self, sequence: u64, result: Result<String, ReplyError>) {
        let fresh = self.expected_reply == Some(sequence)
            && self.state.phase() == SessionPhase::AwaitingReply;
        if !fresh {
            // Superseded by a later utterance or an interrupt; dropped
            // silently, never reported as an error.
            debug!(sequence, "dropping stale reply");
            if self.state.phase() == SessionPhase::AwaitingReply {
                self.submit_pending().await;
            }
            return;
        }

        self.expected_reply = None;
        match result {
            Ok(text) => self.speak_reply(sequence, text).await,
            Err(e) => {
                warn!(sequence, error = %e, "reply request failed; abandoning turn");
                self.state.set_phase(SessionPhase::Listening);
                self.submit_pending().await;
            }
        }
    }

    async fn speak_reply(&mut self, sequence: u64, text: String) {
        match self.controller.start(&text).await {
            Ok(job) => {
                debug!(sequence, job = %job.id, "speaking reply");
                self.active_job = Some(job.id);
                self.watch_job(job);
            }
            Err(SynthesisError::AlreadyActive(job_id)) => {
                // Single-writer discipline should make this unreachable.
                error!(job = %job_id, "invariant breach: a second synthesis job is active");
                self.fatal("two synthesis jobs simultaneously active").await;
            }
            Err(e) => {
                warn!(sequence, error = %e, "failed to start synthesis; abandoning turn");
                self.state.set_phase(SessionPhase::Listening);
                self.submit_pending().await;
            }
        }
    }

    /// Watch a job's terminal status from a side task; the result re-enters
    /// the queue so the worker stays the single writer.
    fn watch_job(&self, job: SynthesisJob) {
        let queue = self.queue_tx.clone();
        tokio::spawn(async move {
            let status = job.terminal_status().await;
            let _ = queue
                .send(CoordinatorMessage::SynthesisDone {
                    job_id: job.id,
                    status,
                })
                .await;
        });
    }

    async fn handle_synthesis_done(&mut self, job_id: Uuid, status: JobStatus) {
        if self.active_job != Some(job_id) {
            // Already handled by the barge-in path.
            debug!(job = %job_id, ?status, "terminal status for a job no longer tracked");
            return;
        }
        self.active_job = None;

        match status {
            JobStatus::Completed => debug!(job = %job_id, "bot utterance completed"),
            JobStatus::Cancelled => debug!(job = %job_id, "bot utterance cancelled"),
            // Failed returns the session to Listening like Completed does,
            // but is reported distinctly.
            JobStatus::Failed => warn!(job = %job_id, "bot utterance failed"),
            JobStatus::Pending | JobStatus::Speaking => {
                error!(job = %job_id, ?status, "non-terminal status reported as done");
                return;
            }
        }

        // The controller already released the phase to Listening.
        self.submit_pending().await;
    }

    /// Submit the queued next-turn utterance, if any.
    async fn submit_pending(&mut self) {
        if let Some(utterance) = self.pending.take() {
            self.request_reply(utterance).await;
        }
    }

    async fn handle_terminate(&mut self, reason: Option<String>) {
        info!(reason = reason.as_deref(), "terminating conversation session");
        self.state.set_phase(SessionPhase::Terminating);

        if let Some(job_id) = self.active_job.take() {
            let outcome = self.controller.cancel(job_id).await;
            debug!(job = %job_id, ?outcome, "cancelled outstanding synthesis during teardown");
        }
        // An outstanding reply request is abandoned; its eventual result is
        // dropped when the queue closes.
        self.expected_reply = None;
        self.pending = None;

        self.state.set_phase(SessionPhase::Terminated);
        self.stopped = true;
    }

    /// Invariant violations are fatal to the session, not recovered. The
    /// error is kept for [`TurnCoordinator::take_fault`] so session teardown
    /// can report it.
    async fn fatal(&mut self, reason: &str) {
        error!(reason, "fatal invariant violation; terminating session");
        *self.fault.lock() = Some(ConversationError::RaceViolation(reason.to_string()));
        self.handle_terminate(Some(format!("race violation: {reason}")))
            .await;
    }
}
