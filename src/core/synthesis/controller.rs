//! The synthesis controller: owner of the single "bot utterance" resource.
//!
//! At most one [`SynthesisJob`] is pending or speaking at any time. The job
//! slot is the only shared mutable resource in the system; it is accessed
//! exclusively through [`SynthesisController::start`] and
//! [`SynthesisController::cancel`]. A cancel racing the job's natural
//! completion converges to whichever terminal transition won; the loser's
//! effect is discarded, never applied on top.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ConversationConfig;
use crate::core::turn::state::{SessionPhase, SessionState};

use super::base::{BaseSynthesizer, SpeechOutcome, SynthesisError, SynthesisResult};
use super::job::{self, JobStatus, SynthesisJob};

/// Outcome of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Cancellation won; the job terminated as `Cancelled` (or was force-
    /// failed after the provider never confirmed the stop).
    Cancelled,
    /// The job had already reached a terminal status before the cancel took
    /// effect.
    AlreadyFinished,
    /// No job with this id is known.
    NotFound,
}

/// The currently active job occupying the slot.
struct ActiveJob {
    id: Uuid,
    status_tx: Arc<watch::Sender<JobStatus>>,
}

/// The single synthesis slot plus a record of the most recently finished job
/// (so a late cancel for it reports `AlreadyFinished` rather than `NotFound`).
struct Slot {
    active: Option<ActiveJob>,
    last_terminal: Option<(Uuid, JobStatus)>,
}

/// Starts, tracks, and cancels synthesis jobs against the provider.
///
/// All terminal transitions happen under the slot lock, so the slot contents,
/// the job status, and the session phase can never disagree for long enough
/// for another slot user to observe it. The slot is released only once the
/// provider side of the job is settled: a job cancelled before its start
/// acknowledgment keeps the slot occupied until its drive task has abandoned
/// the speak request and silenced the provider, so a new job never overlaps
/// the old one at the provider boundary.
#[derive(Clone)]
pub struct SynthesisController {
    synthesizer: Arc<dyn BaseSynthesizer>,
    state: Arc<SessionState>,
    slot: Arc<Mutex<Slot>>,
    /// Mirrors the id occupying the slot; updated under the slot lock so
    /// waiters can block on the release instead of polling.
    occupant: watch::Sender<Option<Uuid>>,
    speak_start_timeout: Duration,
    cancel_timeout: Duration,
}

impl SynthesisController {
    /// Creates a controller over the given provider and session state.
    pub fn new(
        synthesizer: Arc<dyn BaseSynthesizer>,
        state: Arc<SessionState>,
        config: &ConversationConfig,
    ) -> Self {
        let (occupant, _) = watch::channel(None);
        Self {
            synthesizer,
            state,
            slot: Arc::new(Mutex::new(Slot {
                active: None,
                last_terminal: None,
            })),
            occupant,
            speak_start_timeout: config.speak_start_timeout(),
            cancel_timeout: config.cancel_timeout(),
        }
    }

    /// Start a new synthesis job for the given text.
    ///
    /// Fails with [`SynthesisError::AlreadyActive`] if a job is still pending
    /// or speaking; callers must cancel first. On success the session phase
    /// is `Speaking` for the whole pending+speaking window of the new job.
    pub async fn start(&self, text: &str) -> SynthesisResult<SynthesisJob> {
        let mut slot = self.slot.lock().await;
        if let Some(active) = &slot.active {
            return Err(SynthesisError::AlreadyActive(active.id));
        }

        let id = Uuid::new_v4();
        let (status_tx, status_rx) = watch::channel(JobStatus::Pending);
        let status_tx = Arc::new(status_tx);
        slot.active = Some(ActiveJob {
            id,
            status_tx: status_tx.clone(),
        });
        self.occupant.send_replace(Some(id));
        self.state.set_phase(SessionPhase::Speaking);
        debug!(job = %id, "synthesis job created");

        let driver = self.clone();
        let job_text = text.to_string();
        tokio::spawn(async move {
            driver.drive(id, job_text, status_tx).await;
        });

        Ok(SynthesisJob::new(id, text.to_string(), status_rx))
    }

    /// Cancel a job by id.
    ///
    /// Safe to call concurrently with the job's natural completion and safe
    /// to call repeatedly: exactly one of {completion, cancellation, failure}
    /// determines the terminal status. Never returns while the session phase
    /// still reads `Speaking` for a finished job, and never returns while the
    /// cancelled job's speak request might still be live at the provider.
    pub async fn cancel(&self, id: Uuid) -> CancelOutcome {
        let pre_start_won;
        let status_rx;
        {
            let mut slot = self.slot.lock().await;
            let Some(active) = slot.active.as_ref() else {
                return Self::missing_outcome(&slot, id);
            };
            if active.id != id {
                return Self::missing_outcome(&slot, id);
            }

            pre_start_won = job::try_cancel_pending(&active.status_tx);
            status_rx = active.status_tx.subscribe();
        }
        if pre_start_won {
            // The drive task observes the cancellation, abandons the speak
            // request, silences the provider, and releases the slot. Wait
            // for the release so no new job overlaps the old speak request.
            debug!(job = %id, "cancelled before start acknowledgment");
            if timeout(self.cancel_timeout, self.wait_released(id))
                .await
                .is_err()
            {
                warn!(job = %id, "provider still draining after pre-start cancel");
            }
            self.settle_phase().await;
            return CancelOutcome::Cancelled;
        }

        // The job is speaking: ask the provider to stop, then block on the
        // job's own terminal transition instead of polling a flag.
        if let Err(e) = self.synthesizer.stop().await {
            warn!(job = %id, error = %e, "best-effort stop failed");
        }

        match timeout(self.cancel_timeout, job::await_terminal(status_rx)).await {
            Ok(JobStatus::Cancelled) => {
                self.settle_phase().await;
                CancelOutcome::Cancelled
            }
            Ok(status) => {
                // Natural completion (or a provider failure) won the race.
                debug!(job = %id, ?status, "cancel lost the terminal race");
                self.settle_phase().await;
                CancelOutcome::AlreadyFinished
            }
            Err(_) => {
                warn!(
                    job = %id,
                    timeout = ?self.cancel_timeout,
                    "synthesizer never confirmed stop; failing the job"
                );
                self.finish(id, JobStatus::Failed).await;
                self.settle_phase().await;
                CancelOutcome::Cancelled
            }
        }
    }

    /// Drive one job through its lifecycle against the provider.
    ///
    /// The wait for the start acknowledgment races the job's own status: a
    /// pre-start cancellation wakes this task immediately, which then drops
    /// the speak request, stops the provider, and releases the slot.
    async fn drive(self, id: Uuid, text: String, status_tx: Arc<watch::Sender<JobStatus>>) {
        let cancelled = job::await_terminal(status_tx.subscribe());
        tokio::pin!(cancelled);
        let speak = timeout(self.speak_start_timeout, self.synthesizer.speak(&text));
        tokio::pin!(speak);

        let completion = tokio::select! {
            _ = &mut cancelled => {
                debug!(job = %id, "cancelled while awaiting start acknowledgment");
                self.silence_and_release(id).await;
                return;
            }
            result = &mut speak => match result {
                Ok(Ok(completion)) => completion,
                Ok(Err(e)) => {
                    warn!(job = %id, error = %e, "synthesizer rejected the utterance");
                    self.finish(id, JobStatus::Failed).await;
                    return;
                }
                Err(_) => {
                    warn!(job = %id, "synthesizer did not acknowledge start in time");
                    self.finish(id, JobStatus::Failed).await;
                    return;
                }
            },
        };

        if !job::try_begin_speaking(&status_tx) {
            // A cancel landed between the acknowledgment and this transition.
            // The provider may have begun speaking, so silence it before the
            // slot opens up for a new job.
            debug!(job = %id, "start acknowledgment arrived after cancellation");
            self.silence_and_release(id).await;
            return;
        }
        debug!(job = %id, "synthesis speaking");

        match completion.await {
            Ok(SpeechOutcome::Completed) => self.finish(id, JobStatus::Completed).await,
            Ok(SpeechOutcome::Stopped) => self.finish(id, JobStatus::Cancelled).await,
            Ok(SpeechOutcome::Failed(reason)) => {
                warn!(job = %id, %reason, "synthesis failed mid-utterance");
                self.finish(id, JobStatus::Failed).await;
            }
            Err(_) => {
                warn!(job = %id, "synthesizer dropped the completion channel");
                self.finish(id, JobStatus::Failed).await;
            }
        }
    }

    /// Stop any provider activity left behind by a pre-start cancellation,
    /// then release the slot for the next job.
    async fn silence_and_release(&self, id: Uuid) {
        if let Err(e) = self.synthesizer.stop().await {
            debug!(job = %id, error = %e, "stop after pre-start cancel failed");
        }
        self.release(id).await;
    }

    /// Apply a terminal transition for `id` if it still owns the slot.
    ///
    /// Whichever of completion, cancellation, and failure gets here first
    /// also releases the slot and returns the phase to `Listening` (unless
    /// the session is already terminating).
    async fn finish(&self, id: Uuid, terminal: JobStatus) {
        let mut slot = self.slot.lock().await;
        let Some(active) = slot.active.as_ref() else {
            return;
        };
        if active.id != id {
            return;
        }
        if job::try_finish(&active.status_tx, terminal) {
            slot.active = None;
            slot.last_terminal = Some((id, terminal));
            self.occupant.send_replace(None);
            self.state
                .transition_from(SessionPhase::Speaking, SessionPhase::Listening);
            debug!(job = %id, status = ?terminal, "synthesis job finished");
        }
    }

    /// Release the slot for a job whose terminal status is already set.
    async fn release(&self, id: Uuid) {
        let mut slot = self.slot.lock().await;
        let Some(active) = slot.active.as_ref() else {
            return;
        };
        if active.id != id {
            return;
        }
        let status = *active.status_tx.borrow();
        slot.active = None;
        slot.last_terminal = Some((id, status));
        self.occupant.send_replace(None);
        self.state
            .transition_from(SessionPhase::Speaking, SessionPhase::Listening);
        debug!(job = %id, ?status, "synthesis job finished");
    }

    /// Wait until `id` no longer occupies the slot.
    async fn wait_released(&self, id: Uuid) {
        let mut occupant_rx = self.occupant.subscribe();
        loop {
            if *occupant_rx.borrow_and_update() != Some(id) {
                return;
            }
            if occupant_rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Guarantee the phase no longer reads `Speaking` for a finished job.
    ///
    /// Finishing happens under the slot lock, so taking the lock here orders
    /// us after the winner's release.
    async fn settle_phase(&self) {
        let slot = self.slot.lock().await;
        if slot.active.is_none() {
            self.state
                .transition_from(SessionPhase::Speaking, SessionPhase::Listening);
        }
    }

    fn missing_outcome(slot: &Slot, id: Uuid) -> CancelOutcome {
        match slot.last_terminal {
            Some((last, _)) if last == id => CancelOutcome::AlreadyFinished,
            _ => CancelOutcome::NotFound,
        }
    }
}
