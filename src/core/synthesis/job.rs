//! The owned synthesis job entity.
//!
//! A job's status is published through a `tokio::sync::watch` channel:
//! the cancel path blocks on the channel until a terminal status is durably
//! observed, and the terminal transition itself is first-wins: whichever of
//! natural completion and cancellation lands first determines the terminal
//! status, and the loser's transition is discarded.

use tokio::sync::watch;
use uuid::Uuid;

/// Lifecycle status of a synthesis job.
///
/// Transitions are forward-only: `Pending -> Speaking -> terminal`, with the
/// single exception of a pre-start cancellation (`Pending -> Cancelled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Created; waiting for the provider's start acknowledgment
    Pending,
    /// The provider accepted the request and is speaking
    Speaking,
    /// Playback ran to its natural end (terminal)
    Completed,
    /// Cancellation won the terminal race (terminal)
    Cancelled,
    /// The provider failed, or a stop was never confirmed (terminal)
    Failed,
}

impl JobStatus {
    /// True for `Completed`, `Cancelled`, and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }

    /// True for `Pending` and `Speaking`.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// A handle to one bot utterance owned by the `SynthesisController`.
///
/// Cloning the job clones the status subscription, not the job itself; there
/// is at most one underlying job active at any time.
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    /// Unique token identifying this job for cancellation
    pub id: Uuid,
    /// The text being spoken
    pub text: String,
    status_rx: watch::Receiver<JobStatus>,
}

impl SynthesisJob {
    pub(super) fn new(id: Uuid, text: String, status_rx: watch::Receiver<JobStatus>) -> Self {
        Self { id, text, status_rx }
    }

    /// Current status snapshot.
    pub fn status(&self) -> JobStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status_rx.clone()
    }

    /// Wait until the job reaches a terminal status and return it.
    pub async fn terminal_status(&self) -> JobStatus {
        await_terminal(self.status_rx.clone()).await
    }
}

/// Block until the watched status turns terminal.
///
/// Also used by the cancel path, which must not return while the job might
/// still be speaking.
pub(super) async fn await_terminal(mut rx: watch::Receiver<JobStatus>) -> JobStatus {
    loop {
        let status = *rx.borrow_and_update();
        if status.is_terminal() {
            return status;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without a terminal transition; report what we saw.
            return *rx.borrow();
        }
    }
}

/// Apply a first-wins terminal transition. Returns true if this caller won.
pub(super) fn try_finish(status_tx: &watch::Sender<JobStatus>, terminal: JobStatus) -> bool {
    debug_assert!(terminal.is_terminal());
    status_tx.send_if_modified(|current| {
        if current.is_terminal() {
            return false;
        }
        *current = terminal;
        true
    })
}

/// Cancel a job that has not yet been acknowledged. Returns true only if the
/// job was still `Pending`; a job that already began speaking must be
/// stopped through the provider instead.
pub(super) fn try_cancel_pending(status_tx: &watch::Sender<JobStatus>) -> bool {
    status_tx.send_if_modified(|current| {
        if *current != JobStatus::Pending {
            return false;
        }
        *current = JobStatus::Cancelled;
        true
    })
}

/// Advance `Pending -> Speaking`. Returns false if the job is no longer
/// pending (a pre-start cancellation won).
pub(super) fn try_begin_speaking(status_tx: &watch::Sender<JobStatus>) -> bool {
    status_tx.send_if_modified(|current| {
        if *current != JobStatus::Pending {
            return false;
        }
        *current = JobStatus::Speaking;
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Pending.is_active());
        assert!(JobStatus::Speaking.is_active());
    }

    #[test]
    fn test_terminal_transition_is_first_wins() {
        let (tx, rx) = watch::channel(JobStatus::Speaking);

        assert!(try_finish(&tx, JobStatus::Completed));
        // The losing transition is discarded, not applied on top.
        assert!(!try_finish(&tx, JobStatus::Cancelled));
        assert_eq!(*rx.borrow(), JobStatus::Completed);
    }

    #[test]
    fn test_begin_speaking_loses_to_prestart_cancel() {
        let (tx, rx) = watch::channel(JobStatus::Pending);

        assert!(try_finish(&tx, JobStatus::Cancelled));
        assert!(!try_begin_speaking(&tx));
        assert_eq!(*rx.borrow(), JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_await_terminal_blocks_until_finish() {
        let (tx, rx) = watch::channel(JobStatus::Pending);

        let waiter = tokio::spawn(await_terminal(rx));
        assert!(try_begin_speaking(&tx));
        assert!(try_finish(&tx, JobStatus::Completed));

        let status = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("await_terminal should observe the terminal status")
            .unwrap();
        assert_eq!(status, JobStatus::Completed);
    }
}
