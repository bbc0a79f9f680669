//! Shared stub collaborators for exercising the turn-taking engine.
//!
//! The stubs never sleep on their own: tests drive provider-side events
//! (completion, failure, stop confirmation) explicitly, so timing-sensitive
//! races can be reproduced deterministically.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

use super::recognition::{
    BaseRecognizer, RecognitionError, RecognitionSessionEvent, SessionEventCallback,
    TranscriptCallback, TranscriptEvent,
};
use super::reply::{BaseReplyProvider, ReplyError};
use super::synthesis::{
    BaseSynthesizer, SpeechCompletion, SpeechOutcome, SynthesisError, SynthesisResult,
};

const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Synthesizer stub holding the completion sender for the current utterance.
///
/// Tests end the utterance through [`complete_naturally`] /
/// [`fail_current`]; `stop` confirms with `Stopped` unless `ignore_stop` is
/// set (for cancel-timeout tests).
pub struct StubSynthesizer {
    current: Mutex<Option<oneshot::Sender<SpeechOutcome>>>,
    spoken: Mutex<Vec<String>>,
    spoken_count: watch::Sender<usize>,
    pub stop_calls: AtomicUsize,
    ack_delay: Mutex<Option<Duration>>,
    ignore_stop: AtomicBool,
    fail_speak: AtomicBool,
}

impl StubSynthesizer {
    pub fn new() -> Arc<Self> {
        let (spoken_count, _) = watch::channel(0);
        Arc::new(Self {
            current: Mutex::new(None),
            spoken: Mutex::new(Vec::new()),
            spoken_count,
            stop_calls: AtomicUsize::new(0),
            ack_delay: Mutex::new(None),
            ignore_stop: AtomicBool::new(false),
            fail_speak: AtomicBool::new(false),
        })
    }

    /// Delay the start acknowledgment, keeping the job `Pending` long enough
    /// for a pre-start cancellation to land.
    pub fn set_ack_delay(&self, delay: Duration) {
        *self.ack_delay.lock() = Some(delay);
    }

    /// Acknowledge subsequent `speak` calls immediately again.
    pub fn clear_ack_delay(&self) {
        *self.ack_delay.lock() = None;
    }

    /// Swallow `stop` calls without confirming, so a cancel has to time out.
    pub fn set_ignore_stop(&self, ignore: bool) {
        self.ignore_stop.store(ignore, Ordering::SeqCst);
    }

    /// Reject the next `speak` call outright.
    pub fn set_fail_speak(&self, fail: bool) {
        self.fail_speak.store(fail, Ordering::SeqCst);
    }

    /// Finish the current utterance as if playback ran to its natural end.
    /// Returns false if no utterance was in flight (e.g. a stop already
    /// claimed it).
    pub fn complete_naturally(&self) -> bool {
        match self.current.lock().take() {
            Some(tx) => tx.send(SpeechOutcome::Completed).is_ok(),
            None => false,
        }
    }

    /// Fail the current utterance mid-playback.
    pub fn fail_current(&self, reason: &str) -> bool {
        match self.current.lock().take() {
            Some(tx) => tx.send(SpeechOutcome::Failed(reason.to_string())).is_ok(),
            None => false,
        }
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn is_speaking(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Block until at least `n` utterances have been accepted.
    pub async fn wait_spoken(&self, n: usize) {
        let mut rx = self.spoken_count.subscribe();
        tokio::time::timeout(WAIT_TIMEOUT, async {
            loop {
                if *rx.borrow_and_update() >= n {
                    return;
                }
                if rx.changed().await.is_err() {
                    panic!("synthesizer stub dropped while waiting for utterance {n}");
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for utterance {n}"));
    }
}

#[async_trait]
impl BaseSynthesizer for StubSynthesizer {
    async fn speak(&self, text: &str) -> SynthesisResult<SpeechCompletion> {
        if self.fail_speak.load(Ordering::SeqCst) {
            return Err(SynthesisError::StartFailed("stub start failure".to_string()));
        }
        let delay = *self.ack_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (tx, rx) = oneshot::channel();
        *self.current.lock() = Some(tx);
        let count = {
            let mut spoken = self.spoken.lock();
            spoken.push(text.to_string());
            spoken.len()
        };
        self.spoken_count.send_replace(count);
        Ok(rx)
    }

    async fn stop(&self) -> SynthesisResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.ignore_stop.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(tx) = self.current.lock().take() {
            let _ = tx.send(SpeechOutcome::Stopped);
        }
        Ok(())
    }

    fn provider_info(&self) -> &'static str {
        "StubSynthesizer v1.0"
    }
}

/// Reply-provider stub with canned answers, per-utterance delays, and
/// per-utterance failures.
pub struct StubReplyProvider {
    requests: Mutex<Vec<String>>,
    request_count: watch::Sender<usize>,
    canned: Mutex<HashMap<String, String>>,
    delays: Mutex<HashMap<String, Duration>>,
    failures: Mutex<HashSet<String>>,
}

impl StubReplyProvider {
    pub fn new() -> Arc<Self> {
        let (request_count, _) = watch::channel(0);
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            request_count,
            canned: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashSet::new()),
        })
    }

    /// Canned answer for an exact utterance text.
    pub fn respond(&self, utterance: &str, reply: &str) {
        self.canned
            .lock()
            .insert(utterance.to_string(), reply.to_string());
    }

    /// Delay the answer for an exact utterance text.
    pub fn delay(&self, utterance: &str, delay: Duration) {
        self.delays.lock().insert(utterance.to_string(), delay);
    }

    /// Fail the request for an exact utterance text.
    pub fn fail(&self, utterance: &str) {
        self.failures.lock().insert(utterance.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Block until at least `n` requests have been received.
    pub async fn wait_requests(&self, n: usize) {
        let mut rx = self.request_count.subscribe();
        tokio::time::timeout(WAIT_TIMEOUT, async {
            loop {
                if *rx.borrow_and_update() >= n {
                    return;
                }
                if rx.changed().await.is_err() {
                    panic!("reply stub dropped while waiting for request {n}");
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for reply request {n}"));
    }
}

#[async_trait]
impl BaseReplyProvider for StubReplyProvider {
    async fn reply(&self, text: &str) -> Result<String, ReplyError> {
        let count = {
            let mut requests = self.requests.lock();
            requests.push(text.to_string());
            requests.len()
        };
        self.request_count.send_replace(count);

        let delay = self.delays.lock().get(text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failures.lock().contains(text) {
            return Err(ReplyError::RequestFailed("stub failure".to_string()));
        }
        let canned = self.canned.lock().get(text).cloned();
        Ok(canned.unwrap_or_else(|| format!("re: {text}")))
    }

    fn provider_info(&self) -> &'static str {
        "StubReplyProvider v1.0"
    }
}

#[derive(Default)]
struct RecognizerShared {
    transcript: Option<TranscriptCallback>,
    session: Option<SessionEventCallback>,
    running: bool,
    start_calls: usize,
    stop_calls: usize,
}

/// Emitter half of [`StubRecognizer`].
///
/// The session consumes the recognizer by value, so tests keep this handle to
/// feed events through the registered callbacks afterwards.
#[derive(Clone, Default)]
pub struct RecognizerHandle {
    inner: Arc<Mutex<RecognizerShared>>,
}

impl RecognizerHandle {
    pub async fn emit(&self, event: TranscriptEvent) {
        let callback = self.inner.lock().transcript.clone();
        match callback {
            Some(callback) => callback(event).await,
            None => panic!("no transcript callback registered"),
        }
    }

    pub async fn emit_session(&self, event: RecognitionSessionEvent) {
        let callback = self.inner.lock().session.clone();
        match callback {
            Some(callback) => callback(event).await,
            None => panic!("no session-event callback registered"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn start_calls(&self) -> usize {
        self.inner.lock().start_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.inner.lock().stop_calls
    }
}

/// Recognizer stub that records its callbacks for the handle to emit through.
pub struct StubRecognizer {
    inner: Arc<Mutex<RecognizerShared>>,
}

impl StubRecognizer {
    pub fn new() -> (Box<dyn BaseRecognizer>, RecognizerHandle) {
        let handle = RecognizerHandle::default();
        let recognizer = Self {
            inner: handle.inner.clone(),
        };
        (Box::new(recognizer), handle)
    }
}

#[async_trait]
impl BaseRecognizer for StubRecognizer {
    async fn start(&mut self) -> Result<(), RecognitionError> {
        let mut shared = self.inner.lock();
        shared.running = true;
        shared.start_calls += 1;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RecognitionError> {
        let mut shared = self.inner.lock();
        shared.running = false;
        shared.stop_calls += 1;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    async fn on_transcript(
        &mut self,
        callback: TranscriptCallback,
    ) -> Result<(), RecognitionError> {
        self.inner.lock().transcript = Some(callback);
        Ok(())
    }

    async fn on_session_event(
        &mut self,
        callback: SessionEventCallback,
    ) -> Result<(), RecognitionError> {
        self.inner.lock().session = Some(callback);
        Ok(())
    }

    fn provider_info(&self) -> &'static str {
        "StubRecognizer v1.0"
    }
}

/// The diarized speaker id used throughout the test suite.
pub const GUEST: &str = "Guest-1";

pub fn guest_partial(text: &str, sequence: u64) -> TranscriptEvent {
    TranscriptEvent::partial(GUEST, text, sequence)
}

pub fn guest_final(text: &str, sequence: u64) -> TranscriptEvent {
    TranscriptEvent::final_result(GUEST, text, sequence)
}

pub fn other_final(text: &str, sequence: u64) -> TranscriptEvent {
    TranscriptEvent::final_result("Unknown", text, sequence)
}

/// Wait (bounded) for the session to reach a phase.
pub async fn expect_phase(state: &super::turn::SessionState, phase: super::turn::SessionPhase) {
    tokio::time::timeout(WAIT_TIMEOUT, state.wait_for(phase))
        .await
        .unwrap_or_else(|_| {
            panic!(
                "timed out waiting for phase {phase:?}; current phase is {:?}",
                state.phase()
            )
        });
}
