//! Mock responders and a runtime harness for testing
//!
//! These mocks drive real session runtimes without network access.

use super::{spawn_session, SequencedEvent, SessionHandle, SessionSnapshot, SseEvent};
use crate::activity::{ActivityKind, Capability, ClientCapabilities};
use crate::config::ServerConfig;
use crate::responder::{Responder, ResponderError, ResponderErrorKind};
use crate::state_machine::{Event, SessionContext, Turn};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Mock Responder
// ============================================================================

/// A recorded responder call
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub input: String,
    pub transcript: Vec<Turn>,
}

/// Mock responder that returns queued results
#[derive(Default)]
pub struct MockResponder {
    results: Mutex<VecDeque<Result<String, ResponderError>>>,
    /// Record of all calls made
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl MockResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, text: impl Into<String>) {
        self.results.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue a failure
    pub fn queue_error(&self, error: ResponderError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_result(&self, input: &str, transcript: &[Turn]) -> Result<String, ResponderError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            input: input.to_string(),
            transcript: transcript.to_vec(),
        });
        self.results.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ResponderError::new(
                ResponderErrorKind::Unavailable,
                "No mock reply queued",
            ))
        })
    }
}

#[async_trait]
impl Responder for MockResponder {
    async fn respond(&self, input: &str, transcript: &[Turn]) -> Result<String, ResponderError> {
        self.next_result(input, transcript)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Delayed Mock Responder (for in-flight testing)
// ============================================================================

/// Mock responder that holds every call until released
#[derive(Default)]
pub struct DelayedMockResponder {
    inner: MockResponder,
    /// Notified when a call starts (for test synchronization)
    pub request_started: Arc<Notify>,
    /// Each notification lets one pending call finish
    pub release: Arc<Notify>,
}

impl DelayedMockResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_reply(&self, text: impl Into<String>) {
        self.inner.queue_reply(text);
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl Responder for DelayedMockResponder {
    async fn respond(&self, input: &str, transcript: &[Turn]) -> Result<String, ResponderError> {
        self.request_started.notify_one();
        self.release.notified().await;
        self.inner.next_result(input, transcript)
    }

    fn name(&self) -> &str {
        "delayed-mock"
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// A real session runtime around a mock responder
pub struct TestRuntime<R: Responder + 'static> {
    pub handle: SessionHandle,
    pub broadcast_rx: broadcast::Receiver<SequencedEvent>,
    pub responder: Arc<R>,
}

impl TestRuntime<MockResponder> {
    /// Create a simple test runtime with an instant mock
    pub fn new() -> TestRuntimeBuilder<MockResponder> {
        TestRuntimeBuilder::new(MockResponder::new())
    }
}

pub struct TestRuntimeBuilder<R> {
    session_id: String,
    activity: ActivityKind,
    client: ClientCapabilities,
    responder: R,
}

impl<R: Responder + 'static> TestRuntimeBuilder<R> {
    pub fn new(responder: R) -> Self {
        Self {
            session_id: "test-session".to_string(),
            activity: ActivityKind::Chat,
            client: ClientCapabilities::default(),
            responder,
        }
    }

    pub fn responder<R2: Responder + 'static>(self, responder: R2) -> TestRuntimeBuilder<R2> {
        TestRuntimeBuilder {
            session_id: self.session_id,
            activity: self.activity,
            client: self.client,
            responder,
        }
    }

    pub fn activity(mut self, activity: ActivityKind) -> Self {
        self.activity = activity;
        self
    }

    pub fn client(mut self, client: ClientCapabilities) -> Self {
        self.client = client;
        self
    }

    pub fn build(self) -> TestRuntime<R> {
        let responder = Arc::new(self.responder);
        let context = SessionContext::new(
            self.session_id,
            self.activity,
            Capability::detect(self.activity, self.client),
            responder.name(),
        );
        let handle = spawn_session(
            context,
            Arc::clone(&responder),
            ServerConfig::default().idle_timeout,
        );
        let broadcast_rx = handle.subscribe();

        TestRuntime {
            handle,
            broadcast_rx,
            responder,
        }
    }
}

impl<R: Responder + 'static> TestRuntime<R> {
    pub async fn send(&self, event: Event) {
        self.handle.send(event).await.expect("Failed to send event");
    }

    pub async fn submit(&self, text: &str) {
        self.send(Event::Submit {
            text: text.to_string(),
        })
        .await;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.handle.snapshot()
    }

    /// Wait until the published snapshot satisfies `predicate`
    pub async fn wait_until(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = self.handle.snapshot_rx.clone();
        let snapshot = tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(|s| predicate(s)))
            .await
            .expect("Timed out waiting for snapshot")
            .expect("Runtime stopped");
        SessionSnapshot::clone(&snapshot)
    }

    /// Wait until every queued event has been processed.
    ///
    /// Events are handled in order, so once a marker input change shows
    /// up in the snapshot everything sent before it has been applied.
    pub async fn settle(&self) -> SessionSnapshot {
        let restore = self.snapshot().pending_input;
        let marker = format!("settle-{}", uuid::Uuid::new_v4());
        self.send(Event::InputChanged {
            text: marker.clone(),
        })
        .await;
        self.wait_until(|s| s.pending_input == marker).await;
        self.send(Event::InputChanged {
            text: restore.clone(),
        })
        .await;
        self.wait_until(|s| s.pending_input == restore).await
    }

    /// Next broadcast event, skipping nothing
    pub async fn next_event(&mut self) -> SseEvent {
        self.next_sequenced().await.event
    }

    pub async fn next_sequenced(&mut self) -> SequencedEvent {
        tokio::time::timeout(WAIT_TIMEOUT, self.broadcast_rx.recv())
            .await
            .expect("Timed out waiting for event")
            .expect("Broadcast closed")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::SPEECH_UNSUPPORTED_NOTICE;
    use crate::state_machine::state::{FALLBACK_REPLY, MISHEARD_REPLY};
    use crate::state_machine::{KeyModifiers, Sender, SessionState};

    fn texts(snapshot: &SessionSnapshot) -> Vec<(Sender, String)> {
        snapshot
            .transcript
            .turns()
            .iter()
            .map(|t| (t.sender, t.text.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_mock_responder_queue() {
        let responder = MockResponder::new();
        responder.queue_reply("one");
        responder.queue_error(ResponderError::timeout("late"));

        assert_eq!(responder.respond("a", &[]).await.unwrap(), "one");
        let err = responder.respond("b", &[]).await.unwrap_err();
        assert_eq!(err.kind, ResponderErrorKind::Timeout);
        let err = responder.respond("c", &[]).await.unwrap_err();
        assert_eq!(err.kind, ResponderErrorKind::Unavailable);
        assert_eq!(responder.recorded_requests().len(), 3);
    }

    /// Integration test: a successful round trip
    #[tokio::test]
    async fn test_hello_round_trip() {
        let rt = TestRuntime::new().build();
        rt.responder.queue_reply("Salut !");

        rt.submit("Bonjour").await;
        let snapshot = rt
            .wait_until(|s| s.transcript.len() == 2 && s.state == SessionState::Idle)
            .await;

        assert_eq!(
            texts(&snapshot),
            vec![
                (Sender::User, "Bonjour".to_string()),
                (Sender::Assistant, "Salut !".to_string()),
            ]
        );

        // The responder sees the user turn as the last transcript entry
        let requests = rt.responder.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].input, "Bonjour");
        assert_eq!(requests[0].transcript.len(), 1);
        assert_eq!(requests[0].transcript[0].text, "Bonjour");
    }

    /// Integration test: a failing responder yields the fallback reply
    #[tokio::test]
    async fn test_failure_becomes_fallback() {
        let rt = TestRuntime::new().build();
        rt.responder
            .queue_error(ResponderError::new(ResponderErrorKind::Network, "down"));

        rt.submit("Bonjour").await;
        let snapshot = rt
            .wait_until(|s| s.transcript.len() == 2 && s.state == SessionState::Idle)
            .await;

        assert_eq!(
            texts(&snapshot),
            vec![
                (Sender::User, "Bonjour".to_string()),
                (Sender::Assistant, FALLBACK_REPLY.to_string()),
            ]
        );
    }

    /// Integration test: a second submission while waiting is dropped
    #[tokio::test]
    async fn test_submit_while_waiting_is_dropped() {
        let rt = TestRuntime::new()
            .responder(DelayedMockResponder::new())
            .build();
        rt.responder.queue_reply("Réponse A");

        rt.submit("A").await;
        rt.responder.request_started.notified().await;
        rt.submit("B").await;

        let snapshot = rt.settle().await;
        assert_eq!(snapshot.state, SessionState::Waiting);
        assert_eq!(texts(&snapshot), vec![(Sender::User, "A".to_string())]);

        rt.responder.release.notify_one();
        let snapshot = rt
            .wait_until(|s| s.state == SessionState::Idle)
            .await;

        assert_eq!(
            texts(&snapshot),
            vec![
                (Sender::User, "A".to_string()),
                (Sender::Assistant, "Réponse A".to_string()),
            ]
        );
        assert_eq!(rt.responder.recorded_requests().len(), 1);
    }

    /// Integration test: N round trips produce 2N alternating turns
    #[tokio::test]
    async fn test_round_trips_alternate() {
        let rt = TestRuntime::new().build();

        for i in 1..=3 {
            rt.responder.queue_reply(format!("réponse {i}"));
            rt.submit(&format!("question {i}")).await;
            rt.wait_until(|s| s.transcript.len() == i * 2 && s.state == SessionState::Idle)
                .await;
        }

        let snapshot = rt.snapshot();
        for (i, turn) in snapshot.transcript.turns().iter().enumerate() {
            let expected = if i % 2 == 0 { Sender::User } else { Sender::Assistant };
            assert_eq!(turn.sender, expected);
        }
    }

    #[tokio::test]
    async fn test_blank_submit_ignored() {
        let rt = TestRuntime::new().build();

        rt.submit("   ").await;
        rt.submit("").await;
        let snapshot = rt.settle().await;

        assert!(snapshot.transcript.is_empty());
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(rt.responder.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_input_updates_do_not_touch_transcript() {
        let mut rt = TestRuntime::new().build();

        rt.send(Event::InputChanged {
            text: "Pourquoi".to_string(),
        })
        .await;

        match rt.next_event().await {
            SseEvent::InputChanged { text } => assert_eq!(text, "Pourquoi"),
            other => panic!("Expected InputChanged, got {other:?}"),
        }

        let snapshot = rt.wait_until(|s| s.pending_input == "Pourquoi").await;
        assert!(snapshot.transcript.is_empty());
    }

    /// Integration test: Enter submits the pending input, Shift+Enter adds a line
    #[tokio::test]
    async fn test_submit_key() {
        let rt = TestRuntime::new().build();
        rt.responder.queue_reply("Bonne question !");

        rt.send(Event::InputChanged {
            text: "Pourquoi".to_string(),
        })
        .await;

        let shift = KeyModifiers {
            shift: true,
            ..KeyModifiers::default()
        };
        rt.send(Event::from_key_press("Enter", shift).unwrap()).await;
        let snapshot = rt.wait_until(|s| s.pending_input == "Pourquoi\n").await;
        assert!(snapshot.transcript.is_empty());

        rt.send(Event::InputChanged {
            text: "Pourquoi\nle ciel".to_string(),
        })
        .await;
        rt.send(Event::from_key_press("Enter", KeyModifiers::default()).unwrap())
            .await;

        let snapshot = rt
            .wait_until(|s| s.transcript.len() == 2 && s.state == SessionState::Idle)
            .await;
        assert_eq!(snapshot.transcript.turns()[0].text, "Pourquoi\nle ciel");
        assert_eq!(snapshot.pending_input, "");
    }

    #[tokio::test]
    async fn test_submit_clears_pending_input() {
        let rt = TestRuntime::new().build();
        rt.responder.queue_reply("ok");

        rt.send(Event::InputChanged {
            text: "Bonjour".to_string(),
        })
        .await;
        rt.submit("Bonjour").await;

        let snapshot = rt
            .wait_until(|s| s.transcript.len() == 2 && s.state == SessionState::Idle)
            .await;
        assert_eq!(snapshot.pending_input, "");
    }

    /// Integration test: voice session in a browser without speech recognition
    #[tokio::test]
    async fn test_unsupported_voice_session() {
        let rt = TestRuntime::new().activity(ActivityKind::Voice).build();

        let snapshot = rt.snapshot();
        assert_eq!(
            texts(&snapshot),
            vec![(Sender::Assistant, SPEECH_UNSUPPORTED_NOTICE.to_string())]
        );

        rt.send(Event::SpeechRecognized {
            transcript: "Bonjour".to_string(),
        })
        .await;
        let snapshot = rt.settle().await;

        assert_eq!(snapshot.transcript.len(), 1);
        assert!(rt.responder.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_supported_voice_session() {
        let rt = TestRuntime::new()
            .activity(ActivityKind::Voice)
            .client(ClientCapabilities {
                speech_recognition: true,
            })
            .build();
        rt.responder.queue_reply("Les têtards !");

        assert!(rt.snapshot().transcript.is_empty());

        rt.send(Event::SpeechFailed {
            reason: "no-speech".to_string(),
        })
        .await;
        rt.send(Event::SpeechRecognized {
            transcript: "Comment s'appellent les bébés grenouilles ?".to_string(),
        })
        .await;

        let snapshot = rt
            .wait_until(|s| s.transcript.len() == 3 && s.state == SessionState::Idle)
            .await;
        assert_eq!(
            texts(&snapshot),
            vec![
                (Sender::Assistant, MISHEARD_REPLY.to_string()),
                (
                    Sender::User,
                    "Comment s'appellent les bébés grenouilles ?".to_string()
                ),
                (Sender::Assistant, "Les têtards !".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_restart_clears_transcript() {
        let mut rt = TestRuntime::new().build();
        rt.responder.queue_reply("Salut !");

        rt.submit("Bonjour").await;
        rt.wait_until(|s| s.transcript.len() == 2 && s.state == SessionState::Idle)
            .await;

        rt.send(Event::Restart).await;
        rt.wait_until(|s| s.transcript.is_empty()).await;
        rt.settle().await;

        let mut saw_reset = false;
        while let Ok(sequenced) = rt.broadcast_rx.try_recv() {
            if matches!(sequenced.event, SseEvent::Reset) {
                saw_reset = true;
            }
        }
        assert!(saw_reset);
    }

    #[tokio::test]
    async fn test_broadcast_order_for_round_trip() {
        let mut rt = TestRuntime::new().build();
        rt.responder.queue_reply("Salut !");

        rt.submit("Bonjour").await;

        match rt.next_event().await {
            SseEvent::Turn { turn } => assert_eq!(turn.sender, Sender::User),
            other => panic!("Expected user turn, got {other:?}"),
        }
        assert!(matches!(rt.next_event().await, SseEvent::InputChanged { .. }));
        assert!(matches!(
            rt.next_event().await,
            SseEvent::StateChange {
                state: SessionState::Waiting
            }
        ));
        match rt.next_event().await {
            SseEvent::Turn { turn } => assert_eq!(turn.text, "Salut !"),
            other => panic!("Expected assistant turn, got {other:?}"),
        }
        assert!(matches!(
            rt.next_event().await,
            SseEvent::StateChange {
                state: SessionState::Idle
            }
        ));
    }

    /// Integration test: closing with a call in flight drops the late reply
    #[tokio::test]
    async fn test_close_while_in_flight() {
        let rt = TestRuntime::new()
            .responder(DelayedMockResponder::new())
            .build();
        rt.responder.queue_reply("trop tard");

        rt.submit("Bonjour").await;
        rt.responder.request_started.notified().await;

        rt.handle.close();
        tokio::time::timeout(WAIT_TIMEOUT, rt.handle.event_tx.closed())
            .await
            .expect("Runtime did not stop");

        rt.responder.release.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = rt.snapshot();
        assert_eq!(snapshot.state, SessionState::Waiting);
        assert_eq!(snapshot.transcript.len(), 1);
        assert!(rt.handle.send(Event::Restart).await.is_err());
    }

    #[tokio::test]
    async fn test_restart_unsupported_session_keeps_notice() {
        let rt = TestRuntime::new().activity(ActivityKind::Voice).build();

        rt.send(Event::Restart).await;
        let snapshot = rt.settle().await;

        assert_eq!(
            texts(&snapshot),
            vec![(Sender::Assistant, SPEECH_UNSUPPORTED_NOTICE.to_string())]
        );
    }

    #[tokio::test]
    async fn test_events_are_numbered_in_order() {
        let mut rt = TestRuntime::new().build();
        rt.responder.queue_reply("Salut !");
        let start = rt.snapshot().sequence;

        rt.submit("Bonjour").await;
        let mut last = start;
        for _ in 0..5 {
            let sequenced = rt.next_sequenced().await;
            assert_eq!(sequenced.seq, last + 1);
            last = sequenced.seq;
        }

        let snapshot = rt.settle().await;
        // Two more events from the marker input and its restore
        assert_eq!(snapshot.sequence, last + 2);
    }

    /// A stream client that subscribes mid-turn sees every turn exactly
    /// once, either in its initial snapshot or as a later event
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_late_subscribers_see_each_turn_once() {
        use std::sync::atomic::{AtomicBool, Ordering};

        for _ in 0..20 {
            let rt = TestRuntime::new().build();
            rt.responder.queue_reply("Salut !");
            let done = Arc::new(AtomicBool::new(false));

            let watchers: Vec<_> = (0..3)
                .map(|_| {
                    let handle = rt.handle.clone();
                    let done = Arc::clone(&done);
                    tokio::spawn(async move {
                        let mut views = Vec::new();
                        while !done.load(Ordering::Acquire) && views.len() < 200 {
                            views.push(handle.subscribe_with_snapshot());
                            tokio::task::yield_now().await;
                        }
                        views
                    })
                })
                .collect();

            rt.submit("Bonjour").await;
            rt.wait_until(|s| s.transcript.len() == 2 && s.state == SessionState::Idle)
                .await;
            done.store(true, Ordering::Release);
            rt.settle().await;

            for watcher in watchers {
                for (snapshot, mut rx) in watcher.await.unwrap() {
                    let mut turns = snapshot.transcript.len();
                    while let Ok(sequenced) = rx.try_recv() {
                        if sequenced.is_after(snapshot.sequence)
                            && matches!(sequenced.event, SseEvent::Turn { .. })
                        {
                            turns += 1;
                        }
                    }
                    assert_eq!(turns, 2, "view at sequence {}", snapshot.sequence);
                }
            }
        }
    }
}
