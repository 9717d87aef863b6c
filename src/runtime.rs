//! Session runtimes
//!
//! One tokio task per session owns its `Session` and processes events in
//! order. The manager maps session ids to handles.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;

use crate::activity::{ActivityKind, Capability, ClientCapabilities};
use crate::config::ServerConfig;
use crate::llm::ModelRegistry;
use crate::responder::{
    HostedResponder, KeywordResponder, Responder, ResponderKind, StoryResponder,
};
use crate::state_machine::{Event, Session, SessionContext, SessionState, Transcript, Turn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Point-in-time view of a session, published after every event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub activity: ActivityKind,
    pub greeting: String,
    pub state: SessionState,
    /// True while a reply is pending; drives the typing indicator
    pub awaiting_response: bool,
    pub transcript: Transcript,
    pub pending_input: String,
    pub capability: Capability,
    pub responder: String,
    /// Sequence number of the last event folded into this snapshot
    pub sequence: u64,
}

impl SessionSnapshot {
    pub fn new(context: &SessionContext, session: &Session, sequence: u64) -> Self {
        Self {
            id: context.session_id.clone(),
            activity: context.activity,
            greeting: context.activity.greeting().to_string(),
            state: session.state,
            awaiting_response: session.state.is_awaiting_response(),
            transcript: session.transcript.clone(),
            pending_input: session.pending_input.clone(),
            capability: context.capability.clone(),
            responder: context.responder.clone(),
            sequence,
        }
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { snapshot: Box<SessionSnapshot> },
    Turn { turn: Turn },
    StateChange { state: SessionState },
    InputChanged { text: String },
    Reset,
}

/// A broadcast event tagged with its position in the session's stream
#[derive(Debug, Clone)]
pub struct SequencedEvent {
    pub seq: u64,
    pub event: SseEvent,
}

impl SequencedEvent {
    /// Whether a snapshot at `sequence` was taken before this event was applied
    pub fn is_after(&self, sequence: u64) -> bool {
        self.seq > sequence
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Responder unavailable: {0}")]
    ResponderUnavailable(String),
    #[error("Too many open sessions (limit {0})")]
    TooManySessions(usize),
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SequencedEvent>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Queue an event; fails only when the runtime has stopped
    pub async fn send(&self, event: Event) -> Result<(), RuntimeError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| RuntimeError::NotFound(self.id.clone()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SequencedEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Subscribe, then read the snapshot.
    ///
    /// The runtime publishes a snapshot before broadcasting the events it
    /// covers, so every change is either in the snapshot or received on the
    /// channel. Events may be in both; drop those not `is_after` the snapshot.
    pub fn subscribe_with_snapshot(
        &self,
    ) -> (SessionSnapshot, broadcast::Receiver<SequencedEvent>) {
        let rx = self.subscribe();
        (self.snapshot(), rx)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Stop the runtime; a reply still in flight is dropped
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// True once the runtime was closed or discarded itself for idleness
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.event_tx.is_closed()
    }
}

/// Start a runtime task for `context` and return its handle.
///
/// The `Start` event is applied before the task is spawned, so the returned
/// snapshot already carries any start-up notice. A runtime that sees no
/// event for `idle_timeout` while nobody is subscribed stops on its own.
pub fn spawn_session<R: Responder + 'static>(
    context: SessionContext,
    responder: R,
    idle_timeout: Duration,
) -> SessionHandle {
    let (event_tx, event_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(128);
    let cancel = CancellationToken::new();
    let id = context.session_id.clone();

    let mut runtime = SessionRuntime::new(
        context,
        responder,
        event_rx,
        event_tx.clone(),
        broadcast_tx.clone(),
        cancel.clone(),
        idle_timeout,
    );
    runtime.process_event(Event::Start);
    let snapshot_rx = runtime.snapshots();

    tokio::spawn(runtime.run());

    SessionHandle {
        id,
        event_tx,
        broadcast_tx,
        snapshot_rx,
        cancel,
    }
}

/// Manager for all session runtimes
pub struct RuntimeManager {
    llm_registry: Arc<ModelRegistry>,
    config: ServerConfig,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl RuntimeManager {
    pub fn new(llm_registry: Arc<ModelRegistry>, config: ServerConfig) -> Self {
        Self {
            llm_registry,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Responder used when the client does not ask for one
    pub fn default_responder(&self, activity: ActivityKind) -> ResponderKind {
        match activity {
            ActivityKind::Chat if self.llm_registry.has_models() => ResponderKind::Hosted,
            ActivityKind::Chat | ActivityKind::Voice => ResponderKind::Keywords,
            ActivityKind::Story => ResponderKind::Story,
        }
    }

    fn build_responder(&self, kind: ResponderKind) -> Result<Arc<dyn Responder>, RuntimeError> {
        Ok(match kind {
            ResponderKind::Keywords => Arc::new(KeywordResponder::educational()),
            ResponderKind::Story => Arc::new(StoryResponder::robot()),
            ResponderKind::Hosted => {
                let llm = self.llm_registry.default().ok_or_else(|| {
                    RuntimeError::ResponderUnavailable(
                        "no hosted model configured; set OPENAI_API_KEY or LLM_GATEWAY".to_string(),
                    )
                })?;
                Arc::new(HostedResponder::new(llm, self.config.context_turns))
            }
        })
    }

    /// Open a session for an activity screen
    pub async fn create_session(
        &self,
        activity: ActivityKind,
        client: ClientCapabilities,
        requested: Option<ResponderKind>,
    ) -> Result<SessionSnapshot, RuntimeError> {
        let kind = requested.unwrap_or_else(|| self.default_responder(activity));
        let responder = self.build_responder(kind)?;
        let capability = Capability::detect(activity, client);

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, handle| !handle.is_stopped());
        if sessions.len() >= self.config.max_sessions {
            tracing::warn!(limit = self.config.max_sessions, "Session limit reached");
            return Err(RuntimeError::TooManySessions(self.config.max_sessions));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let context = SessionContext::new(&id, activity, capability, responder.name());

        tracing::info!(
            session_id = %id,
            activity = activity.as_str(),
            kind = kind.as_str(),
            responder = responder.name(),
            supported = context.capability.is_supported(),
            open_sessions = sessions.len() + 1,
            "Session created"
        );

        let handle = spawn_session(context, responder, self.config.idle_timeout);
        let snapshot = handle.snapshot();
        sessions.insert(id, handle);

        Ok(snapshot)
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle, RuntimeError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .filter(|handle| !handle.is_stopped())
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(session_id.to_string()))
    }

    /// Send an event to a session
    pub async fn send_event(&self, session_id: &str, event: Event) -> Result<(), RuntimeError> {
        tracing::debug!(session_id = %session_id, event = event.kind(), "Queueing event");
        self.get(session_id).await?.send(event).await
    }

    /// Subscribe to session updates
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(SessionSnapshot, broadcast::Receiver<SequencedEvent>), RuntimeError> {
        Ok(self.get(session_id).await?.subscribe_with_snapshot())
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, RuntimeError> {
        Ok(self.get(session_id).await?.snapshot())
    }

    /// Discard a session; its runtime stops and late replies are dropped
    pub async fn close(&self, session_id: &str) -> Result<(), RuntimeError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| RuntimeError::NotFound(session_id.to_string()))?;
        handle.close();
        tracing::info!(session_id = %session_id, "Session closed");
        Ok(())
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|handle| !handle.is_stopped())
            .count()
    }
}
