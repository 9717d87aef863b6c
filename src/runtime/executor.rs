//! Session runtime executor

use super::{SequencedEvent, SessionSnapshot, SseEvent};
use crate::responder::Responder;
use crate::state_machine::{transition, Effect, Event, Session, SessionContext, Turn};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runtime for one session, generic over its responder
pub struct SessionRuntime<R: Responder + 'static> {
    context: SessionContext,
    session: Session,
    responder: Arc<R>,
    event_rx: mpsc::Receiver<Event>,
    /// Cloned into responder tasks so replies come back as events
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SequencedEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Sequence number of the last broadcast event
    sequence: u64,
    cancel: CancellationToken,
    idle_timeout: Duration,
}

impl<R: Responder + 'static> SessionRuntime<R> {
    pub fn new(
        context: SessionContext,
        responder: R,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SequencedEvent>,
        cancel: CancellationToken,
        idle_timeout: Duration,
    ) -> Self {
        let session = Session::new();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::new(&context, &session, 0));
        Self {
            context,
            session,
            responder: Arc::new(responder),
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
            sequence: 0,
            cancel,
            idle_timeout,
        }
    }

    /// Receiver of the snapshot published after every event
    pub fn snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting session runtime");

        let idle = tokio::time::sleep(self.idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                event = self.event_rx.recv() => match event {
                    Some(event) => {
                        self.process_event(event);
                        idle.as_mut().reset(Instant::now() + self.idle_timeout);
                    }
                    None => break,
                },
                () = &mut idle => {
                    if self.broadcast_tx.receiver_count() == 0 {
                        tracing::info!(
                            session_id = %self.context.session_id,
                            idle_secs = self.idle_timeout.as_secs(),
                            "Session idle with no subscribers, discarding"
                        );
                        self.cancel.cancel();
                        break;
                    }
                    idle.as_mut().reset(Instant::now() + self.idle_timeout);
                }
            }
        }

        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    /// Apply one event. Rejected events leave the session untouched.
    ///
    /// The new snapshot is published before its events are broadcast, so a
    /// subscriber that reads the snapshot after subscribing misses nothing.
    pub fn process_event(&mut self, event: Event) {
        let kind = event.kind();

        let result = match transition(&self.session, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(
                    session_id = %self.context.session_id,
                    event = kind,
                    state = self.session.state.as_str(),
                    reason = %e,
                    "Event rejected"
                );
                return;
            }
        };

        self.session.state = result.new_state;
        let events: Vec<SseEvent> = result
            .effects
            .into_iter()
            .filter_map(|effect| self.execute_effect(effect))
            .collect();

        let first_seq = self.sequence + 1;
        self.sequence += events.len() as u64;
        self.snapshot_tx.send_replace(SessionSnapshot::new(
            &self.context,
            &self.session,
            self.sequence,
        ));

        for (seq, event) in (first_seq..).zip(events) {
            let _ = self.broadcast_tx.send(SequencedEvent { seq, event });
        }
    }

    /// Apply an effect and return the event clients should see, if any
    fn execute_effect(&mut self, effect: Effect) -> Option<SseEvent> {
        match effect {
            Effect::AppendTurn { sender, text } => {
                let turn = Turn::new(sender, text, Utc::now());
                self.session.transcript.push(turn.clone());
                Some(SseEvent::Turn { turn })
            }

            Effect::SetPendingInput { text } => {
                self.session.pending_input.clone_from(&text);
                Some(SseEvent::InputChanged { text })
            }

            Effect::ClearTranscript => {
                self.session.transcript.clear();
                Some(SseEvent::Reset)
            }

            Effect::RequestResponse { input } => {
                self.spawn_responder(input);
                None
            }

            Effect::NotifyStateChange => Some(SseEvent::StateChange {
                state: self.session.state,
            }),
        }
    }

    /// Call the responder in a background task; the outcome comes back
    /// through the event queue
    fn spawn_responder(&self, input: String) {
        let responder = Arc::clone(&self.responder);
        let event_tx = self.event_tx.clone();
        let transcript = self.session.transcript.turns().to_vec();
        let session_id = self.context.session_id.clone();

        tokio::spawn(async move {
            let start = std::time::Instant::now();
            let event = match responder.respond(&input, &transcript).await {
                Ok(text) => {
                    tracing::debug!(
                        session_id = %session_id,
                        responder = responder.name(),
                        duration_ms = %start.elapsed().as_millis(),
                        "Responder replied"
                    );
                    Event::ResponderReply { text }
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        responder = responder.name(),
                        kind = ?e.kind,
                        error = %e.message,
                        "Responder failed, using fallback reply"
                    );
                    Event::ResponderFailed {
                        message: e.to_string(),
                    }
                }
            };

            if event_tx.send(event).await.is_err() {
                tracing::debug!(session_id = %session_id, "Session closed, dropping reply");
            }
        });
    }
}
