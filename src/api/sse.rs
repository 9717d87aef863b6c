//! Server-Sent Events support

use crate::runtime::{SequencedEvent, SessionSnapshot, SseEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream.
///
/// `broadcast_rx` must have been subscribed before `snapshot` was read;
/// events already folded into the snapshot are skipped.
pub fn sse_stream(
    snapshot: SessionSnapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<SequencedEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init_seq = snapshot.sequence;
    let init_event = SseEvent::Init {
        snapshot: Box::new(snapshot),
    };
    let init = futures::stream::once(async move { Ok(sse_event_to_axum(init_event, init_seq)) });

    // Lagged messages and events already in the snapshot are skipped
    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(move |result| match result {
        Ok(sequenced) if sequenced.is_after(init_seq) => {
            Some(Ok(sse_event_to_axum(sequenced.event, sequenced.seq)))
        }
        _ => None,
    });

    let combined = init.chain(broadcasts);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn sse_event_to_axum(event: SseEvent, seq: u64) -> Event {
    let (event_type, data) = sse_payload(event);
    Event::default()
        .id(seq.to_string())
        .event(event_type)
        .data(data.to_string())
}

fn sse_payload(event: SseEvent) -> (&'static str, serde_json::Value) {
    match event {
        SseEvent::Init { snapshot } => (
            "init",
            json!({
                "type": "init",
                "session": snapshot
            }),
        ),
        SseEvent::Turn { turn } => (
            "turn",
            json!({
                "type": "turn",
                "turn": turn
            }),
        ),
        SseEvent::StateChange { state } => (
            "state_change",
            json!({
                "type": "state_change",
                "state": state
            }),
        ),
        SseEvent::InputChanged { text } => (
            "input_changed",
            json!({
                "type": "input_changed",
                "text": text
            }),
        ),
        SseEvent::Reset => (
            "reset",
            json!({
                "type": "reset"
            }),
        ),
    }
}
