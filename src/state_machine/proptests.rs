//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::activity::{ActivityKind, Capability};
use chrono::{DateTime, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn test_context() -> SessionContext {
    SessionContext::new("test-session", ActivityKind::Chat, Capability::Supported, "mock")
}

/// Apply effects the way the runtime does, with a fixed clock
fn apply(session: &mut Session, result: TransitionResult) -> Vec<String> {
    let mut requests = Vec::new();
    session.state = result.new_state;
    for effect in result.effects {
        match effect {
            Effect::AppendTurn { sender, text } => {
                session
                    .transcript
                    .push(Turn::new(sender, text, epoch()));
            }
            Effect::SetPendingInput { text } => session.pending_input = text,
            Effect::ClearTranscript => session.transcript.clear(),
            Effect::RequestResponse { input } => requests.push(input),
            Effect::NotifyStateChange => {}
        }
    }
    requests
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_blank() -> impl Strategy<Value = String> {
    "[ \t\n]{0,6}"
}

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z !?]{0,30}"
}

fn arb_state() -> impl Strategy<Value = SessionState> {
    prop_oneof![Just(SessionState::Idle), Just(SessionState::Waiting)]
}

fn arb_session() -> impl Strategy<Value = Session> {
    (
        arb_state(),
        proptest::collection::vec(arb_text(), 0..6),
        "[a-z \n]{0,20}",
    )
        .prop_map(|(state, texts, pending_input)| Session {
            state,
            transcript: texts
                .into_iter()
                .enumerate()
                .map(|(i, text)| {
                    let sender = if i % 2 == 0 {
                        Sender::User
                    } else {
                        Sender::Assistant
                    };
                    Turn::new(sender, text, epoch())
                })
                .collect(),
            pending_input,
        })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Start),
        Just(Event::Restart),
        arb_text().prop_map(|text| Event::InputChanged { text }),
        arb_text().prop_map(|text| Event::Submit { text }),
        any::<bool>().prop_map(|line_break| Event::SubmitKey { line_break }),
        arb_text().prop_map(|transcript| Event::SpeechRecognized { transcript }),
        arb_text().prop_map(|reason| Event::SpeechFailed { reason }),
        arb_text().prop_map(|text| Event::ResponderReply { text }),
        arb_text().prop_map(|message| Event::ResponderFailed { message }),
    ]
}

/// Outcome of one round trip driven by the test
#[derive(Debug, Clone)]
enum Outcome {
    Reply(String),
    Failure(String),
}

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        arb_text().prop_map(Outcome::Reply),
        arb_text().prop_map(Outcome::Failure),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // N round trips produce 2N strictly alternating turns starting with the user
    #[test]
    fn prop_round_trips_alternate(rounds in proptest::collection::vec((arb_text(), arb_outcome()), 1..10)) {
        let ctx = test_context();
        let mut session = Session::new();

        for (text, outcome) in &rounds {
            let result = transition(&session, &ctx, Event::Submit { text: text.clone() }).unwrap();
            let requests = apply(&mut session, result);
            prop_assert_eq!(requests.len(), 1);

            let event = match outcome {
                Outcome::Reply(text) => Event::ResponderReply { text: text.clone() },
                Outcome::Failure(message) => Event::ResponderFailed { message: message.clone() },
            };
            let result = transition(&session, &ctx, event).unwrap();
            apply(&mut session, result);
            prop_assert_eq!(session.state, SessionState::Idle);
        }

        prop_assert_eq!(session.transcript.len(), rounds.len() * 2);
        for (i, turn) in session.transcript.turns().iter().enumerate() {
            let expected = if i % 2 == 0 { Sender::User } else { Sender::Assistant };
            prop_assert_eq!(turn.sender, expected);
        }
    }

    // Submitting while waiting never appends a turn or changes state
    #[test]
    fn prop_waiting_rejects_submissions(session in arb_session(), text in arb_text()) {
        let session = Session { state: SessionState::Waiting, ..session };

        for event in [
            Event::Submit { text: text.clone() },
            Event::SpeechRecognized { transcript: text.clone() },
            Event::SubmitKey { line_break: false },
        ] {
            let result = transition(&session, &test_context(), event);
            prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
        }
    }

    // Blank submissions never append a turn
    #[test]
    fn prop_blank_submit_rejected(session in arb_session(), blank in arb_blank()) {
        let result = transition(&session, &test_context(), Event::Submit { text: blank });
        prop_assert!(result.is_err());
    }

    // A failed responder call yields exactly one fallback turn and returns to Idle
    #[test]
    fn prop_failure_yields_single_fallback(text in arb_text(), message in arb_text()) {
        let ctx = test_context();
        let mut session = Session::new();

        let result = transition(&session, &ctx, Event::Submit { text }).unwrap();
        apply(&mut session, result);
        let result = transition(&session, &ctx, Event::ResponderFailed { message }).unwrap();
        apply(&mut session, result);

        prop_assert_eq!(session.transcript.len(), 2);
        prop_assert_eq!(session.state, SessionState::Idle);
        let last = session.transcript.last().unwrap();
        prop_assert_eq!(last.sender, Sender::Assistant);
        prop_assert_eq!(last.text.as_str(), FALLBACK_REPLY);
    }

    // Editing the pending input never touches the transcript
    #[test]
    fn prop_input_changes_leave_transcript(session in arb_session(), edits in proptest::collection::vec(arb_text(), 1..8)) {
        let mut current = session.clone();
        for text in edits {
            let result = transition(&current, &test_context(), Event::InputChanged { text }).unwrap();
            apply(&mut current, result);
        }
        prop_assert_eq!(current.transcript, session.transcript);
        prop_assert_eq!(current.state, session.state);
    }

    // A responder call is requested exactly when entering Waiting
    #[test]
    fn prop_request_iff_entering_waiting(session in arb_session(), event in arb_event()) {
        if let Ok(result) = transition(&session, &test_context(), event) {
            let entered_waiting = session.state == SessionState::Idle
                && result.new_state == SessionState::Waiting;
            let requests = result
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::RequestResponse { .. }))
                .count();
            prop_assert_eq!(requests, usize::from(entered_waiting));
        }
    }

    // State changes always notify clients
    #[test]
    fn prop_state_changes_notify(session in arb_session(), event in arb_event()) {
        if let Ok(result) = transition(&session, &test_context(), event) {
            if result.new_state != session.state {
                prop_assert!(
                    result.effects.iter().any(|e| matches!(e, Effect::NotifyStateChange)),
                    "State changed but no NotifyStateChange effect: {:?} -> {:?}",
                    session.state,
                    result.new_state
                );
            }
        }
    }

    // Every accepted event appends at most one turn
    #[test]
    fn prop_at_most_one_turn_per_event(session in arb_session(), event in arb_event()) {
        if let Ok(result) = transition(&session, &test_context(), event) {
            let appended = result
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::AppendTurn { .. }))
                .count();
            prop_assert!(appended <= 1);
        }
    }
}
