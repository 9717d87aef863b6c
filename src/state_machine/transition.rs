//! Pure state transition function
//!
//! Given the same session, context and event, `transition` always produces
//! the same result and performs no I/O.

use super::state::{Session, SessionContext, SessionState, FALLBACK_REPLY, MISHEARD_REPLY};
use super::{Effect, Event};
use crate::activity::Capability;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Reasons an event is rejected; the session is left untouched
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A response is still pending")]
    Busy,
    #[error("Input is empty")]
    EmptyInput,
    #[error("Not supported in this environment")]
    Unsupported,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    session: &Session,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let state = session.state;

    match (state, event) {
        // ============================================================
        // Lifecycle
        // ============================================================
        (SessionState::Idle, Event::Start) => {
            Ok(with_capability_notice(TransitionResult::new(SessionState::Idle), context))
        }

        // A fresh transcript explains again why speech is unavailable
        (SessionState::Idle, Event::Restart) => Ok(with_capability_notice(
            TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::ClearTranscript)
                .with_effect(Effect::clear_pending_input()),
            context,
        )),

        (SessionState::Waiting, Event::Restart) => Err(TransitionError::Busy),

        // ============================================================
        // Composition: allowed in every state, never touches the transcript
        // ============================================================
        (_, Event::InputChanged { text }) => {
            Ok(TransitionResult::new(state).with_effect(Effect::set_pending_input(text)))
        }

        (_, Event::SubmitKey { line_break: true }) => {
            let mut text = session.pending_input.clone();
            text.push('\n');
            Ok(TransitionResult::new(state).with_effect(Effect::set_pending_input(text)))
        }

        (_, Event::SubmitKey { line_break: false }) => transition(
            session,
            context,
            Event::Submit {
                text: session.pending_input.clone(),
            },
        ),

        // ============================================================
        // Submission
        // ============================================================
        (SessionState::Waiting, Event::Submit { .. } | Event::SpeechRecognized { .. }) => {
            Err(TransitionError::Busy)
        }

        (SessionState::Idle, Event::Submit { text }) => begin_turn(&text),

        (SessionState::Idle, Event::SpeechRecognized { transcript }) => {
            if context.capability.is_supported() {
                begin_turn(&transcript)
            } else {
                Err(TransitionError::Unsupported)
            }
        }

        (SessionState::Idle, Event::SpeechFailed { .. }) => Ok(TransitionResult::new(
            SessionState::Idle,
        )
        .with_effect(Effect::assistant_turn(MISHEARD_REPLY))),

        (SessionState::Waiting, Event::SpeechFailed { .. }) => Err(TransitionError::Busy),

        // ============================================================
        // Responder completion
        // ============================================================
        (SessionState::Waiting, Event::ResponderReply { text }) => {
            let reply = if text.trim().is_empty() {
                FALLBACK_REPLY.to_string()
            } else {
                text
            };
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::assistant_turn(reply))
                .with_effect(Effect::NotifyStateChange))
        }

        (SessionState::Waiting, Event::ResponderFailed { .. }) => {
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::assistant_turn(FALLBACK_REPLY))
                .with_effect(Effect::NotifyStateChange))
        }

        // ============================================================
        // Invalid
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} in state {}",
            event.kind(),
            state.as_str()
        ))),
    }
}

fn with_capability_notice(
    result: TransitionResult,
    context: &SessionContext,
) -> TransitionResult {
    match &context.capability {
        Capability::Supported => result,
        Capability::Unsupported { notice } => {
            result.with_effect(Effect::assistant_turn(notice.clone()))
        }
    }
}

/// Idle + non-empty text -> Waiting
fn begin_turn(text: &str) -> Result<TransitionResult, TransitionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TransitionError::EmptyInput);
    }

    Ok(TransitionResult::new(SessionState::Waiting)
        .with_effect(Effect::user_turn(text))
        .with_effect(Effect::clear_pending_input())
        .with_effect(Effect::NotifyStateChange)
        .with_effect(Effect::request_response(text)))
}
