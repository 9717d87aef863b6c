//! Session state types

use crate::activity::{ActivityKind, Capability};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Assistant text used whenever the responder fails
pub const FALLBACK_REPLY: &str =
    "Oups ! Je n'arrive pas à répondre pour le moment. Réessaie dans un petit instant !";

/// Assistant text used when the speech engine reports an error
pub const MISHEARD_REPLY: &str = "Je n'ai pas bien entendu. Peux-tu réessayer ?";

// ============================================================================
// Turns
// ============================================================================

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// One message in the transcript; never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub text: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(sender: Sender, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            sender,
            created_at,
        }
    }

    #[cfg(test)]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text, Utc::now())
    }

    #[cfg(test)]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text, Utc::now())
    }
}

/// Append-only ordered history of turns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Drop every turn (session restart)
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

impl FromIterator<Turn> for Transcript {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Turn manager state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionState {
    /// Ready for input, no responder call outstanding
    #[default]
    Idle,

    /// A user turn was appended and its reply has not landed yet
    Waiting,
}

impl SessionState {
    pub fn is_awaiting_response(self) -> bool {
        matches!(self, SessionState::Waiting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Waiting => "waiting",
        }
    }
}

/// Mutable session data owned by the runtime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    pub transcript: Transcript,
    pub pending_input: String,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Immutable configuration of a session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub activity: ActivityKind,
    pub capability: Capability,
    /// Name of the responder strategy serving this session
    pub responder: String,
}

impl SessionContext {
    pub fn new(
        session_id: impl Into<String>,
        activity: ActivityKind,
        capability: Capability,
        responder: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            activity,
            capability,
            responder: responder.into(),
        }
    }
}
