//! Effects produced by state transitions

use super::state::Sender;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a turn to the transcript and notify clients
    AppendTurn { sender: Sender, text: String },

    /// Replace the pending input
    SetPendingInput { text: String },

    /// Drop every turn of the transcript
    ClearTranscript,

    /// Call the responder in the background
    RequestResponse { input: String },

    /// Notify clients of the new state
    NotifyStateChange,
}

impl Effect {
    pub fn user_turn(text: impl Into<String>) -> Self {
        Effect::AppendTurn {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn assistant_turn(text: impl Into<String>) -> Self {
        Effect::AppendTurn {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }

    pub fn set_pending_input(text: impl Into<String>) -> Self {
        Effect::SetPendingInput { text: text.into() }
    }

    pub fn clear_pending_input() -> Self {
        Effect::SetPendingInput {
            text: String::new(),
        }
    }

    pub fn request_response(input: impl Into<String>) -> Self {
        Effect::RequestResponse {
            input: input.into(),
        }
    }
}
