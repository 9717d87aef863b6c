//! Events that can occur in a session

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// First event of every runtime
    Start,
    Restart,

    // User events
    InputChanged {
        text: String,
    },
    Submit {
        text: String,
    },
    SubmitKey {
        /// Modified submit key: insert a line break instead of submitting
        line_break: bool,
    },

    // Speech events, already transcribed by the client
    SpeechRecognized {
        transcript: String,
    },
    SpeechFailed {
        reason: String,
    },

    // Responder events
    ResponderReply {
        text: String,
    },
    ResponderFailed {
        message: String,
    },
}

/// Modifier keys held during a key press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct KeyModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyModifiers {
    pub fn any(self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

impl Event {
    /// Map a raw key press to a submit-key event.
    ///
    /// Only Enter is a submit key; every other key yields `None`.
    pub fn from_key_press(key: &str, modifiers: KeyModifiers) -> Option<Self> {
        if key == "Enter" {
            Some(Event::SubmitKey {
                line_break: modifiers.any(),
            })
        } else {
            None
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::Restart => "restart",
            Event::InputChanged { .. } => "input_changed",
            Event::Submit { .. } => "submit",
            Event::SubmitKey { .. } => "submit_key",
            Event::SpeechRecognized { .. } => "speech_recognized",
            Event::SpeechFailed { .. } => "speech_failed",
            Event::ResponderReply { .. } => "responder_reply",
            Event::ResponderFailed { .. } => "responder_failed",
        }
    }
}
