//! Activity screens and client capability detection

use serde::{Deserialize, Serialize};

/// Notice shown once when the browser cannot recognize speech
pub const SPEECH_UNSUPPORTED_NOTICE: &str =
    "Ton navigateur ne prend pas en charge la reconnaissance vocale. Essaie avec Chrome ou Edge !";

/// The conversational activity screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Chat,
    Voice,
    Story,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 3] = [ActivityKind::Chat, ActivityKind::Voice, ActivityKind::Story];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Chat => "chat",
            ActivityKind::Voice => "voice",
            ActivityKind::Story => "story",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ActivityKind::Chat => "Discute avec Robo",
            ActivityKind::Voice => "Assistant vocal",
            ActivityKind::Story => "Histoires interactives",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ActivityKind::Chat => "Écris-moi une question et je te répondrai !",
            ActivityKind::Voice => "Pose-moi des questions et je te répondrai !",
            ActivityKind::Story => "Écoute des histoires et influence l'intrigue !",
        }
    }

    /// Shown by the screen on mount; never part of the transcript
    pub fn greeting(self) -> &'static str {
        match self {
            ActivityKind::Chat => {
                "Salut ! Je suis Robo, ton compagnon d'exploration. Que veux-tu savoir ?"
            }
            ActivityKind::Voice => "Salut ! Je suis ton assistant. Parle-moi et je te répondrai !",
            ActivityKind::Story => {
                "Je peux te raconter une histoire et tu pourras choisir ce qui se passe ensuite !"
            }
        }
    }

    /// Whether the screen's primary input is the microphone
    pub fn needs_speech_recognition(self) -> bool {
        matches!(self, ActivityKind::Voice)
    }
}

/// Browser features reported by the client when a screen mounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(default)]
    pub speech_recognition: bool,
}

/// Outcome of the one-time capability check for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Capability {
    Supported,
    Unsupported { notice: String },
}

impl Capability {
    /// Decide once, at session start, whether the activity can run as designed
    pub fn detect(activity: ActivityKind, client: ClientCapabilities) -> Self {
        if activity.needs_speech_recognition() && !client.speech_recognition {
            Capability::Unsupported {
                notice: SPEECH_UNSUPPORTED_NOTICE.to_string(),
            }
        } else {
            Capability::Supported
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported)
    }
}
