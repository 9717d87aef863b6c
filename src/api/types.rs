//! API request and response types

use crate::activity::{ActivityKind, ClientCapabilities};
use crate::responder::ResponderKind;
use serde::{Deserialize, Serialize};

/// Request to open a session for an activity screen
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub activity: ActivityKind,
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    #[serde(default)]
    pub responder: Option<ResponderKind>,
}

/// Request to replace the pending input
#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub text: String,
}

/// Request to submit text
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

/// Key press in the text field
#[derive(Debug, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct KeyRequest {
    pub key: String,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

/// Speech already transcribed by the browser
#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub transcript: String,
}

/// Speech engine error reported by the browser
#[derive(Debug, Deserialize)]
pub struct SpeechErrorRequest {
    pub reason: String,
}

/// Response for queued input events
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Activity catalog entry
#[derive(Debug, Serialize)]
pub struct ActivityInfo {
    pub id: ActivityKind,
    pub title: &'static str,
    pub description: &'static str,
    pub greeting: &'static str,
    pub needs_speech_recognition: bool,
}

impl From<ActivityKind> for ActivityInfo {
    fn from(activity: ActivityKind) -> Self {
        Self {
            id: activity,
            title: activity.title(),
            description: activity.description(),
            greeting: activity.greeting(),
            needs_speech_recognition: activity.needs_speech_recognition(),
        }
    }
}

/// Response for the activity catalog
#[derive(Debug, Serialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<ActivityInfo>,
}

/// Model information with metadata
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub description: String,
    pub context_window: usize,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
