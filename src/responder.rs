//! Responder strategies
//!
//! A responder turns the latest user turn into assistant text. Every session
//! gets its own explicitly constructed responder; there is no shared client.

mod hosted;
mod keywords;
mod story;

pub use hosted::HostedResponder;
pub use keywords::KeywordResponder;
pub use story::StoryResponder;

use crate::llm::{LlmError, LlmErrorKind};
use crate::state_machine::Turn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Converts a user turn into an assistant reply
#[async_trait]
pub trait Responder: Send + Sync {
    /// Answer `input`.
    ///
    /// `transcript` is the full session history; its last element is the
    /// user turn carrying `input`.
    async fn respond(&self, input: &str, transcript: &[Turn]) -> Result<String, ResponderError>;

    /// Strategy name for logs and snapshots
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: Responder + ?Sized> Responder for Arc<T> {
    async fn respond(&self, input: &str, transcript: &[Turn]) -> Result<String, ResponderError> {
        (**self).respond(input, transcript).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Responder strategies selectable per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderKind {
    Keywords,
    Story,
    Hosted,
}

impl ResponderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponderKind::Keywords => "keywords",
            ResponderKind::Story => "story",
            ResponderKind::Hosted => "hosted",
        }
    }
}

/// Responder failure with classification
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct ResponderError {
    pub kind: ResponderErrorKind,
    pub message: String,
}

impl ResponderError {
    pub fn new(kind: ResponderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::Empty, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::Timeout, message)
    }
}

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderErrorKind {
    Network,
    Timeout,
    Malformed,
    Empty,
    Unavailable,
}

impl From<LlmError> for ResponderError {
    fn from(e: LlmError) -> Self {
        let kind = match e.kind {
            LlmErrorKind::Network | LlmErrorKind::RateLimit | LlmErrorKind::ServerError => {
                ResponderErrorKind::Network
            }
            LlmErrorKind::Timeout => ResponderErrorKind::Timeout,
            LlmErrorKind::Malformed => ResponderErrorKind::Malformed,
            LlmErrorKind::Auth | LlmErrorKind::InvalidRequest | LlmErrorKind::Unknown => {
                ResponderErrorKind::Unavailable
            }
        };
        Self::new(kind, e.message)
    }
}
