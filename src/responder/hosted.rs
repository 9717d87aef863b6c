//! Hosted chat-completion responder

use super::{Responder, ResponderError};
use crate::llm::{LlmMessage, LlmRequest, LlmService, MessageRole};
use crate::state_machine::{Sender, Turn};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const SYSTEM_PROMPT: &str = r"Tu es Robo, un robot gentil et curieux qui discute avec des enfants de 6 à 10 ans dans une application éducative.
- Réponds toujours en français, avec des phrases courtes et des mots simples.
- Sois encourageant et bienveillant. Pose parfois une petite question pour donner envie d'apprendre.
- Explique les sciences, la nature, l'espace et les animaux avec des comparaisons de la vie de tous les jours.
- Ne parle jamais de sujets violents, effrayants ou réservés aux adultes. Si on te le demande, propose gentiment un autre sujet.
- Ne demande jamais d'informations personnelles (nom de famille, adresse, école).";

const REPLY_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REPLY_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;

/// Responder backed by an `LlmService`
pub struct HostedResponder {
    llm: Arc<dyn LlmService>,
    context_turns: usize,
    name: String,
}

impl HostedResponder {
    pub fn new(llm: Arc<dyn LlmService>, context_turns: usize) -> Self {
        let name = format!("hosted:{}", llm.model_id());
        Self {
            llm,
            context_turns: context_turns.max(1),
            name,
        }
    }

    fn build_request(&self, input: &str, transcript: &[Turn]) -> LlmRequest {
        let skip = transcript.len().saturating_sub(self.context_turns);
        let mut messages: Vec<LlmMessage> = transcript
            .iter()
            .skip(skip)
            .map(|turn| match turn.sender {
                Sender::User => LlmMessage::user(turn.text.as_str()),
                Sender::Assistant => LlmMessage::assistant(turn.text.as_str()),
            })
            .collect();

        // Callers that pass a transcript without the current turn still get it answered
        let answered = messages
            .last()
            .is_some_and(|m| m.role == MessageRole::User && m.text == input);
        if !answered {
            messages.push(LlmMessage::user(input));
        }

        // Chat APIs expect the conversation to open with a user message
        while messages.len() > 1 && messages[0].role != MessageRole::User {
            messages.remove(0);
        }

        LlmRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            messages,
            max_tokens: Some(MAX_REPLY_TOKENS),
            temperature: Some(TEMPERATURE),
        }
    }
}

#[async_trait]
impl Responder for HostedResponder {
    async fn respond(&self, input: &str, transcript: &[Turn]) -> Result<String, ResponderError> {
        let request = self.build_request(input, transcript);

        let response = timeout(REPLY_TIMEOUT, self.llm.complete(&request))
            .await
            .map_err(|_| {
                ResponderError::timeout(format!(
                    "no reply from {} within {}s",
                    self.llm.model_id(),
                    REPLY_TIMEOUT.as_secs()
                ))
            })??;

        if !response.end_turn {
            tracing::debug!(model = self.llm.model_id(), "Completion stopped before the end of the turn");
        }

        let text = response.text.trim();
        if text.is_empty() {
            return Err(ResponderError::empty(format!(
                "{} returned an empty completion",
                self.llm.model_id()
            )));
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
