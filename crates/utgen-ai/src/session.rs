//! Conversation registry on top of a [`ChatProvider`].
//!
//! `ChatSession` owns every live conversation and its message history. The
//! loop only ever holds [`ConversationId`]s.
//!
//! History is committed per exchange: the user message and the assistant
//! reply are appended together once the provider answered, so a failed call
//! leaves the conversation exactly as it was.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use utgen_core::extract::extract_test_source;
use utgen_core::{
    ChatMessage, ConversationClient, ConversationError, ConversationId, ConversationResult,
    TestSource, UnitContext,
};

use crate::error::ProviderError;
use crate::prompt::{feedback_prompt, initial_prompt, SYSTEM_PROMPT};
use crate::provider::ChatProvider;

/// Retry policy for transient provider errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Retries after the first call; a call is made at most `max_retries + 1` times.
    pub max_retries: u32,
    /// Rate-limit backoff: `backoff_base * 2^(retry - 1)`.
    pub backoff_base: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}

impl SessionConfig {
    fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

#[derive(Debug)]
struct Conversation {
    context: UnitContext,
    history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy)]
enum Exchange {
    Initial,
    Feedback,
}

impl Exchange {
    fn failure(self, attempts: u32, error: &ProviderError) -> ConversationError {
        let reason = error.to_string();
        match self {
            Self::Initial => ConversationError::GenerationFailed { attempts, reason },
            Self::Feedback => ConversationError::FeedbackFailed { attempts, reason },
        }
    }
}

/// [`ConversationClient`] backed by any [`ChatProvider`].
pub struct ChatSession {
    provider: Arc<dyn ChatProvider>,
    config: SessionConfig,
    conversations: Mutex<HashMap<ConversationId, Conversation>>,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self::with_config(provider, SessionConfig::default())
    }

    pub fn with_config(provider: Arc<dyn ChatProvider>, config: SessionConfig) -> Self {
        Self {
            provider,
            config,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Committed history of a live conversation.
    pub async fn history(&self, id: &ConversationId) -> ConversationResult<Vec<ChatMessage>> {
        let conversations = self.conversations.lock().await;
        conversations
            .get(id)
            .map(|c| c.history.clone())
            .ok_or_else(|| ConversationError::NotFound(id.clone()))
    }

    pub async fn live_conversations(&self) -> usize {
        self.conversations.lock().await.len()
    }

    async fn snapshot(
        &self,
        id: &ConversationId,
    ) -> ConversationResult<(UnitContext, Vec<ChatMessage>)> {
        let conversations = self.conversations.lock().await;
        let conversation = conversations
            .get(id)
            .ok_or_else(|| ConversationError::NotFound(id.clone()))?;
        Ok((conversation.context.clone(), conversation.history.clone()))
    }

    /// Send one user message and commit the exchange on success.
    async fn exchange(
        &self,
        id: &ConversationId,
        kind: Exchange,
        user_message: impl FnOnce(&UnitContext) -> String,
    ) -> ConversationResult<TestSource> {
        let (context, mut pending) = self.snapshot(id).await?;
        pending.push(ChatMessage::user(user_message(&context)));

        let mut attempts = 0;
        let completion = loop {
            attempts += 1;
            let error = match self.provider.complete(SYSTEM_PROMPT, &pending).await {
                Ok(completion) => break completion,
                Err(e) => e,
            };

            if !error.is_transient() || attempts > self.config.max_retries {
                return Err(kind.failure(attempts, &error));
            }
            if matches!(error, ProviderError::ContextLengthExceeded(_)) {
                if !prune_oldest_exchange(&mut pending) {
                    return Err(kind.failure(attempts, &error));
                }
                warn!(
                    provider = self.provider.name(),
                    conversation_id = %id,
                    remaining = pending.len(),
                    "context length exceeded, pruned oldest exchange"
                );
            } else {
                let delay = self.config.backoff(attempts);
                warn!(
                    provider = self.provider.name(),
                    conversation_id = %id,
                    retry = attempts,
                    max_retries = self.config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        };

        let source = extract_test_source(&completion, context.language);
        pending.push(ChatMessage::assistant(completion));

        let mut conversations = self.conversations.lock().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| ConversationError::NotFound(id.clone()))?;
        conversation.history = pending;
        debug!(
            conversation_id = %id,
            messages = conversation.history.len(),
            blocks = source.blocks.len(),
            "exchange committed"
        );
        Ok(source)
    }
}

/// Drop the oldest assistant reply and the user message after it, keeping
/// the initial prompt and the message being sent. Roles keep alternating.
fn prune_oldest_exchange(pending: &mut Vec<ChatMessage>) -> bool {
    if pending.len() < 4 {
        return false;
    }
    pending.drain(1..3);
    true
}

#[async_trait]
impl ConversationClient for ChatSession {
    async fn start_conversation(&self, context: &UnitContext) -> ConversationResult<ConversationId> {
        let id = ConversationId::new();
        self.conversations.lock().await.insert(
            id.clone(),
            Conversation {
                context: context.clone(),
                history: Vec::new(),
            },
        );
        debug!(
            conversation_id = %id,
            provider = self.provider.name(),
            model = self.provider.model(),
            unit = %context.unit.name,
            "conversation started"
        );
        Ok(id)
    }

    async fn generate_initial_tests(&self, id: &ConversationId) -> ConversationResult<TestSource> {
        self.exchange(id, Exchange::Initial, initial_prompt).await
    }

    async fn provide_feedback(
        &self,
        id: &ConversationId,
        feedback: &str,
    ) -> ConversationResult<TestSource> {
        self.exchange(id, Exchange::Feedback, |_| feedback_prompt(feedback))
            .await
    }

    async fn stop_conversation(&self, id: &ConversationId) -> ConversationResult<()> {
        self.conversations
            .lock()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ConversationError::NotFound(id.clone()))
    }
}
