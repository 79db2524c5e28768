//! Provider selection, done once at startup.

use std::str::FromStr;
use std::sync::Arc;

use utgen_core::ConversationClient;

use crate::anthropic::{self, AnthropicProvider};
use crate::error::{ProviderError, ProviderResult};
use crate::openai::{self, OpenAiProvider};
use crate::provider::{ChatProvider, ProviderConfig};
use crate::session::{ChatSession, SessionConfig};

/// Value of the `--ai` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AiProvider {
    ChatGpt,
    #[default]
    Claude,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatGpt => "chatgpt",
            Self::Claude => "claude",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::ChatGpt => openai::DEFAULT_MODEL,
            Self::Claude => anthropic::DEFAULT_MODEL,
        }
    }

    pub fn build_provider(&self, config: ProviderConfig) -> ProviderResult<Arc<dyn ChatProvider>> {
        Ok(match self {
            Self::ChatGpt => Arc::new(OpenAiProvider::new(config)?),
            Self::Claude => Arc::new(AnthropicProvider::new(config)?),
        })
    }

    /// The conversation client handed to the loop.
    pub fn build_client(
        &self,
        config: ProviderConfig,
        session: SessionConfig,
    ) -> ProviderResult<Arc<dyn ConversationClient>> {
        let provider = self.build_provider(config)?;
        Ok(Arc::new(ChatSession::with_config(provider, session)))
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chatgpt" => Ok(Self::ChatGpt),
            "claude" => Ok(Self::Claude),
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }
}
