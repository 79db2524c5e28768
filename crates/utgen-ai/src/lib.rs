//! Model providers and conversation sessions for utgen
//!
//! - [`ChatProvider`]: one completion call against a provider API
//! - [`ChatSession`]: the [`utgen_core::ConversationClient`] the loop talks to
//! - [`AiProvider`]: startup selection between Anthropic and OpenAI

pub mod anthropic;
pub mod error;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod selection;
pub mod session;

pub use anthropic::AnthropicProvider;
pub use error::{ProviderError, ProviderResult};
pub use openai::OpenAiProvider;
pub use provider::{ChatProvider, ProviderConfig};
pub use selection::AiProvider;
pub use session::{ChatSession, SessionConfig};
