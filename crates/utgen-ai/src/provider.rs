//! The capability every model backend implements.

use std::time::Duration;

use async_trait::async_trait;
use utgen_core::ChatMessage;

use crate::error::{ProviderError, ProviderResult};

/// One stateless completion call: a system prompt plus the full history in,
/// the assistant's text out.
///
/// Providers never retry; [`ChatSession`](crate::ChatSession) decides what
/// to do with a transient error.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> ProviderResult<String>;
}

/// Connection settings shared by the HTTP providers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's public endpoint (tests, proxies).
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: Duration::from_secs(120),
            max_tokens: 4096,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// `<base>/<path>`, with the default base when none is configured.
    pub(crate) fn endpoint(&self, default_base: &str, path: &str) -> String {
        let base = self.base_url.as_deref().unwrap_or(default_base);
        format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub(crate) fn http_client(&self) -> ProviderResult<reqwest::Client> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::InvalidConfig("API key is empty".to_string()));
        }
        reqwest::Client::builder()
            .user_agent(concat!("utgen/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
            .map_err(ProviderError::from)
    }
}

/// Read a response, mapping non-success statuses to [`ProviderError`].
pub(crate) async fn read_body(response: reqwest::Response) -> ProviderResult<String> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        Ok(text)
    } else {
        Err(ProviderError::from_status(status.as_u16(), &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_and_path() {
        let cfg = ProviderConfig::new("k", "m").with_base_url("http://127.0.0.1:9999/");
        assert_eq!(
            cfg.endpoint("https://api.anthropic.com", "/v1/messages"),
            "http://127.0.0.1:9999/v1/messages"
        );

        let cfg = ProviderConfig::new("k", "m");
        assert_eq!(
            cfg.endpoint("https://api.openai.com", "v1/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let cfg = ProviderConfig::new("  ", "m");
        assert!(matches!(cfg.http_client(), Err(ProviderError::InvalidConfig(_))));
    }
}
