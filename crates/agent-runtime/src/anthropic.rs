//! Anthropic Messages Gateway
//!
//! Implementation of `ModelGateway` over the Messages API.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::ConversationLog,
    provider::{GatewayFactory, ModelGateway},
    response::ModelResponse,
    session::Credential,
    tool::ToolSchema,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Value of the `anthropic-version` header
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Beta flag required when authenticating with an OAuth access token
pub const OAUTH_BETA: &str = "oauth-2025-04-20";

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// API base URL, without the `/v1/messages` path
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Maximum tokens to generate per response
    pub max_tokens: u32,

    /// `anthropic-version` header value
    pub api_version: String,

    /// Time allowed to establish the connection
    pub connect_timeout_secs: u64,

    /// Time allowed for the whole response; generation can be slow
    pub read_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".into(),
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 8192,
            api_version: ANTHROPIC_VERSION.into(),
            connect_timeout_secs: 30,
            read_timeout_secs: 300,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ANTHROPIC_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("AGENT_MODEL").unwrap_or(defaults.model),
            max_tokens: std::env::var("AGENT_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_tokens),
            ..defaults
        }
    }

    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

/// Request body of `POST /v1/messages`
#[derive(Debug, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub system: &'a str,
    pub messages: &'a ConversationLog,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

/// Gateway bound to a single credential
pub struct AnthropicGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    credential: Credential,
}

impl AnthropicGateway {
    pub fn new(config: GatewayConfig, credential: Credential) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            credential,
        })
    }

    /// Assemble the request body; the log is embedded verbatim
    pub fn request<'a>(
        &'a self,
        log: &'a ConversationLog,
        system_prompt: &'a str,
        catalog: &[ToolSchema],
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: system_prompt,
            messages: log,
            tools: catalog.iter().map(ToolSchema::to_wire).collect(),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            Credential::ApiKey(key) => request.header("x-api-key", key),
            Credential::Bearer(token) => request
                .bearer_auth(token)
                .header("anthropic-beta", OAUTH_BETA),
        }
    }
}

#[async_trait]
impl ModelGateway for AnthropicGateway {
    async fn send_turn(
        &self,
        log: &ConversationLog,
        system_prompt: &str,
        catalog: &[ToolSchema],
    ) -> Result<ModelResponse> {
        let body = self.request(log, system_prompt, catalog);

        let response = self
            .authorize(self.client.post(self.config.messages_url()))
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(AgentError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed = ModelResponse::from_slice(&bytes)?;
        tracing::debug!(
            stop_reason = %parsed.stop_reason,
            blocks = parsed.blocks.len(),
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "Model responded"
        );
        Ok(parsed)
    }
}

fn transport_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() {
        AgentError::Transport(format!("request timed out: {e}"))
    } else {
        AgentError::Transport(e.to_string())
    }
}

/// Builds an [`AnthropicGateway`] for each credential
pub struct AnthropicGatewayFactory {
    config: GatewayConfig,
}

impl AnthropicGatewayFactory {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

impl GatewayFactory for AnthropicGatewayFactory {
    fn create(&self, credential: &Credential) -> Result<Arc<dyn ModelGateway>> {
        Ok(Arc::new(AnthropicGateway::new(
            self.config.clone(),
            credential.clone(),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::message::ContentEntry;
    use agent_core::tool::{DateTimeTool, Tool};
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.read_timeout_secs, 300);
        assert_eq!(config.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_request_embeds_log_verbatim() {
        let gateway =
            AnthropicGateway::new(GatewayConfig::default(), Credential::ApiKey("k".into()))
                .unwrap();

        let mut log = ConversationLog::new();
        log.push_user_text("what time is it?");
        log.push_assistant(vec![ContentEntry::Text { text: "Let me check.".into() }])
            .unwrap();

        let catalog = vec![DateTimeTool.schema()];
        let body = serde_json::to_value(gateway.request(&log, "be brief", &catalog)).unwrap();

        assert_eq!(body["model"], json!("claude-sonnet-4-20250514"));
        assert_eq!(body["max_tokens"], json!(8192));
        assert_eq!(body["system"], json!("be brief"));
        assert_eq!(body["messages"], serde_json::to_value(&log).unwrap());
        assert_eq!(body["tools"][0]["name"], json!("datetime"));
        assert_eq!(body["tools"][0]["input_schema"]["type"], json!("object"));
    }

    #[test]
    fn test_empty_catalog_is_omitted() {
        let gateway =
            AnthropicGateway::new(GatewayConfig::default(), Credential::ApiKey("k".into()))
                .unwrap();
        let log = ConversationLog::new();
        let body = serde_json::to_value(gateway.request(&log, "", &[])).unwrap();
        assert!(body.get("tools").is_none());
    }
}
