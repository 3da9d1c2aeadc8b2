//! OAuth Credential Provider
//!
//! Hands out the cached access token while it is fresh and refreshes it with
//! the refresh-token grant otherwise. A rejected refresh means the user has
//! to log in again and surfaces as `AgentError::SessionExpired`.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    session::{Credential, CredentialProvider, CredentialStore, OAuthTokens, StoredCredential},
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Token endpoint configuration
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    pub token_url: String,

    pub client_id: String,

    /// Refresh this many seconds before the token actually expires
    pub refresh_skew_secs: i64,

    pub timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_url: "https://console.anthropic.com/v1/oauth/token".into(),
            client_id: String::new(),
            refresh_skew_secs: 60,
            timeout_secs: 30,
        }
    }
}

impl OAuthConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token_url: std::env::var("AGENT_OAUTH_TOKEN_URL").unwrap_or(defaults.token_url),
            client_id: std::env::var("AGENT_OAUTH_CLIENT_ID").unwrap_or(defaults.client_id),
            ..defaults
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Credential provider backed by an OAuth token set
pub struct OAuthCredentialProvider {
    name: String,
    http: reqwest::Client,
    config: OAuthConfig,
    tokens: Mutex<OAuthTokens>,
    store: Option<Arc<dyn CredentialStore>>,
}

impl OAuthCredentialProvider {
    pub fn new(name: impl Into<String>, config: OAuthConfig, tokens: OAuthTokens) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            http,
            config,
            tokens: Mutex::new(tokens),
            store: None,
        })
    }

    /// Persist refreshed tokens to `store`
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let response = self
            .http
            .post(&self.config.token_url)
            .json(&RefreshRequest {
                grant_type: "refresh_token",
                refresh_token,
                client_id: &self.config.client_id,
            })
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("token refresh failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(AgentError::SessionExpired(format!(
                "token refresh rejected (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let issued: TokenResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(format!("token response: {e}")))?;

        Ok(OAuthTokens {
            access_token: issued.access_token,
            refresh_token: issued
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            expires_at: Utc::now() + chrono::Duration::seconds(issued.expires_in.unwrap_or(3600)),
        })
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentialProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_valid_credential(&self) -> Result<Credential> {
        let mut tokens = self.tokens.lock().await;
        if tokens.is_fresh(self.config.refresh_skew_secs) {
            return Ok(Credential::Bearer(tokens.access_token.clone()));
        }

        let Some(refresh_token) = tokens.refresh_token.clone() else {
            return Err(AgentError::SessionExpired(
                "access token expired and no refresh token is available".into(),
            ));
        };

        tracing::debug!(provider = %self.name, "Refreshing OAuth access token");
        let refreshed = self.refresh(&refresh_token).await?;

        if let Some(store) = &self.store {
            let stored = StoredCredential::OAuth {
                provider: self.name.clone(),
                tokens: refreshed.clone(),
            };
            if let Err(e) = store.save(&stored) {
                tracing::warn!(error = %e, "Failed to persist refreshed tokens");
            }
        }

        let credential = Credential::Bearer(refreshed.access_token.clone());
        *tokens = refreshed;
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(expires_in_secs: i64, refresh: Option<&str>) -> OAuthTokens {
        OAuthTokens {
            access_token: "access-1".into(),
            refresh_token: refresh.map(str::to_string),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
        }
    }

    fn unreachable_config() -> OAuthConfig {
        OAuthConfig {
            token_url: "http://127.0.0.1:9/token".into(),
            ..OAuthConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_token_needs_no_network() {
        let provider =
            OAuthCredentialProvider::new("anthropic", unreachable_config(), tokens(3600, Some("r")))
                .unwrap();
        let credential = provider.get_valid_credential().await.unwrap();
        assert_eq!(credential, Credential::Bearer("access-1".into()));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let provider =
            OAuthCredentialProvider::new("anthropic", unreachable_config(), tokens(-10, None))
                .unwrap();
        let err = provider.get_valid_credential().await.unwrap_err();
        assert!(matches!(err, AgentError::SessionExpired(_)));
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint_is_transport() {
        let provider =
            OAuthCredentialProvider::new("anthropic", unreachable_config(), tokens(-10, Some("r")))
                .unwrap();
        let err = provider.get_valid_credential().await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
    }
}
