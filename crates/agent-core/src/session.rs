//! Session Authentication
//!
//! The active authentication mode, the credential contract the orchestrator
//! consumes, and the persisted credential consulted at start-up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::error::{AgentError, Result};

/// A credential the model gateway can authenticate with
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Sent as an API key header
    ApiKey(String),
    /// Sent as an `Authorization: Bearer` header
    Bearer(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credential::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Supplies a valid bearer credential on demand
///
/// May refresh over the network. Fails with [`AgentError::SessionExpired`]
/// when no silent refresh is possible, and with [`AgentError::Transport`] for
/// transient network failures.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Human-readable provider name, e.g. "anthropic"
    fn name(&self) -> &str;

    async fn get_valid_credential(&self) -> Result<Credential>;
}

/// Active authentication mode
#[derive(Clone, Default)]
pub enum AuthMode {
    #[default]
    Unauthenticated,
    ApiKey(String),
    OAuth(Arc<dyn CredentialProvider>),
}

impl AuthMode {
    pub fn kind(&self) -> AuthModeKind {
        match self {
            AuthMode::Unauthenticated => AuthModeKind::Unauthenticated,
            AuthMode::ApiKey(_) => AuthModeKind::ApiKey,
            AuthMode::OAuth(provider) => AuthModeKind::OAuth(provider.name().to_string()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthMode::Unauthenticated)
    }
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.kind())
    }
}

/// Secret-free view of [`AuthMode`] for observers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthModeKind {
    Unauthenticated,
    ApiKey,
    OAuth(String),
}

/// OAuth token set as issued by the token endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Whether the access token is still usable `skew_secs` from now
    pub fn is_fresh(&self, skew_secs: i64) -> bool {
        self.expires_at - chrono::Duration::seconds(skew_secs) > Utc::now()
    }
}

/// Credential persisted between runs of the app
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredCredential {
    ApiKey { key: String },
    OAuth { provider: String, tokens: OAuthTokens },
}

/// Credential store trait for persistence
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredCredential>>;

    fn save(&self, credential: &StoredCredential) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// In-memory credential store (for development/testing)
#[derive(Default)]
pub struct MemoryCredentialStore {
    credential: RwLock<Option<StoredCredential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: StoredCredential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
        }
    }
}

fn poisoned<T>(_: T) -> AgentError {
    AgentError::Credential("credential store lock poisoned".into())
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<StoredCredential>> {
        Ok(self.credential.read().map_err(poisoned)?.clone())
    }

    fn save(&self, credential: &StoredCredential) -> Result<()> {
        *self.credential.write().map_err(poisoned)? = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.credential.write().map_err(poisoned)? = None;
        Ok(())
    }
}
