//! # agent-runtime
//!
//! Host integrations for `agent-core`.
//!
//! - **anthropic**: `ModelGateway` over the Anthropic Messages API
//! - **oauth**: refreshing `CredentialProvider` for OAuth sign-in
//! - **store**: credential persistence and start-up restore
//! - **tools**: shell, file system, fetch and clock tools
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{AnthropicGatewayFactory, GatewayConfig, builtin_registry};
//!
//! let agent = Orchestrator::builder()
//!     .gateway_factory(Arc::new(AnthropicGatewayFactory::new(GatewayConfig::from_env())))
//!     .tools(builtin_registry(workdir)?)
//!     .auth_mode(AuthMode::ApiKey(key))
//!     .build()?;
//! ```

pub mod anthropic;
pub mod oauth;
pub mod store;
pub mod tools;

pub use anthropic::{AnthropicGateway, AnthropicGatewayFactory, GatewayConfig};
pub use oauth::{OAuthConfig, OAuthCredentialProvider};
pub use store::{FileCredentialStore, bootstrap_auth_mode};
pub use tools::builtin_registry;

// Re-export core types for convenience
pub use agent_core::{
    AgentError, AuthMode, CredentialStore, Orchestrator, Result, RunState, StoredCredential,
    ToolRegistry,
};
