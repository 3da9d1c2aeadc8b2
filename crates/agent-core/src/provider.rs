//! Model Gateway Abstraction
//!
//! The orchestrator talks to the model exclusively through [`ModelGateway`].
//! A gateway is bound to one credential; [`GatewayFactory`] builds a new one
//! whenever the active credential changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GatewayFactory, ModelGateway};
//!
//! let gateway = factory.create(&Credential::ApiKey(key))?;
//! let response = gateway.send_turn(&log, system_prompt, &catalog).await?;
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::message::ConversationLog;
use crate::response::ModelResponse;
use crate::session::Credential;
use crate::tool::ToolSchema;

/// Stateless request/response client for the model endpoint
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send the whole conversation and return the parsed response.
    ///
    /// The log is borrowed for serialization only. Non-2xx answers fail with
    /// `AgentError::Api`, network failures with `AgentError::Transport`, and
    /// responses missing required fields with `AgentError::MalformedResponse`.
    async fn send_turn(
        &self,
        log: &ConversationLog,
        system_prompt: &str,
        catalog: &[ToolSchema],
    ) -> Result<ModelResponse>;
}

/// Builds a gateway bound to a credential
pub trait GatewayFactory: Send + Sync {
    fn create(&self, credential: &Credential) -> Result<Arc<dyn ModelGateway>>;
}
