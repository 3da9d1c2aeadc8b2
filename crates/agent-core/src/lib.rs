//! # agent-core
//!
//! Conversation orchestration for an on-device agent: the wire model, the
//! model gateway contract, the tool dispatch contract, and the turn loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Orchestrator                          │
//! │  ┌─────────────┐  ┌──────────────┐  ┌───────────────────────┐ │
//! │  │  Turn Loop  │──│ ToolRegistry │  │ ModelGateway          │ │
//! │  │  (1 task)   │  │  (dispatch)  │  │ (bound per credential)│ │
//! │  └─────────────┘  └──────────────┘  └───────────────────────┘ │
//! │         │                                      ▲              │
//! │         ▼                                      │              │
//! │  ConversationLog ── borrowed for serialization─┘              │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ModelGateway` trait keeps the loop independent of the HTTP client;
//! `agent-runtime` provides the concrete gateway, credential providers and
//! built-in tools.

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod response;
pub mod session;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{ContentEntry, ConversationLog, DisplayMessage, Role, Turn, TurnContent};
pub use orchestrator::{AgentBuilder, AgentConfig, FailureKind, Orchestrator, RunFailure, RunState};
pub use provider::{GatewayFactory, ModelGateway};
pub use response::{ContentBlock, ModelResponse, StopReason, TokenUsage, UsageCounters};
pub use session::{
    AuthMode, AuthModeKind, Credential, CredentialProvider, CredentialStore, StoredCredential,
};
pub use tool::{Tool, ToolArguments, ToolOutput, ToolRegistry, ToolSchema};
