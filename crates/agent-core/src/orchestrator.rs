//! Agent Orchestrator
//!
//! Drives the turn loop for the single active conversation: model call,
//! assistant turn, sequential tool dispatch, tool-result turn, repeat. The
//! loop runs on one background task; observers follow it through
//! [`RunState`] notifications and read-only snapshots.
//!
//! ```text
//!   Idle ──submit──▶ Running ──┬── end of turn / iteration cap ──▶ Idle
//!                              └── gateway / credential error ────▶ Failed
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::{ContentEntry, ConversationLog, DisplayMessage, LogCheckpoint};
use crate::provider::{GatewayFactory, ModelGateway};
use crate::response::{ContentBlock, StopReason, UsageCounters};
use crate::session::{AuthMode, AuthModeKind, Credential, CredentialStore};
use crate::tool::{ToolRegistry, ToolSchema, truncate_output};

/// Gateway calls allowed per submitted message
pub const DEFAULT_MAX_ITERATIONS: usize = 30;

/// Character ceiling for a single tool result
pub const DEFAULT_MAX_TOOL_OUTPUT_CHARS: usize = 80_000;

pub const DEFAULT_SYSTEM_PROMPT: &str = r"You are an assistant running directly on the user's device.

You can act on the device through the tools provided to you: run shell commands,
read and write files, list directories and fetch URLs. Prefer doing the work with
tools over describing how the user could do it. Inspect before you modify, and
keep shell commands non-interactive.

Tool output may be truncated. When you are done, answer with a short summary of
what you did and what you found.";

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt sent with every request
    pub system_prompt: String,

    /// Maximum gateway calls per submit; reaching it stops the run quietly
    pub max_iterations: usize,

    /// Tool results longer than this many characters are cut
    pub max_tool_output_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tool_output_chars: DEFAULT_MAX_TOOL_OUTPUT_CHARS,
        }
    }
}

/// Classification of a failed run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Api { status: u16 },
    MalformedResponse,
    SessionExpired,
    NotAuthenticated,
    Internal,
}

/// Why the last run failed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RunFailure {
    fn from_error(error: &AgentError) -> Self {
        let kind = match error {
            AgentError::Transport(_) | AgentError::Io(_) => FailureKind::Transport,
            AgentError::Api { status, .. } => FailureKind::Api { status: *status },
            AgentError::MalformedResponse(_) | AgentError::Json(_) => {
                FailureKind::MalformedResponse
            }
            AgentError::SessionExpired(_) => FailureKind::SessionExpired,
            AgentError::NotAuthenticated => FailureKind::NotAuthenticated,
            _ => FailureKind::Internal,
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

/// Observable orchestrator state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Failed(RunFailure),
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

struct BoundGateway {
    credential: Credential,
    gateway: Arc<dyn ModelGateway>,
}

struct AuthState {
    mode: AuthMode,
    bound: Option<BoundGateway>,
}

struct Shared {
    config: AgentConfig,
    tools: Arc<ToolRegistry>,
    catalog: Vec<ToolSchema>,
    factory: Arc<dyn GatewayFactory>,
    store: Option<Arc<dyn CredentialStore>>,
    state: watch::Sender<RunState>,
    conversation: RwLock<ConversationLog>,
    display: RwLock<Vec<DisplayMessage>>,
    usage: RwLock<UsageCounters>,
    auth: Mutex<AuthState>,
}

/// Owner of the conversation and driver of the turn loop
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Start a run for `text`.
    ///
    /// Returns once the user turn is recorded; the loop continues in the
    /// background. Rejected while a run is active or no credential is set.
    pub async fn submit(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(AgentError::EmptyInput);
        }
        if !self.shared.auth.lock().await.mode.is_authenticated() {
            return Err(AgentError::NotAuthenticated);
        }

        let mut started = false;
        self.shared.state.send_if_modified(|state| {
            if state.is_running() {
                return false;
            }
            *state = RunState::Running;
            started = true;
            true
        });
        if !started {
            return Err(AgentError::Busy);
        }

        let checkpoint = {
            let mut log = self.shared.conversation.write().await;
            let checkpoint = log.checkpoint();
            log.push_user_text(text);
            checkpoint
        };
        self.shared.display.write().await.push(DisplayMessage::user(text));

        let run_id = Uuid::new_v4();
        let shared = Arc::clone(&self.shared);
        tokio::spawn(
            async move { shared.run(checkpoint).await }
                .instrument(tracing::info_span!("agent_run", %run_id)),
        );

        Ok(())
    }

    pub fn state(&self) -> RunState {
        self.shared.state.borrow().clone()
    }

    /// Receive every state transition
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.shared.state.subscribe()
    }

    /// Wait until no run is active and return the settled state
    pub async fn wait_until_settled(&self) -> RunState {
        let mut rx = self.shared.state.subscribe();
        let settled = rx.wait_for(|state| !state.is_running()).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Snapshot of the conversation log
    pub async fn conversation(&self) -> ConversationLog {
        self.shared.conversation.read().await.clone()
    }

    /// Snapshot of the display messages
    pub async fn display_messages(&self) -> Vec<DisplayMessage> {
        self.shared.display.read().await.clone()
    }

    pub async fn usage(&self) -> UsageCounters {
        *self.shared.usage.read().await
    }

    pub async fn auth_mode(&self) -> AuthModeKind {
        self.shared.auth.lock().await.mode.kind()
    }

    /// Switch authentication mode; the bound gateway is rebuilt on next use
    pub async fn set_auth_mode(&self, mode: AuthMode) {
        let mut auth = self.shared.auth.lock().await;
        tracing::info!(mode = ?mode.kind(), "Switching auth mode");
        auth.mode = mode;
        auth.bound = None;
    }

    /// Drop the active credential and the persisted one
    pub async fn logout(&self) -> Result<()> {
        self.shared.invalidate_auth().await;
        match &self.shared.store {
            Some(store) => store.clear(),
            None => Ok(()),
        }
    }

    /// Full reset of log, display messages and usage
    pub async fn clear_history(&self) -> Result<()> {
        // the worker holds the log across gateway calls
        if self.state().is_running() {
            return Err(AgentError::Busy);
        }
        let mut log = self.shared.conversation.write().await;
        // a submit may have started since the check above
        if !self.shared.settle_idle() {
            return Err(AgentError::Busy);
        }
        log.clear();
        self.shared.display.write().await.clear();
        *self.shared.usage.write().await = UsageCounters::default();
        Ok(())
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.shared.tools
    }

    pub fn config(&self) -> &AgentConfig {
        &self.shared.config
    }
}

impl Shared {
    /// Move to `Idle` unless a run is active; returns whether it did
    fn settle_idle(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_running() {
                return false;
            }
            *state = RunState::Idle;
            true
        })
    }

    async fn run(&self, checkpoint: LogCheckpoint) {
        tracing::info!("Run started");
        match self.turn_loop().await {
            Ok(iterations) => {
                tracing::info!(iterations, "Run finished");
                self.state.send_replace(RunState::Idle);
            }
            Err(error) => self.fail(checkpoint, error).await,
        }
    }

    async fn turn_loop(&self) -> Result<usize> {
        for iteration in 1..=self.config.max_iterations {
            let gateway = self.gateway().await?;

            let response = {
                let log = self.conversation.read().await;
                tracing::debug!(iteration, turns = log.len(), "Calling model");
                gateway
                    .send_turn(&log, &self.config.system_prompt, &self.catalog)
                    .await?
            };
            self.usage.write().await.add(response.usage);

            let mut entries = Vec::with_capacity(response.blocks.len());
            let mut shown = Vec::new();
            let mut saw_tool_use = false;

            for block in &response.blocks {
                match block {
                    ContentBlock::Text { body } => {
                        if !body.trim().is_empty() {
                            shown.push(DisplayMessage::assistant(body.as_str()));
                            entries.push(ContentEntry::Text { text: body.clone() });
                        }
                    }
                    ContentBlock::ToolUse { id, name, arguments } => {
                        saw_tool_use = true;
                        let name = name.clone().unwrap_or_default();
                        let input = arguments.clone().unwrap_or_default();
                        shown.push(DisplayMessage::tool_call(
                            name.as_str(),
                            self.tools.preview(&name, &input),
                        ));
                        entries.push(ContentEntry::ToolUse {
                            id: id.clone(),
                            name,
                            input: Value::Object(input),
                        });
                    }
                    ContentBlock::Other { raw_type, .. } => {
                        tracing::debug!(
                            block_type = %raw_type,
                            "Skipping unrecognized content block"
                        );
                    }
                }
            }

            self.conversation.write().await.push_assistant(entries)?;
            self.display.write().await.extend(shown);

            if !saw_tool_use || response.stop_reason != StopReason::ToolUse {
                tracing::debug!(stop_reason = %response.stop_reason, "Model finished");
                return Ok(iteration);
            }

            let mut results = Vec::new();
            for block in &response.blocks {
                let Some((id, name, arguments)) = block.as_dispatchable() else {
                    continue;
                };
                tracing::debug!(tool = %name, "Dispatching tool");
                let output = self.tools.dispatch(name, arguments).await;

                let (content, truncated) =
                    truncate_output(output.content, self.config.max_tool_output_chars);
                if truncated {
                    tracing::warn!(
                        tool = %name,
                        limit = self.config.max_tool_output_chars,
                        "Tool output truncated"
                    );
                }

                self.display.write().await.push(DisplayMessage::tool_result(
                    name,
                    content.as_str(),
                    output.is_error,
                ));
                results.push(ContentEntry::ToolResult {
                    tool_use_id: id.to_string(),
                    content,
                    is_error: output.is_error,
                });
            }

            if results.is_empty() {
                tracing::debug!("No dispatchable tool calls");
                return Ok(iteration);
            }
            self.conversation.write().await.push_tool_results(results)?;
        }

        tracing::warn!(
            max_iterations = self.config.max_iterations,
            "Iteration cap reached, stopping run"
        );
        Ok(self.config.max_iterations)
    }

    /// Gateway bound to the current credential, rebuilt when it changes
    async fn gateway(&self) -> Result<Arc<dyn ModelGateway>> {
        // a refresh can take a while; don't hold the auth lock across it
        let mode = self.auth.lock().await.mode.clone();
        let credential = match &mode {
            AuthMode::Unauthenticated => return Err(AgentError::NotAuthenticated),
            AuthMode::ApiKey(key) => Credential::ApiKey(key.clone()),
            AuthMode::OAuth(provider) => provider.get_valid_credential().await?,
        };

        let mut auth = self.auth.lock().await;
        if !auth.mode.is_authenticated() {
            return Err(AgentError::NotAuthenticated);
        }
        if let Some(bound) = &auth.bound {
            if bound.credential == credential {
                return Ok(Arc::clone(&bound.gateway));
            }
        }

        tracing::debug!("Binding model gateway to current credential");
        let gateway = self.factory.create(&credential)?;
        auth.bound = Some(BoundGateway {
            credential,
            gateway: Arc::clone(&gateway),
        });
        Ok(gateway)
    }

    async fn invalidate_auth(&self) {
        let mut auth = self.auth.lock().await;
        auth.mode = AuthMode::Unauthenticated;
        auth.bound = None;
    }

    /// Roll the log back to the checkpoint taken at submit.
    ///
    /// Tool rounds completed earlier in the same run are dropped from the log
    /// too, so a retried submit runs them again. Their display messages stay.
    async fn fail(&self, checkpoint: LogCheckpoint, error: AgentError) {
        tracing::warn!(error = %error, "Run failed");

        self.conversation.write().await.restore(checkpoint);

        if error.requires_reauth() {
            self.invalidate_auth().await;
            if let Some(store) = &self.store {
                if let Err(e) = store.clear() {
                    tracing::warn!(error = %e, "Failed to clear stored credential");
                }
            }
        }

        self.display
            .write()
            .await
            .push(DisplayMessage::error(error.user_message()));
        self.state
            .send_replace(RunState::Failed(RunFailure::from_error(&error)));
    }
}

/// Builder for [`Orchestrator`]
pub struct AgentBuilder {
    factory: Option<Arc<dyn GatewayFactory>>,
    tools: ToolRegistry,
    config: AgentConfig,
    auth: AuthMode,
    store: Option<Arc<dyn CredentialStore>>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            factory: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
            auth: AuthMode::Unauthenticated,
            store: None,
        }
    }

    pub fn gateway_factory(mut self, factory: Arc<dyn GatewayFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn max_tool_output_chars(mut self, max: usize) -> Self {
        self.config.max_tool_output_chars = max;
        self
    }

    pub fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth = mode;
        self
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let factory = self
            .factory
            .ok_or_else(|| AgentError::Config("Gateway factory is required".into()))?;
        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        let (state, _) = watch::channel(RunState::Idle);
        let catalog = self.tools.catalog();

        Ok(Orchestrator {
            shared: Arc::new(Shared {
                config: self.config,
                tools: Arc::new(self.tools),
                catalog,
                factory,
                store: self.store,
                state,
                conversation: RwLock::new(ConversationLog::new()),
                display: RwLock::new(Vec::new()),
                usage: RwLock::new(UsageCounters::default()),
                auth: Mutex::new(AuthState {
                    mode: self.auth,
                    bound: None,
                }),
            }),
        })
    }
}
