//! On-device agent, terminal front end
//!
//! Restores the saved credential, registers the built-in tools and runs an
//! interactive loop on stdin.

mod config;
mod repl;

use std::sync::Arc;

use agent_core::{AuthMode, CredentialStore, Orchestrator};
use agent_runtime::{
    AnthropicGatewayFactory, FileCredentialStore, bootstrap_auth_mode, builtin_registry,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CliConfig;
use crate::repl::Repl;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Logs go to stderr so they don't interleave with the conversation
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = CliConfig::from_env()?;

    let store: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(&config.credentials_path));
    let mut auth = bootstrap_auth_mode(&store, &config.oauth)?;
    if !auth.is_authenticated() {
        if let Some(key) = &config.api_key {
            tracing::info!("Using ANTHROPIC_API_KEY");
            auth = AuthMode::ApiKey(key.clone());
        }
    }

    let tools = builtin_registry(&config.workdir)?;
    tracing::info!(count = tools.len(), workdir = %config.workdir.display(), "Registered tools");

    tracing::info!(model = %config.gateway.model, "Using model");
    let agent = Orchestrator::builder()
        .gateway_factory(Arc::new(AnthropicGatewayFactory::new(config.gateway.clone())))
        .tools(tools)
        .system_prompt(config.system_prompt.clone())
        .max_iterations(config.max_iterations)
        .auth_mode(auth)
        .credential_store(Arc::clone(&store))
        .build()?;

    Repl::new(agent, store).run().await
}
