//! CLI Configuration

use std::path::PathBuf;

use agent_core::orchestrator::{DEFAULT_MAX_ITERATIONS, DEFAULT_SYSTEM_PROMPT};
use agent_runtime::{FileCredentialStore, GatewayConfig, OAuthConfig};
use anyhow::Context;

/// Everything the CLI reads from the environment
#[derive(Clone, Debug)]
pub struct CliConfig {
    /// Directory the file and shell tools operate in
    pub workdir: PathBuf,

    pub system_prompt: String,

    pub max_iterations: usize,

    /// Used when no credential has been persisted
    pub api_key: Option<String>,

    pub credentials_path: PathBuf,

    pub gateway: GatewayConfig,

    pub oauth: OAuthConfig,
}

impl CliConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let workdir = match std::env::var("AGENT_WORKDIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir().context("cannot determine working directory")?,
        };

        let max_iterations = match std::env::var("AGENT_MAX_ITERATIONS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("AGENT_MAX_ITERATIONS is not a number: {raw}"))?,
            Err(_) => DEFAULT_MAX_ITERATIONS,
        };

        Ok(Self {
            workdir,
            system_prompt: std::env::var("AGENT_SYSTEM_PROMPT")
                .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_iterations,
            api_key: std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            credentials_path: FileCredentialStore::default_path(),
            gateway: GatewayConfig::from_env(),
            oauth: OAuthConfig::from_env(),
        })
    }
}
