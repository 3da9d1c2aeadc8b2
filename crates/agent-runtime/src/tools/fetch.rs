//! URL Fetch Tool

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    tool::{
        ParameterSchema, TRUNCATION_MARKER, Tool, ToolArguments, ToolSchema, required_str,
        truncate_output,
    },
};
use async_trait::async_trait;
use serde_json::Value;

const FETCH_TIMEOUT_SECS: u64 = 30;
const MAX_BODY_CHARS: usize = 50_000;

/// Bytes read off the wire before the rest of the body is abandoned
const MAX_BODY_BYTES: usize = 4 * MAX_BODY_CHARS;

/// Performs an HTTP GET and returns the status and body text
pub struct FetchUrlTool {
    client: reqwest::Client,
}

impl FetchUrlTool {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn check_scheme(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(AgentError::ToolValidation(format!(
            "only http and https URLs are supported: {url}"
        )))
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "fetch_url".into(),
            description: "Fetch a web page or API response over HTTP(S) with a GET request.".into(),
            parameters: vec![ParameterSchema::required("url", "string", "http:// or https:// URL")],
        }
    }

    fn validate(&self, arguments: &ToolArguments) -> Result<()> {
        check_scheme(required_str(arguments, "url")?)
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<String> {
        let url = required_str(arguments, "url")?;
        check_scheme(url)?;

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AgentError::ToolExecution(format!("request failed: {e}")))?;

        let status = response.status();
        let mut bytes = Vec::new();
        let mut cut = false;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AgentError::ToolExecution(format!("failed to read body: {e}")))?
        {
            let room = MAX_BODY_BYTES - bytes.len();
            if chunk.len() > room {
                bytes.extend_from_slice(&chunk[..room]);
                cut = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = String::from_utf8_lossy(&bytes).into_owned();
        let (mut body, truncated) = truncate_output(body, MAX_BODY_CHARS);
        if cut && !truncated {
            body.push_str(TRUNCATION_MARKER);
        }
        Ok(format!("HTTP {}\n\n{body}", status.as_u16()))
    }

    fn preview(&self, arguments: &ToolArguments) -> Option<String> {
        arguments.get("url").and_then(Value::as_str).map(str::to_string)
    }
}
