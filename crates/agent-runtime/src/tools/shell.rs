//! Shell Command Tool

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    tool::{
        ParameterSchema, TRUNCATION_MARKER, Tool, ToolArguments, ToolSchema, required_str,
        truncate_output,
    },
};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_OUTPUT_CHARS: usize = 50_000;

/// Bytes kept per stream; anything past this is drained and dropped
const MAX_STREAM_BYTES: u64 = 4 * MAX_OUTPUT_CHARS as u64;

/// Runs a command through `sh -c` in the working directory
pub struct ShellTool {
    workdir: PathBuf,
}

impl ShellTool {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "run_shell_command".into(),
            description: "Run a shell command and return its stdout, stderr and exit code.".into(),
            parameters: vec![
                ParameterSchema::required("command", "string", "Command line passed to `sh -c`"),
                ParameterSchema::optional(
                    "timeout_secs",
                    "integer",
                    "Seconds before the command is killed (max 600)",
                )
                .with_default(json!(DEFAULT_TIMEOUT_SECS)),
            ],
        }
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<String> {
        let command = required_str(arguments, "command")?;
        let timeout_secs = arguments
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, MAX_TIMEOUT_SECS);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::ToolExecution(format!("failed to start command: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::ToolExecution("stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::ToolExecution("stderr was not captured".into()))?;

        let run = async {
            let (stdout, stderr) = tokio::try_join!(
                read_capped(stdout, MAX_STREAM_BYTES),
                read_capped(stderr, MAX_STREAM_BYTES)
            )?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((stdout, stderr, status))
        };
        let ((stdout, stdout_cut), (stderr, stderr_cut), status) =
            tokio::time::timeout(Duration::from_secs(timeout_secs), run)
                .await
                .map_err(|_| {
                    AgentError::ToolExecution(format!("command timed out after {timeout_secs}s"))
                })??;

        let mut text = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str("[stderr]\n");
            text.push_str(&stderr);
        }
        if !status.success() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            match status.code() {
                Some(code) => text.push_str(&format!("[exit code {code}]")),
                None => text.push_str("[terminated by signal]"),
            }
        }
        if text.is_empty() {
            text.push_str("(no output)");
        }

        let (mut text, truncated) = truncate_output(text, MAX_OUTPUT_CHARS);
        if !truncated && (stdout_cut || stderr_cut) {
            text.push_str(TRUNCATION_MARKER);
        }
        Ok(text)
    }

    fn preview(&self, arguments: &ToolArguments) -> Option<String> {
        arguments
            .get("command")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Keep the first `limit` bytes of `reader`, draining the rest so the child
/// never blocks on a full pipe. The flag reports whether anything was dropped.
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: u64,
) -> std::io::Result<(Vec<u8>, bool)> {
    let mut kept = Vec::new();
    (&mut reader).take(limit).read_to_end(&mut kept).await?;
    let dropped = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok((kept, dropped > 0))
}
