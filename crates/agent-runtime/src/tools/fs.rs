//! File System Tools

use std::path::PathBuf;

use agent_core::{
    error::{AgentError, Result},
    tool::{ParameterSchema, Tool, ToolArguments, ToolSchema, required_str},
};
use async_trait::async_trait;
use serde_json::Value;

use super::resolve_path;

const MAX_READ_BYTES: u64 = 1024 * 1024;
const MAX_LISTING_ENTRIES: usize = 1000;

fn path_preview(arguments: &ToolArguments) -> Option<String> {
    arguments.get("path").and_then(Value::as_str).map(str::to_string)
}

fn path_error(action: &str, path: &std::path::Path, e: std::io::Error) -> AgentError {
    AgentError::ToolExecution(format!("cannot {action} {}: {e}", path.display()))
}

/// Reads a UTF-8 text file
pub struct ReadFileTool {
    workdir: PathBuf,
}

impl ReadFileTool {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "read_file".into(),
            description: "Read a UTF-8 text file (up to 1 MiB).".into(),
            parameters: vec![ParameterSchema::required(
                "path",
                "string",
                "File path, relative to the working directory or absolute",
            )],
        }
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<String> {
        let path = resolve_path(&self.workdir, required_str(arguments, "path")?);

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| path_error("read", &path, e))?;
        if metadata.is_dir() {
            return Err(AgentError::ToolExecution(format!(
                "{} is a directory",
                path.display()
            )));
        }
        if metadata.len() > MAX_READ_BYTES {
            return Err(AgentError::ToolExecution(format!(
                "{} is {} bytes, larger than the {MAX_READ_BYTES} byte limit",
                path.display(),
                metadata.len()
            )));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| path_error("read", &path, e))?;
        String::from_utf8(bytes).map_err(|_| {
            AgentError::ToolExecution(format!("{} is not valid UTF-8 text", path.display()))
        })
    }

    fn preview(&self, arguments: &ToolArguments) -> Option<String> {
        path_preview(arguments)
    }
}

/// Creates or overwrites a file
pub struct WriteFileTool {
    workdir: PathBuf,
}

impl WriteFileTool {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "write_file".into(),
            description: "Write text to a file, creating parent directories and replacing any \
                          existing content."
                .into(),
            parameters: vec![
                ParameterSchema::required(
                    "path",
                    "string",
                    "File path, relative to the working directory or absolute",
                ),
                ParameterSchema::required("content", "string", "Full file content"),
            ],
        }
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<String> {
        let path = resolve_path(&self.workdir, required_str(arguments, "path")?);
        let content = required_str(arguments, "content")?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| path_error("create", parent, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| path_error("write", &path, e))?;

        Ok(format!("Wrote {} bytes to {}", content.len(), path.display()))
    }

    fn preview(&self, arguments: &ToolArguments) -> Option<String> {
        path_preview(arguments)
    }
}

/// Lists a directory, one entry per line
pub struct ListDirectoryTool {
    workdir: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "list_directory".into(),
            description: "List the entries of a directory. Subdirectories end with '/'.".into(),
            parameters: vec![ParameterSchema::required(
                "path",
                "string",
                "Directory path, relative to the working directory or absolute",
            )],
        }
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<String> {
        let path = resolve_path(&self.workdir, required_str(arguments, "path")?);

        let mut reader = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| path_error("list", &path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            return Ok("(empty directory)".into());
        }

        let total = entries.len();
        let mut listing = entries
            .into_iter()
            .take(MAX_LISTING_ENTRIES)
            .collect::<Vec<_>>()
            .join("\n");
        if total > MAX_LISTING_ENTRIES {
            listing.push_str(&format!(
                "\n[... {} more entries]",
                total - MAX_LISTING_ENTRIES
            ));
        }
        Ok(listing)
    }

    fn preview(&self, arguments: &ToolArguments) -> Option<String> {
        path_preview(arguments)
    }
}
