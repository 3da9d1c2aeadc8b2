//! Built-in Tools
//!
//! Host capabilities exposed to the model through `agent_core::Tool`.

mod fetch;
mod fs;
mod shell;

use std::path::{Path, PathBuf};

use agent_core::{
    error::Result,
    tool::{DateTimeTool, ToolRegistry},
};

pub use fetch::FetchUrlTool;
pub use fs::{ListDirectoryTool, ReadFileTool, WriteFileTool};
pub use shell::ShellTool;

/// Registry with every built-in tool, rooted at `workdir`
pub fn builtin_registry(workdir: impl Into<PathBuf>) -> Result<ToolRegistry> {
    let workdir = workdir.into();
    let mut registry = ToolRegistry::new();

    registry.register(ShellTool::new(workdir.clone()));
    registry.register(ReadFileTool::new(workdir.clone()));
    registry.register(WriteFileTool::new(workdir.clone()));
    registry.register(ListDirectoryTool::new(workdir));
    registry.register(FetchUrlTool::new()?);
    registry.register(DateTimeTool);

    Ok(registry)
}

/// Relative paths are taken from `workdir`
pub(crate) fn resolve_path(workdir: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        workdir.join(candidate)
    }
}
