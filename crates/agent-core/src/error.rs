//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Connectivity or I/O failure, no response obtained
    #[error("Transport error: {0}")]
    Transport(String),

    /// Model endpoint answered with a non-2xx status
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Response was missing required structure
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Credential provider cannot refresh silently; the user must log in again
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// No authentication mode is active
    #[error("Not authenticated")]
    NotAuthenticated,

    /// A run is already in progress
    #[error("A run is already in progress")]
    Busy,

    /// Submitted text was blank
    #[error("Message is empty")]
    EmptyInput,

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential storage or exchange failed for a reason other than expiry
    #[error("Credential error: {0}")]
    Credential(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable by issuing a new submit
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Transport(_) | AgentError::Io(_) => true,
            AgentError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the error ends the authenticated session
    pub fn requires_reauth(&self) -> bool {
        matches!(self, AgentError::SessionExpired(_) | AgentError::NotAuthenticated)
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Transport(_) => {
                "Could not reach the model service. Check your connection and try again.".into()
            }
            AgentError::Api { status: 401 | 403, .. } => {
                "The model service rejected the credentials.".into()
            }
            AgentError::Api { status: 429, .. } => {
                "You've made too many requests. Please wait a moment.".into()
            }
            AgentError::Api { status, body } => {
                format!("The model service returned HTTP {status}: {body}")
            }
            AgentError::MalformedResponse(_) => {
                "The model service returned a response that could not be understood.".into()
            }
            AgentError::SessionExpired(_) => {
                "Your session has expired. Please log in again.".into()
            }
            AgentError::NotAuthenticated => "Please log in or set an API key first.".into(),
            AgentError::Busy => "Still working on the previous request.".into(),
            AgentError::EmptyInput => "Type a message first.".into(),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            AgentError::ToolExecution(msg) => format!("Tool error: {msg}"),
            AgentError::Config(msg) => format!("Configuration problem: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AgentError::Transport("reset".into()).is_retryable());
        assert!(AgentError::Api { status: 503, body: String::new() }.is_retryable());
        assert!(AgentError::Api { status: 429, body: String::new() }.is_retryable());
        assert!(!AgentError::Api { status: 400, body: String::new() }.is_retryable());
        assert!(!AgentError::SessionExpired("gone".into()).is_retryable());
        assert!(!AgentError::MalformedResponse("no usage".into()).is_retryable());
    }

    #[test]
    fn test_reauth_classification() {
        assert!(AgentError::SessionExpired("refresh rejected".into()).requires_reauth());
        assert!(AgentError::NotAuthenticated.requires_reauth());
        assert!(!AgentError::Transport("timeout".into()).requires_reauth());
    }
}
