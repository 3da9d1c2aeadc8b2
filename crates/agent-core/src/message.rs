//! Conversation Messages
//!
//! The append-only conversation log transmitted to the model on every turn,
//! and the presentation-facing display messages derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Role of a turn in the conversation log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input or tool results
    User,
    /// Model response
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One block-like entry inside a structured turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentEntry {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

/// Content of a turn: a plain string or an ordered list of entries
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Entries(Vec<ContentEntry>),
}

/// A single role-tagged entry in the conversation log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    /// Free-text user input
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    /// Assistant turn mirroring the blocks the model returned
    pub fn assistant(entries: Vec<ContentEntry>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Entries(entries),
        }
    }

    /// User turn carrying tool results
    pub fn tool_results(entries: Vec<ContentEntry>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Entries(entries),
        }
    }

    /// Whether this is a user turn produced by tool execution
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::User
            && matches!(&self.content, TurnContent::Entries(entries)
                if entries.iter().any(|e| matches!(e, ContentEntry::ToolResult { .. })))
    }

    /// Ids of every `tool_use` entry in this turn, in order
    pub fn tool_use_ids(&self) -> Vec<&str> {
        match &self.content {
            TurnContent::Entries(entries) => entries
                .iter()
                .filter_map(|e| match e {
                    ContentEntry::ToolUse { id, .. } => Some(id.as_str()),
                    _ => None,
                })
                .collect(),
            TurnContent::Text(_) => Vec::new(),
        }
    }
}

/// Position in the log that can be restored after a failed run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogCheckpoint {
    turns: usize,
    trailing_entries: Option<usize>,
}

/// Append-only conversation history, serialized verbatim as the request `messages`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append free-text user input.
    ///
    /// When the log ends with a tool-result turn (a run stopped at the
    /// iteration cap), the text joins that turn so roles keep alternating.
    pub fn push_user_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let Some(last) = self.turns.last_mut() {
            if last.is_tool_result() {
                if let TurnContent::Entries(entries) = &mut last.content {
                    entries.push(ContentEntry::Text { text });
                    return;
                }
            }
        }
        self.turns.push(Turn::user_text(text));
    }

    /// Append an assistant turn. Must follow a user turn.
    pub fn push_assistant(&mut self, entries: Vec<ContentEntry>) -> Result<()> {
        match self.turns.last() {
            Some(last) if last.role == Role::User => {
                self.turns.push(Turn::assistant(entries));
                Ok(())
            }
            Some(_) => Err(AgentError::Other(
                "assistant turn cannot follow another assistant turn".into(),
            )),
            None => Err(AgentError::Other(
                "assistant turn cannot open the conversation".into(),
            )),
        }
    }

    /// Append a tool-result user turn answering the preceding assistant turn.
    pub fn push_tool_results(&mut self, entries: Vec<ContentEntry>) -> Result<()> {
        let Some(last) = self.turns.last() else {
            return Err(AgentError::Other("tool results without an assistant turn".into()));
        };
        if last.role != Role::Assistant {
            return Err(AgentError::Other(
                "tool results must follow an assistant turn".into(),
            ));
        }

        let ids = last.tool_use_ids();
        for entry in &entries {
            match entry {
                ContentEntry::ToolResult { tool_use_id, .. }
                    if ids.contains(&tool_use_id.as_str()) => {}
                ContentEntry::ToolResult { tool_use_id, .. } => {
                    return Err(AgentError::Other(format!(
                        "tool result references unknown tool_use id {tool_use_id}"
                    )));
                }
                _ => {
                    return Err(AgentError::Other(
                        "tool-result turn may only hold tool_result entries".into(),
                    ));
                }
            }
        }

        self.turns.push(Turn::tool_results(entries));
        Ok(())
    }

    /// Record the current position
    pub fn checkpoint(&self) -> LogCheckpoint {
        LogCheckpoint {
            turns: self.turns.len(),
            trailing_entries: self.turns.last().and_then(|t| match &t.content {
                TurnContent::Entries(entries) => Some(entries.len()),
                TurnContent::Text(_) => None,
            }),
        }
    }

    /// Drop everything appended since `checkpoint`
    pub fn restore(&mut self, checkpoint: LogCheckpoint) {
        self.turns.truncate(checkpoint.turns);
        if let (Some(len), Some(last)) = (checkpoint.trailing_entries, self.turns.last_mut()) {
            if let TurnContent::Entries(entries) = &mut last.content {
                entries.truncate(len);
            }
        }
    }

    /// Get all turns
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Get the last turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Full reset
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Presentation-facing summary of what happened in the conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub role: Role,

    pub text: String,

    /// Tool this message describes, for tool calls and results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(default)]
    pub is_tool_result: bool,

    #[serde(default)]
    pub is_error: bool,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl DisplayMessage {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            tool_name: None,
            is_tool_result: false,
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// A tool invocation, summarized by name and a short argument preview
    pub fn tool_call(name: impl Into<String>, preview: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Assistant, preview);
        msg.tool_name = Some(name.into());
        msg
    }

    pub fn tool_result(name: impl Into<String>, output: impl Into<String>, is_error: bool) -> Self {
        let mut msg = Self::new(Role::User, output);
        msg.tool_name = Some(name.into());
        msg.is_tool_result = true;
        msg.is_error = is_error;
        msg
    }

    pub fn error(text: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Assistant, text);
        msg.is_error = true;
        msg
    }
}
