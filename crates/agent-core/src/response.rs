//! Model Response Parsing
//!
//! Typed view of a model response: ordered content blocks, the stop
//! indicator, and the usage delta. Unknown block types are preserved as
//! [`ContentBlock::Other`] and never dispatched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

/// A content block returned by the model
#[derive(Clone, Debug, PartialEq)]
pub enum ContentBlock {
    Text {
        body: String,
    },
    ToolUse {
        id: String,
        name: Option<String>,
        arguments: Option<Map<String, Value>>,
    },
    Other {
        raw_type: String,
        raw: Value,
    },
}

impl ContentBlock {
    /// Parse one element of the response `content` array
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| AgentError::MalformedResponse("content block is not an object".into()))?;
        let block_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::MalformedResponse("content block without a type".into()))?;

        let block = match block_type {
            "text" => ContentBlock::Text {
                body: obj
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "tool_use" => ContentBlock::ToolUse {
                id: obj
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        AgentError::MalformedResponse("tool_use block without an id".into())
                    })?
                    .to_string(),
                name: obj
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string),
                arguments: obj.get("input").and_then(Value::as_object).cloned(),
            },
            other => ContentBlock::Other {
                raw_type: other.to_string(),
                raw: value.clone(),
            },
        };
        Ok(block)
    }

    /// Name and arguments, if this block can be dispatched to a tool
    pub fn as_dispatchable(&self) -> Option<(&str, &str, &Map<String, Value>)> {
        match self {
            ContentBlock::ToolUse {
                id,
                name: Some(name),
                arguments: Some(arguments),
            } => Some((id.as_str(), name.as_str(), arguments)),
            _ => None,
        }
    }
}

/// Why the model stopped generating
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            other => StopReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::ToolUse => "tool_use",
            StopReason::MaxTokens => "max_tokens",
            StopReason::StopSequence => "stop_sequence",
            StopReason::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage reported by a single response
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Cumulative usage for the session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageCounters {
    pub fn add(&mut self, delta: TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(delta.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(delta.output_tokens);
    }

    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Parsed model response
#[derive(Clone, Debug, PartialEq)]
pub struct ModelResponse {
    pub blocks: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl ModelResponse {
    /// Parse a raw response body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| AgentError::MalformedResponse(format!("invalid JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Parse a decoded response payload
    pub fn from_value(value: &Value) -> Result<Self> {
        let content = value
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::MalformedResponse("missing content array".into()))?;
        let stop_reason = value
            .get("stop_reason")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::MalformedResponse("missing stop_reason".into()))?;
        let usage = value
            .get("usage")
            .ok_or_else(|| AgentError::MalformedResponse("missing usage".into()))?;

        let usage = TokenUsage {
            input_tokens: usage_field(usage, "input_tokens")?,
            output_tokens: usage_field(usage, "output_tokens")?,
        };

        let blocks = content
            .iter()
            .map(ContentBlock::from_value)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            blocks,
            stop_reason: StopReason::parse(stop_reason),
            usage,
        })
    }
}

fn usage_field(usage: &Value, field: &str) -> Result<u64> {
    usage
        .get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| AgentError::MalformedResponse(format!("missing usage.{field}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_blocks() {
        let payload = json!({
            "id": "msg_01",
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "thinking", "thinking": "hmm"},
                {
                    "type": "tool_use",
                    "id": "tu_1",
                    "name": "list_directory",
                    "input": {"path": "/sdcard"}
                }
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 7}
        });

        let response = ModelResponse::from_value(&payload).unwrap();
        assert_eq!(response.blocks.len(), 3);
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.usage, TokenUsage { input_tokens: 12, output_tokens: 7 });
        assert!(matches!(
            &response.blocks[1],
            ContentBlock::Other { raw_type, .. } if raw_type == "thinking"
        ));
        assert!(response.blocks[1].as_dispatchable().is_none());

        let (id, name, args) = response.blocks[2].as_dispatchable().unwrap();
        assert_eq!(id, "tu_1");
        assert_eq!(name, "list_directory");
        assert_eq!(args["path"], json!("/sdcard"));
    }

    #[test]
    fn test_unknown_stop_reason_is_opaque() {
        let payload = json!({
            "content": [],
            "stop_reason": "pause_turn",
            "usage": {"input_tokens": 1, "output_tokens": 1}
        });
        let response = ModelResponse::from_value(&payload).unwrap();
        assert_eq!(response.stop_reason, StopReason::Other("pause_turn".into()));
        assert_ne!(response.stop_reason, StopReason::ToolUse);
    }

    #[test]
    fn test_missing_required_fields() {
        let no_content = json!({
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1, "output_tokens": 1}
        });
        let no_stop = json!({"content": [], "usage": {"input_tokens": 1, "output_tokens": 1}});
        let no_usage = json!({"content": [], "stop_reason": "end_turn"});

        for payload in [no_content, no_stop, no_usage] {
            assert!(matches!(
                ModelResponse::from_value(&payload),
                Err(AgentError::MalformedResponse(_))
            ));
        }
        assert!(matches!(
            ModelResponse::from_slice(b"<html>"),
            Err(AgentError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_tool_use_without_arguments_is_not_dispatchable() {
        let block = ContentBlock::from_value(&json!({
            "type": "tool_use",
            "id": "tu_2",
            "name": "read_file"
        }))
        .unwrap();
        assert!(block.as_dispatchable().is_none());
    }

    #[test]
    fn test_usage_accumulates() {
        let mut counters = UsageCounters::default();
        counters.add(TokenUsage { input_tokens: 10, output_tokens: 5 });
        counters.add(TokenUsage { input_tokens: 3, output_tokens: 2 });
        assert_eq!(counters, UsageCounters { input_tokens: 13, output_tokens: 7 });
        assert_eq!(counters.total(), 20);
    }
}
