use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Per-call options that shape how the tools are bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOptions {
    /// Whether the model may request several tool calls in one response
    pub parallel_tool_calls: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            parallel_tool_calls: false,
        }
    }
}

/// Base trait for AI providers (OpenAI, Azure OpenAI, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message for the given conversation. `messages` is the complete
    /// outbound list, system message included.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage)>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_creation() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(20));
        assert_eq!(usage.total_tokens, Some(30));
    }

    #[test]
    fn test_usage_serialization() -> Result<()> {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let serialized = serde_json::to_string(&usage)?;
        let deserialized: Usage = serde_json::from_str(&serialized)?;
        assert_eq!(usage, deserialized);

        let json_value: serde_json::Value = serde_json::from_str(&serialized)?;
        assert_eq!(json_value["input_tokens"], json!(10));
        assert_eq!(json_value["total_tokens"], json!(30));

        Ok(())
    }

    #[test]
    fn test_parallel_tool_calls_off_by_default() {
        assert!(!CompletionOptions::default().parallel_tool_calls);
    }
}
