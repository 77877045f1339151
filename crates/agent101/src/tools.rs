//! Server side tools: a table from tool name to the object that executes it.
pub mod travel;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{AgentError, AgentResult, StateError};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

/// A tool the agent can execute itself
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The descriptor bound to the model
    fn tool(&self) -> &Tool;

    /// Execute the tool with the arguments the model supplied
    async fn call(&self, arguments: Value) -> AgentResult<Vec<Content>>;
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    handlers: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> Result<(), StateError> {
        let name = handler.tool().name.clone();
        if self.handlers.contains_key(&name) {
            return Err(StateError::DuplicateTool(name));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn with(mut self, handler: Arc<dyn ToolHandler>) -> Result<Self, StateError> {
        self.register(handler)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn descriptors(&self) -> Vec<Tool> {
        self.handlers
            .values()
            .map(|handler| handler.tool().clone())
            .collect()
    }

    /// Dispatch a single tool call to the handler that owns it
    pub async fn dispatch(&self, tool_call: AgentResult<ToolCall>) -> AgentResult<Vec<Content>> {
        let call = tool_call?;
        let handler = self
            .handlers
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tracing::info!(tool = %call.name, "executing tool");
        let result = handler.call(call.arguments).await;
        if let Err(e) = &result {
            tracing::warn!(tool = %call.name, "tool failed: {}", e);
        }
        result
    }
}

/// Pull a required string argument out of a tool call
pub(crate) fn required_str<'a>(arguments: &'a Value, name: &str) -> AgentResult<&'a str> {
    arguments
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AgentError::InvalidParameters(format!("{} parameter required", name)))
}
