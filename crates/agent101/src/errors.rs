use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while resolving or executing a single tool call. These travel inside
/// messages, so the model can read them on the next turn.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that end a turn. None of them leave a partially updated conversation behind.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[source] anyhow::Error),

    #[error("Recursion limit of {limit} model calls reached without a final answer")]
    RecursionLimit { limit: usize },
}

impl TurnError {
    /// A short machine readable code, used by the HTTP layer
    pub fn code(&self) -> &'static str {
        match self {
            TurnError::ModelInvocation(_) => "model_invocation_error",
            TurnError::RecursionLimit { .. } => "recursion_limit",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_turn_error_codes() {
        let err = TurnError::ModelInvocation(anyhow!("Server error: 503"));
        assert_eq!(err.code(), "model_invocation_error");
        assert_eq!(err.to_string(), "Model invocation failed: Server error: 503");
        assert_eq!(TurnError::RecursionLimit { limit: 3 }.code(), "recursion_limit");
    }

    #[test]
    fn test_agent_error_roundtrips_through_json() {
        let err = AgentError::ToolNotFound("get_weather".into());
        let value = serde_json::to_string(&err).unwrap();
        let back: AgentError = serde_json::from_str(&value).unwrap();
        assert_eq!(back, err);
    }
}
