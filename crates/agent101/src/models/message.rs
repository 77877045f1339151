use super::content::{join_text, Content, TextContent};
use super::role::Role;
use super::tool::ToolCall;
use crate::errors::AgentResult;
use chrono::Utc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub tool_call: AgentResult<ToolCall>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub tool_result: AgentResult<Vec<Content>>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(TextContent),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn tool_request<S: Into<String>>(id: S, tool_call: AgentResult<ToolCall>) -> Self {
        MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            tool_call,
        })
    }

    pub fn tool_response<S: Into<String>>(id: S, tool_result: AgentResult<Vec<Content>>) -> Self {
        MessageContent::ToolResponse(ToolResponse {
            id: id.into(),
            tool_result,
        })
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref tool_request) = self {
            Some(tool_request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    /// The text a tool response carries, with errors rendered so the model can read them
    pub fn as_tool_response_text(&self) -> Option<String> {
        let tool_response = self.as_tool_response()?;
        Some(match &tool_response.tool_result {
            Ok(contents) => join_text(contents),
            Err(e) => format!("The tool call returned the following error:\n{}", e),
        })
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

impl From<Content> for MessageContent {
    fn from(content: Content) -> Self {
        match content {
            Content::Text(text) => MessageContent::Text(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub id: String,
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    fn with_role(role: Role) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            role,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new system message with the current timestamp
    pub fn system() -> Self {
        Self::with_role(Role::System)
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::with_role(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::with_role(Role::Assistant)
    }

    /// Create a new tool message, which carries tool responses back to the model
    pub fn tool() -> Self {
        Self::with_role(Role::Tool)
    }

    /// Replace the generated id, used when the interface already assigned one
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add a tool request to the message
    pub fn with_tool_request<S: Into<String>>(
        self,
        id: S,
        tool_call: AgentResult<ToolCall>,
    ) -> Self {
        self.with_content(MessageContent::tool_request(id, tool_call))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<S: Into<String>>(
        self,
        id: S,
        result: AgentResult<Vec<Content>>,
    ) -> Self {
        self.with_content(MessageContent::tool_response(id, result))
    }

    /// All tool requests carried by this message, in order
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content
            .iter()
            .filter_map(MessageContent::as_tool_request)
            .collect()
    }

    pub fn has_tool_requests(&self) -> bool {
        self.content
            .iter()
            .any(|content| content.as_tool_request().is_some())
    }

    /// Concatenated text content, empty when the message has none
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(MessageContent::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}
