//! The AG-UI wire format: the run input posted by the interface, the messages it carries,
//! and the events streamed back. Conversions to and from the internal models live here so
//! the routes only deal with agent101 types.
use agent101::errors::AgentError;
use agent101::models::content::Content;
use agent101::models::message::{Message, MessageContent};
use agent101::models::role::Role;
use agent101::models::tool::{Tool, ToolCall};
use agent101::providers::utils::INVALID_TOOL_NAME;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentInput {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<AgUiMessage>,
    #[serde(default)]
    pub tools: Vec<AgUiTool>,
    // accepted for protocol compatibility, the agent keeps no shared state with the interface
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub context: Vec<Value>,
    #[serde(default)]
    pub forwarded_props: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgUiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<AgUiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgUiToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: AgUiFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgUiFunctionCall {
    pub name: String,
    /// JSON encoded arguments
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgUiTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema")]
    pub parameters: Value,
}

impl From<AgUiTool> for Tool {
    fn from(tool: AgUiTool) -> Self {
        Tool::new(tool.name, tool.description, tool.parameters)
    }
}

fn function_type() -> String {
    "function".to_string()
}

fn empty_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Text of a message content, which is either a string or a list of parts
fn content_text(content: &Option<Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

fn with_wire_id(message: Message, id: Option<String>) -> Message {
    match id {
        Some(id) => message.with_id(id),
        None => message,
    }
}

// Convert incoming messages to our internal Message type
pub fn convert_messages(incoming: Vec<AgUiMessage>) -> Vec<Message> {
    let mut messages = Vec::new();

    for msg in incoming {
        let text = content_text(&msg.content);
        let converted = match msg.role.as_str() {
            "user" => Message::user().with_text(text),
            "system" | "developer" => Message::system().with_text(text),
            "assistant" => {
                let mut message = Message::assistant();
                if !text.is_empty() {
                    message = message.with_text(text);
                }
                for call in msg.tool_calls.unwrap_or_default() {
                    let arguments = if call.function.arguments.trim().is_empty() {
                        Ok(Value::Object(Default::default()))
                    } else {
                        serde_json::from_str::<Value>(&call.function.arguments)
                    };
                    let tool_call = arguments
                        .map(|arguments| ToolCall::new(call.function.name, arguments))
                        .map_err(|e| {
                            AgentError::InvalidParameters(format!(
                                "Could not interpret tool use parameters for id {}: {}",
                                call.id, e
                            ))
                        });
                    message = message.with_tool_request(call.id, tool_call);
                }
                message
            }
            "tool" => {
                let Some(tool_call_id) = msg.tool_call_id else {
                    tracing::warn!("Tool message without toolCallId, skipping");
                    continue;
                };
                let result = match msg.error {
                    Some(error) => Err(AgentError::ExecutionError(error)),
                    None => Ok(vec![Content::text(text)]),
                };
                Message::tool().with_tool_response(tool_call_id, result)
            }
            _ => {
                tracing::warn!("Unknown role: {}", msg.role);
                continue;
            }
        };
        messages.push(with_wire_id(converted, msg.id));
    }

    messages
}

/// Convert an internal message back to the wire shape, used for message snapshots
pub fn to_wire_message(message: &Message) -> AgUiMessage {
    let mut wire = AgUiMessage {
        id: Some(message.id.clone()),
        role: message.role.to_string(),
        content: None,
        tool_calls: None,
        tool_call_id: None,
        error: None,
    };

    match message.role {
        Role::Tool => {
            if let Some(content) = message.content.first() {
                if let Some(response) = content.as_tool_response() {
                    wire.tool_call_id = Some(response.id.clone());
                    if let Err(e) = &response.tool_result {
                        wire.error = Some(e.to_string());
                    }
                }
                wire.content = content.as_tool_response_text().map(Value::String);
            }
        }
        _ => {
            let text = message.text();
            if !text.is_empty() {
                wire.content = Some(Value::String(text));
            }
            let calls: Vec<AgUiToolCall> = message
                .tool_requests()
                .into_iter()
                .map(|request| match &request.tool_call {
                    Ok(call) => AgUiToolCall {
                        id: request.id.clone(),
                        kind: function_type(),
                        function: AgUiFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    },
                    Err(_) => invalid_tool_call(&request.id),
                })
                .collect();
            if !calls.is_empty() {
                wire.tool_calls = Some(calls);
            }
        }
    }

    wire
}

// if the llm generates an invalid tool call, we still have to include it in the history
fn invalid_tool_call(id: &str) -> AgUiToolCall {
    AgUiToolCall {
        id: id.to_string(),
        kind: function_type(),
        function: AgUiFunctionCall {
            name: INVALID_TOOL_NAME.to_string(),
            arguments: "{}".to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    RunStarted { thread_id: String, run_id: String },
    #[serde(rename_all = "camelCase")]
    RunFinished { thread_id: String, run_id: String },
    #[serde(rename_all = "camelCase")]
    RunError { message: String, code: String },
    #[serde(rename_all = "camelCase")]
    TextMessageStart { message_id: String, role: String },
    #[serde(rename_all = "camelCase")]
    TextMessageContent { message_id: String, delta: String },
    #[serde(rename_all = "camelCase")]
    TextMessageEnd { message_id: String },
    #[serde(rename_all = "camelCase")]
    ToolCallStart {
        tool_call_id: String,
        tool_call_name: String,
        parent_message_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCallArgs { tool_call_id: String, delta: String },
    #[serde(rename_all = "camelCase")]
    ToolCallEnd { tool_call_id: String },
    #[serde(rename_all = "camelCase")]
    ToolCallResult {
        message_id: String,
        tool_call_id: String,
        content: String,
        role: String,
    },
    #[serde(rename_all = "camelCase")]
    MessagesSnapshot { messages: Vec<AgUiMessage> },
}

impl Event {
    /// Frame the event as a server sent event
    pub fn to_sse(&self) -> String {
        let encoded = serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize event: {}", e);
            String::new()
        });
        format!("data: {}\n\n", encoded)
    }
}

/// The events describing one new message
pub fn message_events(message: &Message) -> Vec<Event> {
    let mut events = Vec::new();
    match message.role {
        Role::Assistant => {
            let text = message.text();
            if !text.is_empty() {
                events.push(Event::TextMessageStart {
                    message_id: message.id.clone(),
                    role: Role::Assistant.to_string(),
                });
                events.push(Event::TextMessageContent {
                    message_id: message.id.clone(),
                    delta: text,
                });
                events.push(Event::TextMessageEnd {
                    message_id: message.id.clone(),
                });
            }
            for request in message.tool_requests() {
                let (name, arguments) = match &request.tool_call {
                    Ok(call) => (call.name.clone(), call.arguments.to_string()),
                    Err(_) => (INVALID_TOOL_NAME.to_string(), "{}".to_string()),
                };
                events.push(Event::ToolCallStart {
                    tool_call_id: request.id.clone(),
                    tool_call_name: name,
                    parent_message_id: message.id.clone(),
                });
                events.push(Event::ToolCallArgs {
                    tool_call_id: request.id.clone(),
                    delta: arguments,
                });
                events.push(Event::ToolCallEnd {
                    tool_call_id: request.id.clone(),
                });
            }
        }
        Role::Tool => {
            for content in &message.content {
                if let (MessageContent::ToolResponse(response), Some(text)) =
                    (content, content.as_tool_response_text())
                {
                    events.push(Event::ToolCallResult {
                        message_id: message.id.clone(),
                        tool_call_id: response.id.clone(),
                        content: text,
                        role: Role::Tool.to_string(),
                    });
                }
            }
        }
        // the protocol does not echo user or system messages as events
        Role::User | Role::System => {}
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(value: Value) -> Vec<AgUiMessage> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_convert_messages_roles_and_ids() {
        let messages = convert_messages(wire(json!([
            {"id": "s", "role": "developer", "content": "be brief"},
            {"id": "u", "role": "user", "content": "what is the weather in sf"},
            {"id": "x", "role": "reasoning", "content": "hmm"},
            {"role": "user", "content": [{"type": "text", "text": "and "}, {"type": "text", "text": "rome?"}]}
        ])));

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].id, "u");
        assert_eq!(messages[1].text(), "what is the weather in sf");
        assert_eq!(messages[2].text(), "and rome?");
        assert!(!messages[2].id.is_empty());
    }

    #[test]
    fn test_convert_assistant_tool_calls_and_results() {
        let messages = convert_messages(wire(json!([
            {
                "id": "a",
                "role": "assistant",
                "toolCalls": [
                    {"id": "c1", "type": "function", "function": {"name": "get_weather", "arguments": "{\"location\":\"sf\"}"}},
                    {"id": "c2", "type": "function", "function": {"name": "get_weather", "arguments": "{oops"}}
                ]
            },
            {"id": "t1", "role": "tool", "toolCallId": "c1", "content": "sunny"},
            {"id": "t2", "role": "tool", "toolCallId": "c2", "content": "", "error": "bad arguments"},
            {"id": "t3", "role": "tool", "content": "orphan"}
        ])));

        assert_eq!(messages.len(), 3);
        let requests = messages[0].tool_requests();
        assert_eq!(
            requests[0].tool_call,
            Ok(ToolCall::new("get_weather", json!({"location": "sf"})))
        );
        assert!(matches!(
            requests[1].tool_call,
            Err(AgentError::InvalidParameters(_))
        ));

        let ok = messages[1].content[0].as_tool_response().unwrap();
        assert_eq!(ok.id, "c1");
        assert_eq!(ok.tool_result, Ok(vec![Content::text("sunny")]));

        let failed = messages[2].content[0].as_tool_response().unwrap();
        assert_eq!(
            failed.tool_result,
            Err(AgentError::ExecutionError("bad arguments".into()))
        );
    }

    #[test]
    fn test_to_wire_message() {
        let assistant = Message::assistant()
            .with_id("a")
            .with_tool_request("c1", Ok(ToolCall::new("get_weather", json!({"location": "sf"}))));
        let value = serde_json::to_value(to_wire_message(&assistant)).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "a",
                "role": "assistant",
                "toolCalls": [{
                    "id": "c1",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": "{\"location\":\"sf\"}"}
                }]
            })
        );

        let tool = Message::tool()
            .with_id("t")
            .with_tool_response("c1", Ok(vec![Content::text("sunny")]));
        let value = serde_json::to_value(to_wire_message(&tool)).unwrap();
        assert_eq!(
            value,
            json!({"id": "t", "role": "tool", "content": "sunny", "toolCallId": "c1"})
        );
    }

    #[test]
    fn test_event_framing() {
        let event = Event::TextMessageContent {
            message_id: "m".to_string(),
            delta: "It is sunny.".to_string(),
        };
        assert_eq!(
            event.to_sse(),
            "data: {\"type\":\"TEXT_MESSAGE_CONTENT\",\"messageId\":\"m\",\"delta\":\"It is sunny.\"}\n\n"
        );

        let started = serde_json::to_value(Event::RunStarted {
            thread_id: "t".to_string(),
            run_id: "r".to_string(),
        })
        .unwrap();
        assert_eq!(started, json!({"type": "RUN_STARTED", "threadId": "t", "runId": "r"}));
    }

    #[test]
    fn test_message_events() {
        let message = Message::assistant()
            .with_id("m")
            .with_text("Checking.")
            .with_tool_request("c1", Ok(ToolCall::new("get_weather", json!({}))))
            .with_tool_request("c2", Err(AgentError::ToolNotFound("bad name".into())));

        let events = message_events(&message);
        assert_eq!(events.len(), 9);
        assert_eq!(
            events[3],
            Event::ToolCallStart {
                tool_call_id: "c1".to_string(),
                tool_call_name: "get_weather".to_string(),
                parent_message_id: "m".to_string(),
            }
        );
        assert_eq!(
            events[6],
            Event::ToolCallStart {
                tool_call_id: "c2".to_string(),
                tool_call_name: INVALID_TOOL_NAME.to_string(),
                parent_message_id: "m".to_string(),
            }
        );

        let result = Message::tool()
            .with_id("t")
            .with_tool_response("c1", Ok(vec![Content::text("sunny")]));
        assert_eq!(
            message_events(&result),
            vec![Event::ToolCallResult {
                message_id: "t".to_string(),
                tool_call_id: "c1".to_string(),
                content: "sunny".to_string(),
                role: "tool".to_string(),
            }]
        );

        assert!(message_events(&Message::user().with_text("hi")).is_empty());
    }
}
