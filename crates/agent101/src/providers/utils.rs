use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use super::base::{CompletionOptions, Usage};
use crate::errors::AgentError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// Name sent for a tool call the model produced but that could not be interpreted
pub const INVALID_TOOL_NAME: &str = "invalid_tool_call";

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();
    // ids that already have a tool response somewhere in the history
    let answered: HashSet<&str> = messages
        .iter()
        .flat_map(|message| message.content.iter())
        .filter_map(|content| content.as_tool_response())
        .map(|response| response.id.as_str())
        .collect();

    for message in messages {
        let mut converted = json!({
            "role": message.role
        });

        let mut output = Vec::new();
        let text = message.text();
        if !text.is_empty() {
            converted["content"] = json!(text);
        }

        for content in &message.content {
            match content {
                MessageContent::Text(_) => {}
                MessageContent::ToolRequest(request) => {
                    // an invalid request still needs a tool_calls entry, otherwise the
                    // tool message answering it is an orphan the API rejects
                    let (name, arguments) = match &request.tool_call {
                        Ok(tool_call) => (
                            sanitize_function_name(&tool_call.name),
                            tool_call.arguments.to_string(),
                        ),
                        Err(_) => (INVALID_TOOL_NAME.to_string(), "{}".to_string()),
                    };
                    let tool_calls = converted.as_object_mut().and_then(|obj| {
                        obj.entry("tool_calls")
                            .or_insert(json!([]))
                            .as_array_mut()
                    });
                    if let Some(tool_calls) = tool_calls {
                        tool_calls.push(json!({
                            "id": request.id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": arguments,
                            }
                        }));
                    }
                    if let Err(e) = &request.tool_call {
                        if !answered.contains(request.id.as_str()) {
                            output.push(json!({
                                "role": "tool",
                                "content": format!("Error: {}", e),
                                "tool_call_id": request.id
                            }));
                        }
                    }
                }
                MessageContent::ToolResponse(response) => {
                    // A tool result error is shown as output so the model can interpret the error message
                    let rendered = content.as_tool_response_text().unwrap_or_default();
                    output.push(json!({
                        "role": "tool",
                        "content": rendered,
                        "tool_call_id": response.id
                    }));
                }
            }
        }

        // Tool role messages are fully expressed by their tool responses
        if message.role != Role::Tool
            && (converted.get("content").is_some() || converted.get("tool_calls").is_some())
        {
            output.insert(0, converted);
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Build the chat completions payload shared by OpenAI and Azure deployments. Azure selects
/// the model through the deployment in the url, so `model` is optional.
pub fn create_openai_request(
    model: Option<&str>,
    messages: &[Message],
    tools: &[Tool],
    options: &CompletionOptions,
    temperature: Option<f32>,
    max_tokens: Option<i32>,
) -> Result<Value> {
    let mut payload = Map::new();
    if let Some(model) = model {
        payload.insert("model".to_string(), json!(model));
    }
    payload.insert(
        "messages".to_string(),
        json!(messages_to_openai_spec(messages)),
    );

    let tools_spec = tools_to_openai_spec(tools)?;
    if !tools_spec.is_empty() {
        payload.insert("tools".to_string(), json!(tools_spec));
        // The API rejects parallel_tool_calls when no tools are bound
        payload.insert(
            "parallel_tool_calls".to_string(),
            json!(options.parallel_tool_calls),
        );
    }
    if let Some(temp) = temperature {
        payload.insert("temperature".to_string(), json!(temp));
    }
    if let Some(tokens) = max_tokens {
        payload.insert("max_tokens".to_string(), json!(tokens));
    }

    Ok(Value::Object(payload))
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .cloned()
        .ok_or_else(|| anyhow!("Malformed response, no message in choices: {}", response))?;
    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(|t| t.as_str()) {
        if !text.is_empty() {
            message = message.with_text(text);
        }
    }

    if let Some(tool_calls_array) = original.get("tool_calls").and_then(|t| t.as_array()) {
        for tool_call in tool_calls_array {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default()
                .to_string();

            if !is_valid_function_name(&function_name) {
                let error = AgentError::ToolNotFound(format!(
                    "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                    function_name
                ));
                message = message.with_tool_request(id, Err(error));
            } else {
                // Models sometimes send an empty string for a call without arguments
                let arguments = if arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    arguments
                };
                match serde_json::from_str::<Value>(&arguments) {
                    Ok(params) => {
                        message = message
                            .with_tool_request(id, Ok(ToolCall::new(&function_name, params)));
                    }
                    Err(e) => {
                        let error = AgentError::InvalidParameters(format!(
                            "Could not interpret tool use parameters for id {}: {}",
                            id, e
                        ));
                        message = message.with_tool_request(id, Err(error));
                    }
                }
            }
        }
    }

    Ok(message)
}

pub fn get_openai_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usage") else {
        return Usage::default();
    };

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
