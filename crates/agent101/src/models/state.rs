use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::message::Message;
use super::tool::Tool;
use crate::errors::StateError;

/// The conversation a turn operates on: the ordered history plus the tools the model may request.
///
/// Tools are keyed by name, so a name is unique within a state and the order they are bound
/// to the model is stable between turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    tools: BTreeMap<String, Tool>,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool, rejecting a name that is already taken
    pub fn register_tool(&mut self, tool: Tool) -> Result<(), StateError> {
        if self.tools.contains_key(&tool.name) {
            return Err(StateError::DuplicateTool(tool.name));
        }
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    pub fn with_tool(mut self, tool: Tool) -> Result<Self, StateError> {
        self.register_tool(tool)?;
        Ok(self)
    }

    pub fn with_tools<I>(mut self, tools: I) -> Result<Self, StateError>
    where
        I: IntoIterator<Item = Tool>,
    {
        for tool in tools {
            self.register_tool(tool)?;
        }
        Ok(self)
    }

    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Merge incoming messages into the history by id: a known id replaces the stored
    /// message in place, an unknown id is appended.
    pub fn merge_messages<I>(&mut self, incoming: I)
    where
        I: IntoIterator<Item = Message>,
    {
        for message in incoming {
            match self.messages.iter().position(|m| m.id == message.id) {
                Some(index) => self.messages[index] = message,
                None => self.messages.push(message),
            }
        }
    }

    /// Replace the tool set, used when a stored conversation is resumed with the tools
    /// the interface offers on this request
    pub fn replace_tools<I>(&mut self, tools: I) -> Result<(), StateError>
    where
        I: IntoIterator<Item = Tool>,
    {
        let mut replacement = ConversationState::default();
        for tool in tools {
            replacement.register_tool(tool)?;
        }
        self.tools = replacement.tools;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str) -> Tool {
        Tool::new(name, "test tool", json!({"type": "object", "properties": {}}))
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let mut state = ConversationState::default();
        state.register_tool(tool("get_weather")).unwrap();
        let err = state.register_tool(tool("get_weather")).unwrap_err();
        assert_eq!(err, StateError::DuplicateTool("get_weather".into()));
        assert_eq!(state.tool_count(), 1);
    }

    #[test]
    fn test_tools_are_ordered_by_name() {
        let state = ConversationState::default()
            .with_tools(vec![tool("search_restaurants"), tool("get_weather")])
            .unwrap();
        let names: Vec<_> = state.tools().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["get_weather", "search_restaurants"]);
        assert!(state.tool("get_weather").is_some());
    }

    #[test]
    fn test_merge_messages_replaces_by_id_and_appends_new() {
        let mut state = ConversationState::new(vec![
            Message::user().with_id("1").with_text("hello"),
            Message::assistant().with_id("2").with_text("hi"),
        ]);

        state.merge_messages(vec![
            Message::user().with_id("1").with_text("hello again"),
            Message::user().with_id("3").with_text("weather?"),
        ]);

        let texts: Vec<_> = state.messages.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["hello again", "hi", "weather?"]);
    }

    #[test]
    fn test_replace_tools_keeps_old_set_on_duplicate() {
        let mut state = ConversationState::default().with_tool(tool("a")).unwrap();
        assert!(state.replace_tools(vec![tool("b"), tool("b")]).is_err());
        assert!(state.tool("a").is_some());

        state.replace_tools(vec![tool("c")]).unwrap();
        assert!(state.tool("a").is_none());
        assert!(state.tool("c").is_some());
    }
}
