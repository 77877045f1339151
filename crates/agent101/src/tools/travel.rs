//! Simulated travel tools. They return canned data, which is enough to exercise the
//! tool loop end to end without an external service.
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{required_str, ToolHandler, ToolRegistry};
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::Tool;

pub struct WeatherTool {
    tool: Tool,
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherTool {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                "get_weather",
                "Get the current weather for a location.",
                json!({
                    "type": "object",
                    "properties": {
                        "location": {"type": "string", "description": "The city"}
                    },
                    "required": ["location"]
                }),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<Vec<Content>> {
        let location = required_str(&arguments, "location")?;
        Ok(vec![Content::text(format!(
            "The weather in {} is sunny with a temperature of 22°C.",
            location
        ))])
    }
}

pub struct RestaurantSearchTool {
    tool: Tool,
}

impl Default for RestaurantSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

impl RestaurantSearchTool {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                "search_restaurants",
                "Search for restaurants in a location.",
                json!({
                    "type": "object",
                    "properties": {
                        "location": {"type": "string", "description": "The city to search in"},
                        "cuisine": {
                            "type": "string",
                            "description": "Type of cuisine",
                            "default": "any"
                        }
                    },
                    "required": ["location"]
                }),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for RestaurantSearchTool {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<Vec<Content>> {
        let location = required_str(&arguments, "location")?;
        let cuisine = arguments
            .get("cuisine")
            .and_then(|v| v.as_str())
            .unwrap_or("any");

        let results = json!({
            "location": location,
            "cuisine": cuisine,
            "results": [
                {"name": "The Golden Fork", "rating": 4.5, "price": "$$"},
                {"name": "Bella Italia", "rating": 4.2, "price": "$$$"},
                {"name": "Spice Garden", "rating": 4.7, "price": "$$"},
            ],
        });
        let text =
            serde_json::to_string(&results).map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(vec![Content::text(text)])
    }
}

/// A registry holding both travel tools
pub fn travel_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for handler in [
        Arc::new(WeatherTool::new()) as Arc<dyn ToolHandler>,
        Arc::new(RestaurantSearchTool::new()),
    ] {
        // names are distinct, registration cannot fail
        let _ = registry.register(handler);
    }
    registry
}
