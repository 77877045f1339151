//! Drives the turn controller for a whole request.
//!
//! In [`RunMode::SingleTurn`] a run is exactly one controller turn and tool requests go back
//! to the caller. In [`RunMode::React`] the runner executes the tools it owns, one at a time,
//! appends their results and advances again until the model answers, a tool it does not own
//! is requested, or the recursion limit is hit.

use std::sync::Arc;

use crate::controller::{ModelResponse, TurnController};
use crate::errors::TurnError;
use crate::models::message::Message;
use crate::models::state::ConversationState;
use crate::providers::base::Usage;
use crate::tools::ToolRegistry;

#[derive(Clone)]
pub enum RunMode {
    SingleTurn,
    React {
        registry: Arc<ToolRegistry>,
        recursion_limit: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// History after the run. Executed tool rounds are part of it; a pending tool request is not.
    pub state: ConversationState,
    pub done: bool,
    /// The assistant message holding tool requests the caller has to execute
    pub pending: Option<Message>,
    pub model_calls: usize,
    pub usage: Usage,
}

pub struct Runner {
    controller: Arc<TurnController>,
    mode: RunMode,
}

impl Runner {
    pub fn single_turn(controller: Arc<TurnController>) -> Self {
        Self {
            controller,
            mode: RunMode::SingleTurn,
        }
    }

    pub fn react(controller: Arc<TurnController>, registry: Arc<ToolRegistry>) -> Self {
        let recursion_limit = controller.config().recursion_limit;
        Self {
            controller,
            mode: RunMode::React {
                registry,
                recursion_limit,
            },
        }
    }

    pub fn controller(&self) -> &TurnController {
        &self.controller
    }

    pub fn mode(&self) -> &RunMode {
        &self.mode
    }

    pub async fn run(&self, state: &ConversationState) -> Result<RunOutcome, TurnError> {
        match &self.mode {
            RunMode::SingleTurn => {
                let outcome = self.controller.advance(state).await?;
                let pending = match outcome.response {
                    ModelResponse::Final(_) => None,
                    ModelResponse::ToolCalls { message, .. } => Some(message),
                };
                Ok(RunOutcome {
                    state: outcome.state,
                    done: outcome.done,
                    pending,
                    model_calls: 1,
                    usage: outcome.usage,
                })
            }
            RunMode::React {
                registry,
                recursion_limit,
            } => self.run_react(state, registry, *recursion_limit).await,
        }
    }

    async fn run_react(
        &self,
        state: &ConversationState,
        registry: &ToolRegistry,
        recursion_limit: usize,
    ) -> Result<RunOutcome, TurnError> {
        let mut working = state.clone();
        for tool in registry.descriptors() {
            if working.tool(&tool.name).is_none() {
                // cannot collide, the name was just checked
                let _ = working.register_tool(tool);
            }
        }

        let mut usage = Usage::default();
        for step in 1..=recursion_limit {
            let outcome = self.controller.advance(&working).await?;
            accumulate(&mut usage, &outcome.usage);

            let (message, requests) = match outcome.response {
                ModelResponse::Final(_) => {
                    return Ok(RunOutcome {
                        state: outcome.state,
                        done: true,
                        pending: None,
                        model_calls: step,
                        usage,
                    });
                }
                ModelResponse::ToolCalls { message, requests } => (message, requests),
            };

            let client_side = requests.iter().any(|request| match &request.tool_call {
                Ok(call) => !registry.contains(&call.name),
                Err(_) => false,
            });
            if client_side {
                tracing::info!(step, "tool requested that the client must execute");
                return Ok(RunOutcome {
                    state: working,
                    done: false,
                    pending: Some(message),
                    model_calls: step,
                    usage,
                });
            }

            working.push(message);
            // one at a time, in the order the model asked
            for request in requests {
                let result = registry.dispatch(request.tool_call).await;
                working.push(Message::tool().with_tool_response(request.id, result));
            }
        }

        tracing::warn!(recursion_limit, "recursion limit reached");
        Err(TurnError::RecursionLimit {
            limit: recursion_limit,
        })
    }
}

fn accumulate(total: &mut Usage, usage: &Usage) {
    fn add(a: Option<i32>, b: Option<i32>) -> Option<i32> {
        match (a, b) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
        }
    }
    total.input_tokens = add(total.input_tokens, usage.input_tokens);
    total.output_tokens = add(total.output_tokens, usage.output_tokens);
    total.total_tokens = add(total.total_tokens, usage.total_tokens);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerConfig;
    use crate::errors::AgentError;
    use crate::models::message::MessageContent;
    use crate::models::role::Role;
    use crate::models::tool::{Tool, ToolCall};
    use crate::providers::mock::MockProvider;
    use crate::providers::utils::messages_to_openai_spec;
    use crate::tools::travel::travel_tools;
    use serde_json::json;

    fn controller(provider: Arc<MockProvider>, recursion_limit: usize) -> Arc<TurnController> {
        Arc::new(TurnController::new(
            provider,
            ControllerConfig {
                recursion_limit,
                ..Default::default()
            },
        ))
    }

    fn weather_call(id: &str) -> Message {
        Message::assistant().with_tool_request(
            id,
            Ok(ToolCall::new("get_weather", json!({"location": "sf"}))),
        )
    }

    fn question() -> ConversationState {
        ConversationState::new(vec![Message::user().with_text("what is the weather in sf")])
    }

    #[tokio::test]
    async fn test_single_turn_forwards_tool_requests() {
        let provider = Arc::new(MockProvider::new(vec![weather_call("call_1")]));
        let runner = Runner::single_turn(controller(provider.clone(), 25));
        let state = question();

        let outcome = runner.run(&state).await.unwrap();

        assert!(!outcome.done);
        assert_eq!(outcome.state, state);
        assert_eq!(outcome.pending.unwrap().tool_requests()[0].id, "call_1");
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_react_executes_server_tools_and_finishes() {
        let provider = Arc::new(MockProvider::new(vec![
            weather_call("call_1"),
            Message::assistant().with_text("It is sunny."),
        ]));
        let runner = Runner::react(controller(provider.clone(), 25), Arc::new(travel_tools()));

        let outcome = runner.run(&question()).await.unwrap();

        assert!(outcome.done);
        assert_eq!(outcome.model_calls, 2);
        let roles: Vec<Role> = outcome.state.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        let tool_text = outcome.state.messages[2].content[0]
            .as_tool_response_text()
            .unwrap();
        assert!(tool_text.starts_with("The weather in sf is sunny"));

        let calls = provider.calls();
        // registry tools are bound on every call
        assert_eq!(calls[0].tools.len(), 2);
        assert!(calls.iter().all(|c| !c.options.parallel_tool_calls));
        assert_eq!(calls[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn test_react_runs_requests_in_order() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant()
                .with_tool_request(
                    "a",
                    Ok(ToolCall::new("search_restaurants", json!({"location": "Rome"}))),
                )
                .with_tool_request(
                    "b",
                    Ok(ToolCall::new("get_weather", json!({"location": "Rome"}))),
                ),
            Message::assistant().with_text("done"),
        ]));
        let runner = Runner::react(controller(provider, 25), Arc::new(travel_tools()));

        let outcome = runner.run(&question()).await.unwrap();

        let ids: Vec<String> = outcome
            .state
            .messages
            .iter()
            .filter_map(|m| m.content.first())
            .filter_map(MessageContent::as_tool_response)
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_react_tool_failure_is_reported_to_model() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("call_1", Ok(ToolCall::new("get_weather", json!({})))),
            Message::assistant().with_text("Which city?"),
        ]));
        let runner = Runner::react(controller(provider.clone(), 25), Arc::new(travel_tools()));

        let outcome = runner.run(&question()).await.unwrap();

        assert!(outcome.done);
        let response = outcome.state.messages[2].content[0]
            .as_tool_response()
            .unwrap();
        assert!(matches!(
            response.tool_result,
            Err(AgentError::InvalidParameters(_))
        ));
        assert_eq!(provider.calls()[1].messages[3].role, Role::Tool);
    }

    #[tokio::test]
    async fn test_react_invalid_arguments_round_stays_well_formed() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "call_1",
                Err(AgentError::InvalidParameters("bad json".into())),
            ),
            Message::assistant().with_text("ok"),
        ]));
        let runner = Runner::react(controller(provider.clone(), 25), Arc::new(travel_tools()));

        let outcome = runner.run(&question()).await.unwrap();

        assert!(outcome.done);
        assert_eq!(outcome.model_calls, 2);

        let sent = messages_to_openai_spec(&provider.calls()[1].messages);
        let roles: Vec<&str> = sent.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool"]);
        assert_eq!(sent[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(sent[3]["tool_call_id"], "call_1");
        assert!(sent[3]["content"].as_str().unwrap().contains("bad json"));
    }

    #[tokio::test]
    async fn test_react_returns_client_tools_to_caller() {
        let provider = Arc::new(MockProvider::new(vec![Message::assistant()
            .with_tool_request(
                "call_ui",
                Ok(ToolCall::new("change_background", json!({"color": "blue"}))),
            )]));
        let state = question()
            .with_tool(Tool::new(
                "change_background",
                "Change the page background",
                json!({"type": "object"}),
            ))
            .unwrap();
        let runner = Runner::react(controller(provider.clone(), 25), Arc::new(travel_tools()));

        let outcome = runner.run(&state).await.unwrap();

        assert!(!outcome.done);
        assert_eq!(outcome.state.messages, state.messages);
        assert_eq!(outcome.pending.unwrap().tool_requests()[0].id, "call_ui");
        assert_eq!(provider.calls()[0].tools.len(), 3);
    }

    #[tokio::test]
    async fn test_react_recursion_limit() {
        let provider = Arc::new(MockProvider::new(vec![
            weather_call("1"),
            weather_call("2"),
            weather_call("3"),
        ]));
        let runner = Runner::react(controller(provider.clone(), 2), Arc::new(travel_tools()));

        let err = runner.run(&question()).await.unwrap_err();

        assert!(matches!(err, TurnError::RecursionLimit { limit: 2 }));
        assert_eq!(provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_react_model_failure_keeps_input() {
        let provider = Arc::new(MockProvider::with_results(vec![
            Ok(weather_call("1")),
            Err("timeout".to_string()),
        ]));
        let runner = Runner::react(controller(provider, 25), Arc::new(travel_tools()));
        let state = question();

        let err = runner.run(&state).await.unwrap_err();

        assert!(matches!(err, TurnError::ModelInvocation(_)));
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn test_accumulate_usage() {
        let mut total = Usage::default();
        accumulate(&mut total, &Usage::new(Some(1), Some(2), Some(3)));
        accumulate(&mut total, &Usage::new(Some(4), None, Some(4)));
        assert_eq!(total, Usage::new(Some(5), Some(2), Some(7)));
    }
}
