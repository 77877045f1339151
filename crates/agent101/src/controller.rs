//! The turn controller: one model call per turn, with every registered tool bound and
//! parallel tool calls disabled.
//!
//! A turn starts in [`TurnPhase::AwaitingModel`] and moves to [`TurnPhase::Terminated`] as
//! soon as the model answers. There is no edge back: when the model asks for tools, the
//! requests are handed to the caller untouched and the caller decides whether to execute
//! them and advance again (see [`crate::runner`]).

use std::sync::Arc;

use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use crate::errors::TurnError;
use crate::models::message::{Message, ToolRequest};
use crate::models::role::Role;
use crate::models::state::ConversationState;
use crate::models::tool::Tool;
use crate::providers::base::{CompletionOptions, Provider, Usage};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Prepended to every model call, never stored in history
    pub system_prompt: String,
    /// Keep an in-memory checkpoint of each session between turns
    pub persist_execution_state: bool,
    /// Upper bound on model calls when a caller drives several rounds
    pub recursion_limit: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            persist_execution_state: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    AwaitingModel,
    Terminated,
}

impl TurnPhase {
    /// The only transition: a response was obtained
    fn next(self) -> Self {
        match self {
            TurnPhase::AwaitingModel | TurnPhase::Terminated => TurnPhase::Terminated,
        }
    }
}

/// What the model produced for a turn. A response carrying tool requests is never terminal,
/// even when it also carries text.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    Final(Message),
    ToolCalls {
        message: Message,
        requests: Vec<ToolRequest>,
    },
}

impl ModelResponse {
    pub fn message(&self) -> &Message {
        match self {
            ModelResponse::Final(message) => message,
            ModelResponse::ToolCalls { message, .. } => message,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ModelResponse::Final(_))
    }

    pub fn tool_requests(&self) -> &[ToolRequest] {
        match self {
            ModelResponse::Final(_) => &[],
            ModelResponse::ToolCalls { requests, .. } => requests,
        }
    }
}

impl From<Message> for ModelResponse {
    fn from(message: Message) -> Self {
        let requests: Vec<ToolRequest> = message.tool_requests().into_iter().cloned().collect();
        if requests.is_empty() {
            ModelResponse::Final(message)
        } else {
            ModelResponse::ToolCalls { message, requests }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub done: bool,
    pub phase: TurnPhase,
    pub response: ModelResponse,
    pub usage: Usage,
}

/// Owns the provider handle and the turn policy. Holds no per-conversation state, so one
/// controller serves every session; the caller serializes turns within a session.
pub struct TurnController {
    provider: Arc<dyn Provider>,
    config: ControllerConfig,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl TurnController {
    pub fn new(provider: Arc<dyn Provider>, config: ControllerConfig) -> Self {
        let checkpoints: Option<Arc<dyn CheckpointStore>> = if config.persist_execution_state {
            Some(Arc::new(MemoryCheckpointStore::new()))
        } else {
            None
        };
        Self {
            provider,
            config,
            checkpoints,
        }
    }

    /// Use a specific checkpoint store instead of the in-memory one
    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn checkpoints(&self) -> Option<&Arc<dyn CheckpointStore>> {
        self.checkpoints.as_ref()
    }

    /// The fixed system message followed by the full history, in order. Instructions the
    /// client placed in the history are forwarded; only a copy of the fixed prompt is dropped.
    fn compose(&self, state: &ConversationState) -> Vec<Message> {
        let prompt = self.config.system_prompt.as_str();
        let mut outbound = Vec::with_capacity(state.messages.len() + 1);
        outbound.push(Message::system().with_text(prompt));
        outbound.extend(
            state
                .messages
                .iter()
                .filter(|message| !(message.role == Role::System && message.text() == prompt))
                .cloned(),
        );
        outbound
    }

    /// Run one turn. The input is only borrowed: on failure nothing has changed, on success
    /// the next state is a fresh value.
    pub async fn advance(&self, state: &ConversationState) -> Result<TurnOutcome, TurnError> {
        let phase = TurnPhase::AwaitingModel;
        let outbound = self.compose(state);
        let tools: Vec<Tool> = state.tools().cloned().collect();
        let options = CompletionOptions {
            parallel_tool_calls: false,
        };

        tracing::debug!(
            messages = outbound.len(),
            tools = tools.len(),
            "invoking model"
        );
        let (message, usage) = self
            .provider
            .complete(&outbound, &tools, &options)
            .await
            .map_err(|e| {
                tracing::error!("model invocation failed: {:#}", e);
                TurnError::ModelInvocation(e)
            })?;
        let phase = phase.next();

        let response = ModelResponse::from(message);
        let mut next = state.clone();
        let done = match &response {
            ModelResponse::Final(message) => {
                next.push(message.clone());
                true
            }
            ModelResponse::ToolCalls { requests, .. } => {
                tracing::info!(requests = requests.len(), "model requested tool calls");
                false
            }
        };

        Ok(TurnOutcome {
            state: next,
            done,
            phase,
            response,
            usage,
        })
    }
}
