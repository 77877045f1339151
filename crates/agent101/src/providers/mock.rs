use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{CompletionOptions, Provider, Usage};

/// One recorded call to the mock provider
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub options: CompletionOptions,
}

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Result<Message, String>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Create a mock provider whose responses may fail with the given error text
    pub fn with_results(responses: Vec<Result<Message, String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage)> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            options: *options,
        });

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok((Message::assistant().with_text(""), Usage::default()))
        } else {
            match responses.remove(0) {
                Ok(message) => Ok((message, Usage::default())),
                Err(error) => Err(anyhow!(error)),
            }
        }
    }
}
