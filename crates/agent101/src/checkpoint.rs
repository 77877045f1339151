use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::state::ConversationState;

/// Snapshots of conversation state keyed by session id
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, session_id: &str, state: &ConversationState) -> Result<()>;

    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>>;
}

/// Keeps checkpoints for the life of the process
#[derive(Default)]
pub struct MemoryCheckpointStore {
    sessions: RwLock<HashMap<String, ConversationState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, session_id: &str, state: &ConversationState) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), state.clone());
        tracing::debug!(session_id, messages = state.messages.len(), "checkpoint saved");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }
}
