use agent101::runner::Runner;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared application state, built once at startup and handed to every route
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<Runner>,
    pub agent_name: Arc<str>,
    pub lanes: SessionLanes,
}

impl AppState {
    pub fn new(runner: Runner, agent_name: impl Into<Arc<str>>) -> Self {
        Self {
            runner: Arc::new(runner),
            agent_name: agent_name.into(),
            lanes: SessionLanes::default(),
        }
    }
}

/// One lock per session, so turns within a session run one after another while
/// different sessions proceed independently
#[derive(Clone, Default)]
pub struct SessionLanes {
    lanes: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionLanes {
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lane = {
            let mut lanes = self.lanes.lock().await;
            // drop lanes nobody holds or waits on
            lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
            lanes.entry(session_id.to_string()).or_default().clone()
        };
        lane.lock_owned().await
    }
}
