use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{AgentId, AgentState};

/// Registry view of one agent. Written only through the registry's atomic
/// update, which stamps `updated_at` and appends to the bounded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub state: AgentState,
    pub task: String,
    pub progress: f32,
    pub dependencies: HashSet<AgentId>,
    pub updated_at: DateTime<Utc>,
}

impl AgentRecord {
    pub fn new(id: AgentId, task: impl Into<String>) -> Self {
        Self {
            id,
            state: AgentState::Unknown,
            task: task.into(),
            progress: 0.0,
            dependencies: HashSet::new(),
            updated_at: Utc::now(),
        }
    }
}

/// One entry of an agent's diagnostic history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStateChange {
    pub state: AgentState,
    pub progress: f32,
    pub at: DateTime<Utc>,
}
