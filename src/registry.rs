use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::Utc;

use crate::error::KernelError;
use crate::types::{AgentId, AgentRecord, AgentState, AgentStateChange};

struct RegistryEntry {
    record: AgentRecord,
    history: VecDeque<AgentStateChange>,
}

/// The agent record table. All mutation funnels through `update_state`,
/// which serializes per-table, stamps the change, and appends to a bounded
/// diagnostic history.
pub struct AgentRegistry {
    entries: RwLock<HashMap<AgentId, RegistryEntry>>,
    history_capacity: usize,
}

impl AgentRegistry {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            history_capacity: history_capacity.max(1),
        }
    }

    pub fn register(&self, task: impl Into<String>) -> AgentId {
        let record = AgentRecord::new(AgentId::new_v4(), task);
        let id = record.id;
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            id,
            RegistryEntry {
                record,
                history: VecDeque::new(),
            },
        );
        id
    }

    /// Atomic state update: mutates the record, timestamps it, and appends
    /// to the history log, evicting the oldest entry past capacity.
    pub fn update_state(
        &self,
        id: AgentId,
        state: AgentState,
        progress: f32,
    ) -> Result<(), KernelError> {
        let mut entries = self.entries.write().unwrap();
        let Some(entry) = entries.get_mut(&id) else {
            return Err(KernelError::InvalidState(format!(
                "unknown agent: {id}"
            )));
        };

        let now = Utc::now();
        entry.record.state = state;
        entry.record.progress = progress.clamp(0.0, 1.0);
        entry.record.updated_at = now;

        if entry.history.len() == self.history_capacity {
            entry.history.pop_front();
        }
        entry.history.push_back(AgentStateChange {
            state,
            progress: entry.record.progress,
            at: now,
        });

        Ok(())
    }

    pub fn get(&self, id: AgentId) -> Option<AgentRecord> {
        let entries = self.entries.read().unwrap();
        entries.get(&id).map(|entry| entry.record.clone())
    }

    pub fn list(&self) -> Vec<AgentRecord> {
        let entries = self.entries.read().unwrap();
        entries.values().map(|entry| entry.record.clone()).collect()
    }

    pub fn history(&self, id: AgentId) -> Vec<AgentStateChange> {
        let entries = self.entries.read().unwrap();
        entries
            .get(&id)
            .map(|entry| entry.history.iter().cloned().collect())
            .unwrap_or_default()
    }
}
