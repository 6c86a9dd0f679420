use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{FlowState, StepResult, WorkItemId, WorkItemStatus};

/// Execution envelope around a plan run. `error_count` resets to zero on any
/// successful step; the flow fails only once the count exceeds the configured
/// ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRunState {
    pub state: FlowState,
    pub started_at: DateTime<Utc>,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub data: HashMap<String, serde_json::Value>,
}

impl FlowRunState {
    pub fn new() -> Self {
        Self {
            state: FlowState::Created,
            started_at: Utc::now(),
            error_count: 0,
            last_error: None,
            data: HashMap::new(),
        }
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.error_count += 1;
        self.last_error = Some(error.into());
    }

    pub fn record_success(&mut self) {
        self.error_count = 0;
    }
}

impl Default for FlowRunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary returned by the single-agent step loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSummary {
    pub steps_taken: usize,
    pub recoveries: usize,
    pub terminated_early: bool,
    pub message: String,
}

/// Outcome of one work item inside a coordinated batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: WorkItemId,
    pub status: WorkItemStatus,
    pub result: Option<StepResult>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Aggregated result of a coordination batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub outcomes: HashMap<WorkItemId, ItemOutcome>,
    pub all_succeeded: bool,
    pub total_elapsed_ms: u64,
}
