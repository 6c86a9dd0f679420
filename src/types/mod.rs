pub mod agent;
pub mod flow;
pub mod plan;
pub mod work_item;

pub use agent::{AgentRecord, AgentStateChange};
pub use flow::{BatchOutcome, FlowRunState, ItemOutcome, StepSummary};
pub use plan::{Plan, PlanStep};
pub use work_item::WorkItem;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AgentId = Uuid;
pub type WorkItemId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Unknown,
    Initializing,
    Running,
    Waiting,
    Completed,
    Error,
    Terminated,
}

impl AgentState {
    pub fn as_str(&self) -> &str {
        match self {
            AgentState::Unknown => "unknown",
            AgentState::Initializing => "initializing",
            AgentState::Running => "running",
            AgentState::Waiting => "waiting",
            AgentState::Completed => "completed",
            AgentState::Error => "error",
            AgentState::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Completed | FlowState::Failed | FlowState::Cancelled
        )
    }
}

/// States of the single-agent step loop. Stuck recovery is an explicit
/// transition (Running -> Recovering -> Running), not an error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Running,
    Recovering,
    Finished,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Closed set of step payload shapes. The plan and coordination layers
/// match on this instead of inspecting open maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StepResult {
    Text(String),
    Data(serde_json::Value),
    Error(String),
}

impl StepResult {
    pub fn is_error(&self) -> bool {
        matches!(self, StepResult::Error(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StepResult::Text(text) => Some(text),
            _ => None,
        }
    }
}
