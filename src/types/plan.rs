use serde::{Deserialize, Serialize};

use super::StepStatus;

/// One step of an ordered plan. Steps are mutated in place by index and
/// never reordered while a run is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub text: String,
    pub type_tag: Option<String>,
    pub status: StepStatus,
    pub notes: Vec<String>,
}

impl PlanStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            type_tag: None,
            status: StepStatus::NotStarted,
            notes: Vec::new(),
        }
    }

    pub fn with_type_tag(mut self, tag: impl Into<String>) -> Self {
        self.type_tag = Some(tag.into());
        self
    }
}

/// An ordered sequence of steps owned by exactly one plan run.
/// Invariant: at most one step is in progress at any instant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    /// Index of the first step still needing work, in plan order.
    pub fn next_actionable(&self) -> Option<usize> {
        self.steps.iter().position(|step| {
            matches!(step.status, StepStatus::NotStarted | StepStatus::InProgress)
        })
    }

    pub fn in_progress_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::InProgress)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.next_actionable().is_none()
    }

    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Completed)
            .count()
    }
}
