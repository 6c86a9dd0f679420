use serde::{Deserialize, Serialize};

use super::{WorkItemId, WorkItemStatus};

/// A unit of cross-role work in a dependency-ordered batch. Created by a
/// planner, mutated only by the coordination hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    pub from_role: String,
    pub to_role: String,
    pub deliverables: Vec<String>,
    pub dependencies: Vec<WorkItemId>,
    pub priority: u32,
    pub status: WorkItemStatus,
}

impl WorkItem {
    pub fn new(id: impl Into<WorkItemId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            from_role: String::new(),
            to_role: String::new(),
            deliverables: Vec::new(),
            dependencies: Vec::new(),
            priority: 0,
            status: WorkItemStatus::Pending,
        }
    }

    pub fn with_roles(mut self, from_role: impl Into<String>, to_role: impl Into<String>) -> Self {
        self.from_role = from_role.into();
        self.to_role = to_role.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<WorkItemId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deliverables(mut self, deliverables: Vec<String>) -> Self {
        self.deliverables = deliverables;
        self
    }
}
