use anyhow::anyhow;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::governor::ResourceGovernor;
use crate::providers::{StepInput, WorkExecutor};
use crate::registry::AgentRegistry;
use crate::types::{
    AgentState, BatchOutcome, ItemOutcome, StepResult, WorkItem, WorkItemId, WorkItemStatus,
};

/// Batches independent work items across roles, resolving the dependency DAG
/// and running every ready item concurrently. A single item's failure is
/// recorded for that item only; only an unsatisfiable dependency (cycle or
/// unknown reference) fails the whole batch.
pub struct CoordinationHub {
    config: KernelConfig,
    governor: Arc<ResourceGovernor>,
    registry: Arc<AgentRegistry>,
    executors: HashMap<String, Arc<dyn WorkExecutor>>,
    default_executor: Option<Arc<dyn WorkExecutor>>,
}

impl CoordinationHub {
    pub fn new(
        config: KernelConfig,
        governor: Arc<ResourceGovernor>,
        registry: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            config,
            governor,
            registry,
            executors: HashMap::new(),
            default_executor: None,
        }
    }

    pub fn register_role(
        mut self,
        role: impl Into<String>,
        executor: Arc<dyn WorkExecutor>,
    ) -> Self {
        self.executors.insert(role.into(), executor);
        self
    }

    pub fn with_default_executor(mut self, executor: Arc<dyn WorkExecutor>) -> Self {
        self.default_executor = Some(executor);
        self
    }

    /// Execute a batch. Terminates when the queue empties or with
    /// `UnsatisfiableDependency` when no pending item can ever become ready
    /// -- never by hanging.
    pub async fn coordinate(
        &self,
        items: Vec<WorkItem>,
    ) -> Result<BatchOutcome, KernelError> {
        let batch_started = Instant::now();
        let mut queue = items;
        let mut outcomes: HashMap<WorkItemId, ItemOutcome> = HashMap::new();

        while !queue.is_empty() {
            let (mut ready, rest): (Vec<WorkItem>, Vec<WorkItem>) =
                queue.into_iter().partition(|item| {
                    item.dependencies
                        .iter()
                        .all(|dep| outcomes.contains_key(dep))
                });

            if ready.is_empty() {
                return Err(KernelError::UnsatisfiableDependency {
                    remaining: rest.into_iter().map(|item| item.id).collect(),
                });
            }

            // Higher priority launches first; all ready items still overlap.
            ready.sort_by(|a, b| b.priority.cmp(&a.priority));

            let tasks = ready.into_iter().map(|item| self.run_item(item));
            for outcome in join_all(tasks).await {
                outcomes.insert(outcome.item_id.clone(), outcome);
            }

            queue = rest;
        }

        let all_succeeded = outcomes
            .values()
            .all(|outcome| outcome.status == WorkItemStatus::Completed);
        Ok(BatchOutcome {
            outcomes,
            all_succeeded,
            total_elapsed_ms: batch_started.elapsed().as_millis() as u64,
        })
    }

    /// Run one item to a recorded outcome. Every failure is caught here so a
    /// bad item can never cancel its concurrently running siblings.
    async fn run_item(&self, mut item: WorkItem) -> ItemOutcome {
        let started = Instant::now();
        let agent_id = self.registry.register(item.title.clone());
        let _ = self.registry.update_state(agent_id, AgentState::Running, 0.0);
        item.status = WorkItemStatus::Running;

        let executor = self
            .executors
            .get(&item.to_role)
            .or(self.default_executor.as_ref());
        let Some(executor) = executor else {
            let _ = self.registry.update_state(agent_id, AgentState::Error, 0.0);
            return ItemOutcome {
                item_id: item.id,
                status: WorkItemStatus::Failed,
                result: None,
                error: Some(
                    KernelError::NoExecutorAvailable(item.title.clone()).to_string(),
                ),
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
        };

        let mut text = item.title.clone();
        if !item.deliverables.is_empty() {
            text.push_str("\nDeliverables: ");
            text.push_str(&item.deliverables.join(", "));
        }
        let input = StepInput::new(text);

        let operation = format!("role:{}", item.to_role);
        let executor = Arc::clone(executor);
        let outcome = self
            .governor
            .execute(&operation, self.config.step_timeout, async move {
                let result = executor.execute(input).await?;
                if let StepResult::Error(message) = &result {
                    return Err(anyhow!("executor reported error: {message}"));
                }
                Ok(result)
            })
            .await;

        match outcome {
            Ok(result) => {
                let _ = self
                    .registry
                    .update_state(agent_id, AgentState::Completed, 1.0);
                item.status = WorkItemStatus::Completed;
                ItemOutcome {
                    item_id: item.id,
                    status: item.status,
                    result: Some(result),
                    error: None,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }
            }
            Err(error) => {
                let _ = self.registry.update_state(agent_id, AgentState::Error, 0.0);
                item.status = WorkItemStatus::Failed;
                ItemOutcome {
                    item_id: item.id,
                    status: item.status,
                    result: None,
                    error: Some(error.to_string()),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }
            }
        }
    }
}
