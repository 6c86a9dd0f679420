use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::governor::ResourceGovernor;
use crate::providers::{CompletionOptions, CompletionService, StepInput, WorkExecutor};
use crate::types::{FlowRunState, FlowState, Plan, StepResult, StepStatus};

/// Executes an ordered plan: one in-flight step at a time, retried with
/// progressive timeouts, blocked steps skipped rather than aborting the run.
/// `run` always returns a structured `FlowRunState`; only the flow's error
/// ceiling or a missing executor registry turns the whole run failed.
pub struct PlanRunner {
    config: KernelConfig,
    governor: Arc<ResourceGovernor>,
    executors: HashMap<String, Arc<dyn WorkExecutor>>,
    executor_priority: Vec<String>,
    primary_executor: Option<String>,
    completion: Option<Arc<dyn CompletionService>>,
}

impl PlanRunner {
    pub fn new(config: KernelConfig, governor: Arc<ResourceGovernor>) -> Self {
        Self {
            config,
            governor,
            executors: HashMap::new(),
            executor_priority: Vec::new(),
            primary_executor: None,
            completion: None,
        }
    }

    pub fn register_executor(
        mut self,
        key: impl Into<String>,
        executor: Arc<dyn WorkExecutor>,
    ) -> Self {
        self.executors.insert(key.into(), executor);
        self
    }

    pub fn with_priority(mut self, keys: Vec<String>) -> Self {
        self.executor_priority = keys;
        self
    }

    pub fn with_primary(mut self, key: impl Into<String>) -> Self {
        self.primary_executor = Some(key.into());
        self
    }

    pub fn with_completion(mut self, completion: Arc<dyn CompletionService>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Deterministic executor selection, first match wins: exact type-tag
    /// key, case-insensitive substring of a key, first present key from the
    /// priority list, the designated primary, then any registered executor.
    fn select_executor(
        &self,
        type_tag: Option<&str>,
        step_text: &str,
    ) -> Result<(String, Arc<dyn WorkExecutor>), KernelError> {
        if self.executors.is_empty() {
            return Err(KernelError::NoExecutorAvailable(step_text.to_string()));
        }

        if let Some(tag) = type_tag {
            if let Some(executor) = self.executors.get(tag) {
                return Ok((tag.to_string(), Arc::clone(executor)));
            }
            let needle = tag.to_lowercase();
            let mut keys: Vec<&String> = self.executors.keys().collect();
            keys.sort();
            for key in &keys {
                if key.to_lowercase().contains(&needle) {
                    return Ok(((*key).clone(), Arc::clone(&self.executors[*key])));
                }
            }
        }

        for key in &self.executor_priority {
            if let Some(executor) = self.executors.get(key) {
                return Ok((key.clone(), Arc::clone(executor)));
            }
        }

        if let Some(key) = &self.primary_executor {
            if let Some(executor) = self.executors.get(key) {
                return Ok((key.clone(), Arc::clone(executor)));
            }
        }

        let mut keys: Vec<&String> = self.executors.keys().collect();
        keys.sort();
        let key = keys[0].clone();
        let executor = Arc::clone(&self.executors[&key]);
        Ok((key, executor))
    }

    /// Drive the plan to completion. Already-completed steps are never
    /// re-executed, so re-running a finished plan is a no-op.
    pub async fn run(&self, plan: &mut Plan) -> FlowRunState {
        let mut flow = FlowRunState::new();
        flow.state = FlowState::Running;
        let run_started = Instant::now();
        let mut iterations = 0usize;

        loop {
            let Some(index) = plan.next_actionable() else {
                flow.state = FlowState::Completed;
                break;
            };

            iterations += 1;
            if iterations > self.config.max_iterations {
                flow.data.insert(
                    "halt_reason".to_string(),
                    serde_json::json!("max iterations reached"),
                );
                flow.state = FlowState::Completed;
                break;
            }
            if run_started.elapsed() >= self.config.total_timeout {
                flow.data.insert(
                    "halt_reason".to_string(),
                    serde_json::json!("total timeout reached"),
                );
                flow.state = FlowState::Completed;
                break;
            }

            let (key, executor) = match self
                .select_executor(plan.steps[index].type_tag.as_deref(), &plan.steps[index].text)
            {
                Ok(selected) => selected,
                Err(error) => {
                    flow.record_error(error.to_string());
                    flow.state = FlowState::Failed;
                    break;
                }
            };

            if executor.is_finished() {
                // The executor reached its terminal state; treat the plan as
                // naturally complete.
                flow.data.insert(
                    "halt_reason".to_string(),
                    serde_json::json!(format!("executor '{key}' finished")),
                );
                flow.state = FlowState::Completed;
                break;
            }

            plan.steps[index].status = StepStatus::InProgress;
            debug_assert_eq!(plan.in_progress_count(), 1);

            match self.run_step(plan, index, &key, executor, &mut flow).await {
                StepAftermath::Continue => {}
                StepAftermath::CeilingExhausted => {
                    flow.state = FlowState::Failed;
                    break;
                }
            }
        }

        self.finalize(plan, &mut flow).await;
        flow
    }

    async fn run_step(
        &self,
        plan: &mut Plan,
        index: usize,
        key: &str,
        executor: Arc<dyn WorkExecutor>,
        flow: &mut FlowRunState,
    ) -> StepAftermath {
        let operation = format!("executor:{key}");
        let mut attempt: u32 = 1;

        loop {
            let timeout = self.config.timeout_for_attempt(attempt);
            let input = StepInput {
                text: plan.steps[index].text.clone(),
                instruction: plan.steps[index].notes.last().cloned(),
                attempt,
            };
            let step_executor = Arc::clone(&executor);
            let outcome = self
                .governor
                .execute(&operation, timeout, async move {
                    let result = step_executor.execute(input).await?;
                    if let StepResult::Error(message) = &result {
                        return Err(anyhow!("executor reported error: {message}"));
                    }
                    Ok(result)
                })
                .await;

            match outcome {
                Ok(result) => {
                    plan.steps[index].status = StepStatus::Completed;
                    flow.record_success();
                    if let Ok(value) = serde_json::to_value(&result) {
                        flow.data.insert(format!("step_{index}"), value);
                    }
                    return StepAftermath::Continue;
                }
                Err(error) => {
                    log::debug!(
                        "step {} attempt {} via '{}' failed: {}",
                        index,
                        attempt,
                        key,
                        error
                    );
                    flow.record_error(error.to_string());
                    if flow.error_count > self.config.max_errors {
                        plan.steps[index].status = StepStatus::Blocked;
                        return StepAftermath::CeilingExhausted;
                    }
                    if attempt >= self.config.max_retries || !error.is_retryable() {
                        plan.steps[index].status = StepStatus::Blocked;
                        plan.steps[index]
                            .notes
                            .push(format!("blocked after {attempt} attempts: {error}"));
                        return StepAftermath::Continue;
                    }
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// Best-effort summary of the finished run. One completion call with a
    /// single deliberate fallback on failure; never a retry loop, and a
    /// failure here only logs.
    async fn finalize(&self, plan: &Plan, flow: &mut FlowRunState) {
        let Some(completion) = &self.completion else {
            return;
        };

        let prompt = format!(
            "Summarize the outcome of a {}-step plan: {} completed, {} blocked. Steps: {}",
            plan.steps.len(),
            plan.completed_count(),
            plan.steps
                .iter()
                .filter(|step| step.status == StepStatus::Blocked)
                .count(),
            plan.steps
                .iter()
                .map(|step| step.text.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        );
        let options = CompletionOptions::default();

        let service = Arc::clone(completion);
        let first = self
            .governor
            .execute("plan:finalize", self.config.step_timeout, async move {
                service.complete(&prompt, &options).await
            })
            .await;

        let summary = match first {
            Ok(summary) => Some(summary),
            Err(error) => {
                log::warn!("plan summary failed, using fallback: {error}");
                let fallback_prompt = format!(
                    "Briefly state that a {}-step plan finished with {} steps completed.",
                    plan.steps.len(),
                    plan.completed_count(),
                );
                let options = CompletionOptions::default();
                let service = Arc::clone(completion);
                match self
                    .governor
                    .execute("plan:finalize", self.config.step_timeout, async move {
                        service.complete(&fallback_prompt, &options).await
                    })
                    .await
                {
                    Ok(summary) => Some(summary),
                    Err(error) => {
                        log::warn!("fallback plan summary failed: {error}");
                        None
                    }
                }
            }
        };

        if let Some(summary) = summary {
            flow.data
                .insert("summary".to_string(), serde_json::json!(summary));
        }
    }
}

enum StepAftermath {
    Continue,
    CeilingExhausted,
}
