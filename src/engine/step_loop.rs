use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::governor::ResourceGovernor;
use crate::providers::{StepInput, WorkExecutor};
use crate::types::{AgentId, LoopState, StepResult, StepSummary};

/// How many characters of a prior output must reappear for the near-duplicate
/// rule to fire.
const STUCK_PREFIX_LEN: usize = 50;

/// Fixed strategy list cycled through on stuck detection.
pub const RECOVERY_STRATEGIES: [&str; 5] = [
    "Approach the task from a different angle and avoid repeating earlier output.",
    "Break the current objective into smaller concrete sub-tasks and address the first one.",
    "Summarize what has been accomplished so far, then state the single next action.",
    "Re-read the original task statement and identify what is still missing.",
    "Discard the current line of work and produce a minimal first version instead.",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub from_agent: bool,
    pub content: String,
}

/// Flags a repetition loop: among the last five agent-produced entries of the
/// recent history, the newest either exactly duplicates a prior one or shares
/// a 50-character prefix with at least two of them.
pub fn is_stuck(messages: &[AgentMessage]) -> bool {
    let recent = &messages[messages.len().saturating_sub(10)..];
    let outputs: Vec<&str> = recent
        .iter()
        .filter(|message| message.from_agent)
        .map(|message| message.content.as_str())
        .collect();
    let window = &outputs[outputs.len().saturating_sub(5)..];

    let Some((current, prior)) = window.split_last() else {
        return false;
    };
    if prior.is_empty() {
        return false;
    }

    if prior.contains(current) {
        return true;
    }

    let prefix: String = current.chars().take(STUCK_PREFIX_LEN).collect();
    if prefix.is_empty() {
        return false;
    }
    let matches = prior
        .iter()
        .filter(|output| {
            output.chars().take(STUCK_PREFIX_LEN).collect::<String>() == prefix
        })
        .count();
    matches >= 2
}

/// Drives one agent through a bounded number of executor steps with stuck
/// detection. Stuck recovery is a state transition, not an error: the loop
/// passes through `Recovering`, resets its step counter, and prepends the
/// chosen strategy to the next instruction.
pub struct AgentLoop {
    id: AgentId,
    task: String,
    state: LoopState,
    current_step: usize,
    messages: VecDeque<AgentMessage>,
    executor: Arc<dyn WorkExecutor>,
    governor: Arc<ResourceGovernor>,
    config: KernelConfig,
}

impl AgentLoop {
    pub fn new(
        task: impl Into<String>,
        executor: Arc<dyn WorkExecutor>,
        governor: Arc<ResourceGovernor>,
        config: KernelConfig,
    ) -> Self {
        Self {
            id: AgentId::new_v4(),
            task: task.into(),
            state: LoopState::Idle,
            current_step: 0,
            messages: VecDeque::new(),
            executor,
            governor,
            config,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn messages(&self) -> impl Iterator<Item = &AgentMessage> {
        self.messages.iter()
    }

    fn push_message(&mut self, from_agent: bool, content: String) {
        let capacity = self.config.message_log_capacity.max(1);
        while self.messages.len() >= capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(AgentMessage { from_agent, content });
    }

    /// Run the loop to completion, max-steps exhaustion, or failure. Fails
    /// with `InvalidState` unless the agent is idle; after max-steps
    /// exhaustion the agent resets to idle and stays reusable.
    pub async fn run(
        &mut self,
        initial_input: Option<String>,
    ) -> Result<StepSummary, KernelError> {
        if self.state != LoopState::Idle {
            return Err(KernelError::InvalidState(format!(
                "agent {} is {:?}, expected idle",
                self.id, self.state
            )));
        }
        self.state = LoopState::Running;

        let mut pending_instruction = initial_input;
        let mut steps_taken = 0;
        let mut recoveries = 0;

        loop {
            if self.state == LoopState::Finished {
                break;
            }
            if self.current_step >= self.config.max_steps {
                // Reset so the agent can be run again.
                self.current_step = 0;
                self.state = LoopState::Idle;
                return Ok(StepSummary {
                    steps_taken,
                    recoveries,
                    terminated_early: true,
                    message: "terminated: max steps reached".to_string(),
                });
            }
            self.current_step += 1;
            steps_taken += 1;

            if let Some(instruction) = &pending_instruction {
                self.push_message(false, instruction.clone());
            }
            let input = StepInput {
                text: self.task.clone(),
                instruction: pending_instruction.take(),
                attempt: 1,
            };

            let operation = format!("agent:{}", self.id);
            let executor = Arc::clone(&self.executor);
            let result = self
                .governor
                .execute(&operation, self.config.step_timeout, async move {
                    let result = executor.execute(input).await?;
                    if let StepResult::Error(message) = &result {
                        return Err(anyhow!("executor reported error: {message}"));
                    }
                    Ok(result)
                })
                .await;

            let output = match result {
                Ok(output) => output,
                Err(error) => {
                    self.push_message(false, format!("step failed: {error}"));
                    self.state = LoopState::Error;
                    return Err(error);
                }
            };

            let content = match output {
                StepResult::Text(text) => text,
                StepResult::Data(value) => value.to_string(),
                StepResult::Error(_) => unreachable!("mapped to Err above"),
            };
            self.push_message(true, content);

            if self.executor.is_finished() {
                self.state = LoopState::Finished;
                continue;
            }

            let history: Vec<AgentMessage> = self.messages.iter().cloned().collect();
            if is_stuck(&history) {
                let strategy = RECOVERY_STRATEGIES[(self.current_step / 2) % 5];
                log::info!(
                    "agent {} stuck at step {}, recovering with strategy: {}",
                    self.id,
                    self.current_step,
                    strategy
                );
                self.state = LoopState::Recovering;
                self.current_step = 0;
                recoveries += 1;
                pending_instruction = Some(strategy.to_string());
                self.state = LoopState::Running;
            }
        }

        Ok(StepSummary {
            steps_taken,
            recoveries,
            terminated_early: false,
            message: "finished".to_string(),
        })
    }
}
