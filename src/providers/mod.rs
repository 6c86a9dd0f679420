use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::StepResult;

/// Options forwarded verbatim to the completion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_tokens: None,
        }
    }
}

/// Opaque long-latency completion call. Callers must assume unbounded
/// latency; all timeout, retry, and backoff logic belongs to the resource
/// governor, never to implementations of this trait.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;
}

/// Input handed to a work executor for one step attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInput {
    pub text: String,
    /// Recovery or retry guidance prepended by the kernel, if any.
    pub instruction: Option<String>,
    /// 1-based attempt number for this logical step.
    pub attempt: u32,
}

impl StepInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            instruction: None,
            attempt: 1,
        }
    }
}

/// An agent-shaped capability that performs one step of work. The kernel may
/// invoke `execute` more than once for the same logical step after a timeout,
/// so implementations must be idempotent-safe to retry.
#[async_trait]
pub trait WorkExecutor: Send + Sync {
    async fn execute(&self, input: StepInput) -> Result<StepResult>;

    /// True once the executor has reached its terminal state. The plan loop
    /// treats selecting a finished executor as normal completion.
    fn is_finished(&self) -> bool {
        false
    }
}
