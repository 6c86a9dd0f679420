use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy for the kernel. Per-step and per-item failures are
/// caught and recorded locally; only `UnsatisfiableDependency` and a flow's
/// exhausted error ceiling terminate a whole run.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("operation timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("circuit open for operation '{operation}'")]
    CircuitOpen { operation: String },

    #[error("service error: {0}")]
    Service(anyhow::Error),

    #[error("unsatisfiable dependencies, remaining items: {remaining:?}")]
    UnsatisfiableDependency { remaining: Vec<String> },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("no executor available for step '{0}'")]
    NoExecutorAvailable(String),
}

impl KernelError {
    /// Kinds the plan loop may retry after its backoff delay. The governor
    /// itself never retries; a circuit rejection is fail-fast there but the
    /// circuit may have recovered by the next attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KernelError::Timeout { .. }
                | KernelError::Service(_)
                | KernelError::CircuitOpen { .. }
        )
    }
}
