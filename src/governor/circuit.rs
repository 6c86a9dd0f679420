use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::error::KernelError;
use crate::types::CircuitState;

#[derive(Debug, Clone)]
pub struct CircuitEntry {
    pub consecutive_failures: u32,
    pub state: CircuitState,
    pub opened_at: Option<Instant>,
}

impl CircuitEntry {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            state: CircuitState::Closed,
            opened_at: None,
        }
    }
}

/// Per-operation-key circuit breaker table. Shared across every plan and
/// agent that goes through the same governor.
pub struct CircuitBreaker {
    entries: RwLock<HashMap<String, CircuitEntry>>,
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            failure_threshold,
            recovery_timeout,
        }
    }

    /// Gate a call before it runs. While open the call fails fast; once the
    /// recovery window has elapsed the circuit moves to half-open and admits
    /// exactly one trial. Further callers are rejected until that trial
    /// resolves through `record_success` or `record_failure`.
    pub fn check(&self, operation: &str) -> Result<(), KernelError> {
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .entry(operation.to_string())
            .or_insert_with(CircuitEntry::new);

        match entry.state {
            CircuitState::Closed => Ok(()),
            // The one admitted trial is still in flight.
            CircuitState::HalfOpen => Err(KernelError::CircuitOpen {
                operation: operation.to_string(),
            }),
            CircuitState::Open => {
                let elapsed = entry
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.recovery_timeout {
                    entry.state = CircuitState::HalfOpen;
                    log::info!("circuit '{}' half-open after {:?}", operation, elapsed);
                    Ok(())
                } else {
                    Err(KernelError::CircuitOpen {
                        operation: operation.to_string(),
                    })
                }
            }
        }
    }

    pub fn record_success(&self, operation: &str) {
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .entry(operation.to_string())
            .or_insert_with(CircuitEntry::new);
        if entry.state != CircuitState::Closed {
            log::info!("circuit '{}' closed", operation);
        }
        entry.consecutive_failures = 0;
        entry.state = CircuitState::Closed;
        entry.opened_at = None;
    }

    pub fn record_failure(&self, operation: &str) {
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .entry(operation.to_string())
            .or_insert_with(CircuitEntry::new);
        entry.consecutive_failures += 1;

        // A half-open trial failure re-opens and restarts the recovery timer.
        if entry.state == CircuitState::HalfOpen
            || entry.consecutive_failures >= self.failure_threshold
        {
            if entry.state != CircuitState::Open {
                log::warn!(
                    "circuit '{}' open after {} consecutive failures",
                    operation,
                    entry.consecutive_failures
                );
            }
            entry.state = CircuitState::Open;
            entry.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self, operation: &str) -> CircuitState {
        let entries = self.entries.read().unwrap();
        entries
            .get(operation)
            .map(|entry| entry.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn consecutive_failures(&self, operation: &str) -> u32 {
        let entries = self.entries.read().unwrap();
        entries
            .get(operation)
            .map(|entry| entry.consecutive_failures)
            .unwrap_or(0)
    }
}
