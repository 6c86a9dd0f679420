pub mod circuit;
pub mod limiter;
pub mod metrics;

pub use circuit::{CircuitBreaker, CircuitEntry};
pub use limiter::ConcurrencyLimiter;
pub use metrics::{GovernorMetrics, MetricsSnapshot};

use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::KernelConfig;
use crate::error::KernelError;

/// Bounds every external call the kernel makes: circuit gate, concurrency
/// permit, deadline, metrics. The only state shared across unrelated plans
/// and agents lives here.
pub struct ResourceGovernor {
    circuits: CircuitBreaker,
    limiter: ConcurrencyLimiter,
    metrics: GovernorMetrics,
}

impl ResourceGovernor {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            circuits: CircuitBreaker::new(config.failure_threshold, config.recovery_timeout),
            limiter: ConcurrencyLimiter::new(config.concurrency_limit),
            metrics: GovernorMetrics::new(),
        }
    }

    /// Run `future` under the full governance stack. A timeout abandons the
    /// call and discards its eventual result; a circuit already open fails
    /// fast without consuming a permit.
    pub async fn execute<T, F>(
        &self,
        operation: &str,
        timeout: Duration,
        future: F,
    ) -> Result<T, KernelError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        self.circuits.check(operation)?;

        let _permit = self.limiter.acquire().await;
        let started = Instant::now();

        let outcome = match tokio::time::timeout(timeout, future).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(KernelError::Service(error)),
            Err(_) => Err(KernelError::Timeout {
                elapsed: started.elapsed(),
            }),
        };

        let elapsed = started.elapsed();
        self.metrics.record(elapsed, outcome.is_ok());
        if elapsed > timeout {
            // Diagnostic only; the cancellation above is authoritative.
            log::warn!(
                "operation '{}' ran {:?} against a {:?} deadline",
                operation,
                elapsed,
                timeout
            );
        }

        match &outcome {
            Ok(_) => self.circuits.record_success(operation),
            Err(error) => {
                log::debug!("operation '{}' failed: {}", operation, error);
                self.circuits.record_failure(operation);
            }
        }

        outcome
    }

    pub fn circuits(&self) -> &CircuitBreaker {
        &self.circuits
    }

    pub fn metrics(&self) -> &GovernorMetrics {
        &self.metrics
    }

    pub fn in_flight(&self) -> usize {
        self.limiter.in_flight()
    }
}
