use std::time::Duration;

/// Every knob the kernel recognizes. Passed explicitly at construction;
/// there is no ambient configuration inside the kernel.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Base timeout for a single governed step attempt.
    pub step_timeout: Duration,
    /// Wall-clock ceiling for an entire plan run. Also caps any single
    /// progressive attempt timeout.
    pub total_timeout: Duration,
    /// Hard ceiling on plan loop passes.
    pub max_iterations: usize,
    /// Attempts per step before it is marked blocked.
    pub max_retries: u32,
    /// Fixed delay between retry attempts.
    pub retry_delay: Duration,
    pub enable_progressive_timeout: bool,
    /// Geometric growth factor applied per attempt.
    pub progressive_timeout_factor: f64,
    /// How long an open circuit waits before allowing a half-open trial.
    pub recovery_timeout: Duration,
    /// Maximum concurrent in-flight external calls, system-wide.
    pub concurrency_limit: usize,
    /// Consecutive failures that open a circuit.
    pub failure_threshold: u32,
    /// Flow error ceiling; exceeding it fails the run.
    pub max_errors: u32,
    /// Step loop iteration bound before the agent resets to idle.
    pub max_steps: usize,
    /// Capacity of each agent's message log and per-agent state history.
    pub message_log_capacity: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
            total_timeout: Duration::from_secs(300),
            max_iterations: 100,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            enable_progressive_timeout: true,
            progressive_timeout_factor: 2.0,
            recovery_timeout: Duration::from_secs(10),
            concurrency_limit: 5,
            failure_threshold: 3,
            max_errors: 10,
            max_steps: 25,
            message_log_capacity: 50,
        }
    }
}

impl KernelConfig {
    /// Derived timeout for a 1-based attempt number:
    /// `min(step_timeout * factor^(attempt-1), total_timeout)`.
    /// With progressive timeouts disabled every attempt gets the base
    /// timeout, still capped by the total.
    pub fn timeout_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.step_timeout.as_secs_f64();
        let scaled = if self.enable_progressive_timeout && attempt > 1 {
            base * self.progressive_timeout_factor.powi(attempt as i32 - 1)
        } else {
            base
        };
        let capped = scaled.min(self.total_timeout.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progressive_timeout_growth() {
        let config = KernelConfig {
            step_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(50),
            progressive_timeout_factor: 2.0,
            enable_progressive_timeout: true,
            ..Default::default()
        };

        assert_eq!(config.timeout_for_attempt(1), Duration::from_secs(10));
        assert_eq!(config.timeout_for_attempt(2), Duration::from_secs(20));
        assert_eq!(config.timeout_for_attempt(3), Duration::from_secs(40));
        // Capped by the total from attempt 4 on.
        assert_eq!(config.timeout_for_attempt(4), Duration::from_secs(50));
        assert_eq!(config.timeout_for_attempt(10), Duration::from_secs(50));
    }

    #[test]
    fn test_progressive_timeout_disabled() {
        let config = KernelConfig {
            step_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(50),
            enable_progressive_timeout: false,
            ..Default::default()
        };

        assert_eq!(config.timeout_for_attempt(1), Duration::from_secs(10));
        assert_eq!(config.timeout_for_attempt(5), Duration::from_secs(10));
    }
}
