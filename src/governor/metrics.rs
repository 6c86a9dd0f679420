use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::Duration;

const LATENCY_WINDOW: usize = 1000;

struct MetricsInner {
    latencies: VecDeque<Duration>,
    total_calls: u64,
    error_calls: u64,
}

/// Rolling window over recent governed calls. Derived values are computed
/// from the current window on demand, never stored pre-aggregated.
pub struct GovernorMetrics {
    inner: RwLock<MetricsInner>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_calls: u64,
    pub error_calls: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub error_rate: f64,
}

impl GovernorMetrics {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MetricsInner {
                latencies: VecDeque::with_capacity(LATENCY_WINDOW),
                total_calls: 0,
                error_calls: 0,
            }),
        }
    }

    pub fn record(&self, latency: Duration, success: bool) {
        let mut inner = self.inner.write().unwrap();
        if inner.latencies.len() == LATENCY_WINDOW {
            inner.latencies.pop_front();
        }
        inner.latencies.push_back(latency);
        inner.total_calls += 1;
        if !success {
            inner.error_calls += 1;
        }
    }

    pub fn avg_latency(&self) -> Duration {
        let inner = self.inner.read().unwrap();
        if inner.latencies.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = inner.latencies.iter().sum();
        total / inner.latencies.len() as u32
    }

    pub fn p95(&self) -> Duration {
        let inner = self.inner.read().unwrap();
        if inner.latencies.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted: Vec<Duration> = inner.latencies.iter().copied().collect();
        sorted.sort();
        let rank = ((sorted.len() as f64) * 0.95).ceil() as usize;
        sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
    }

    pub fn error_rate(&self) -> f64 {
        let inner = self.inner.read().unwrap();
        if inner.total_calls == 0 {
            return 0.0;
        }
        inner.error_calls as f64 / inner.total_calls as f64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (total_calls, error_calls) = {
            let inner = self.inner.read().unwrap();
            (inner.total_calls, inner.error_calls)
        };
        MetricsSnapshot {
            total_calls,
            error_calls,
            avg_latency_ms: self.avg_latency().as_secs_f64() * 1000.0,
            p95_latency_ms: self.p95().as_secs_f64() * 1000.0,
            error_rate: self.error_rate(),
        }
    }
}

impl Default for GovernorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
