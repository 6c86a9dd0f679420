//! End-to-end tests across the kernel layers:
//! - plan runs with retries, progressive timeouts, and finalization
//! - coordinated batches over a dependency DAG
//! - governor behavior observed from the outer layers

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use taskweave::engine::{CoordinationHub, PlanRunner};
use taskweave::governor::ResourceGovernor;
use taskweave::providers::{CompletionOptions, CompletionService, StepInput, WorkExecutor};
use taskweave::registry::AgentRegistry;
use taskweave::{
    FlowState, KernelConfig, Plan, PlanStep, StepResult, StepStatus, WorkItem, WorkItemStatus,
};

/// Executor that fails a configured number of times, then succeeds.
struct FlakyExecutor {
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyExecutor {
    fn new(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WorkExecutor for FlakyExecutor {
    async fn execute(&self, input: StepInput) -> Result<StepResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(anyhow!("transient failure"));
        }
        Ok(StepResult::Text(format!("done: {}", input.text)))
    }
}

/// Executor that records the moments it was concurrently in flight.
struct GaugeExecutor {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl WorkExecutor for GaugeExecutor {
    async fn execute(&self, input: StepInput) -> Result<StepResult> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(StepResult::Text(input.text))
    }
}

struct MockCompletion {
    fail_first: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.fail_first.load(Ordering::SeqCst);
        if left > 0 {
            self.fail_first.store(left - 1, Ordering::SeqCst);
            return Err(anyhow!("completion unavailable"));
        }
        Ok(format!("summary of: {}", &prompt[..prompt.len().min(40)]))
    }
}

fn fast_config() -> KernelConfig {
    KernelConfig {
        step_timeout: Duration::from_secs(2),
        retry_delay: Duration::from_millis(5),
        max_retries: 3,
        failure_threshold: 50,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_three_step_plan_with_transient_failures_ends_clean() {
    let config = fast_config();
    let governor = Arc::new(ResourceGovernor::new(&config));
    let runner = PlanRunner::new(config, governor)
        .register_executor("steady", Arc::new(FlakyExecutor::new(0)))
        .register_executor("flaky", Arc::new(FlakyExecutor::new(2)));

    let mut plan = Plan::new(vec![
        PlanStep::new("gather requirements").with_type_tag("steady"),
        PlanStep::new("draft document").with_type_tag("flaky"),
        PlanStep::new("review document").with_type_tag("steady"),
    ]);

    let flow = runner.run(&mut plan).await;

    assert_eq!(flow.state, FlowState::Completed);
    assert!(plan
        .steps
        .iter()
        .all(|step| step.status == StepStatus::Completed));
    assert_eq!(flow.error_count, 0);
    assert!(flow.data.contains_key("step_1"));
}

#[tokio::test]
async fn test_plan_finalization_uses_single_fallback() {
    let config = fast_config();
    let governor = Arc::new(ResourceGovernor::new(&config));
    let completion = Arc::new(MockCompletion {
        fail_first: AtomicUsize::new(1),
        calls: AtomicUsize::new(0),
    });
    let runner = PlanRunner::new(config, governor)
        .register_executor("worker", Arc::new(FlakyExecutor::new(0)))
        .with_completion(Arc::clone(&completion) as Arc<dyn CompletionService>);

    let mut plan = Plan::new(vec![PlanStep::new("single step")]);
    let flow = runner.run(&mut plan).await;

    assert_eq!(flow.state, FlowState::Completed);
    // First summary call failed; exactly one fallback call followed.
    assert_eq!(completion.calls.load(Ordering::SeqCst), 2);
    assert!(flow.data.contains_key("summary"));
}

#[tokio::test]
async fn test_finalization_failure_is_not_fatal() {
    let config = fast_config();
    let governor = Arc::new(ResourceGovernor::new(&config));
    let completion = Arc::new(MockCompletion {
        fail_first: AtomicUsize::new(usize::MAX),
        calls: AtomicUsize::new(0),
    });
    let runner = PlanRunner::new(config, governor)
        .register_executor("worker", Arc::new(FlakyExecutor::new(0)))
        .with_completion(completion as Arc<dyn CompletionService>);

    let mut plan = Plan::new(vec![PlanStep::new("single step")]);
    let flow = runner.run(&mut plan).await;

    assert_eq!(flow.state, FlowState::Completed);
    assert!(!flow.data.contains_key("summary"));
}

#[tokio::test]
async fn test_batch_respects_dependency_order_across_roles() {
    let order = Arc::new(Mutex::new(Vec::new()));

    struct OrderedExecutor {
        order: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl WorkExecutor for OrderedExecutor {
        async fn execute(&self, input: StepInput) -> Result<StepResult> {
            // Hold the call open long enough that an overlapping dependent
            // would be visible in the log before this item finishes.
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.order.lock().unwrap().push(input.text.clone());
            Ok(StepResult::Text(input.text))
        }
    }

    let config = fast_config();
    let governor = Arc::new(ResourceGovernor::new(&config));
    let registry = Arc::new(AgentRegistry::new(10));
    let hub = CoordinationHub::new(config, governor, registry).with_default_executor(Arc::new(
        OrderedExecutor {
            order: Arc::clone(&order),
        },
    ));

    let items = vec![
        WorkItem::new("review", "review the draft")
            .with_roles("analyst", "reviewer")
            .with_dependencies(vec!["draft".to_string()]),
        WorkItem::new("draft", "write the draft").with_roles("planner", "writer"),
        WorkItem::new("outline", "outline sections").with_roles("planner", "writer"),
    ];

    let batch = hub.coordinate(items).await.unwrap();
    assert!(batch.all_succeeded);

    let order = order.lock().unwrap().clone();
    let draft_pos = order.iter().position(|t| t == "write the draft").unwrap();
    let review_pos = order.iter().position(|t| t == "review the draft").unwrap();
    assert!(draft_pos < review_pos);
}

#[tokio::test]
async fn test_cycle_in_batch_reported_not_hung() {
    let config = fast_config();
    let governor = Arc::new(ResourceGovernor::new(&config));
    let registry = Arc::new(AgentRegistry::new(10));
    let hub = CoordinationHub::new(config, governor, registry)
        .with_default_executor(Arc::new(FlakyExecutor::new(0)));

    let items = vec![
        WorkItem::new("a", "first").with_dependencies(vec!["b".to_string()]),
        WorkItem::new("b", "second").with_dependencies(vec!["a".to_string()]),
    ];

    let result = tokio::time::timeout(Duration::from_secs(5), hub.coordinate(items))
        .await
        .expect("coordinate must terminate");
    assert!(matches!(
        result,
        Err(taskweave::KernelError::UnsatisfiableDependency { .. })
    ));
}

#[tokio::test]
async fn test_governor_limits_concurrency_across_a_batch() {
    let config = KernelConfig {
        concurrency_limit: 2,
        ..fast_config()
    };
    let governor = Arc::new(ResourceGovernor::new(&config));
    let registry = Arc::new(AgentRegistry::new(10));
    let gauge = Arc::new(GaugeExecutor {
        current: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let hub = CoordinationHub::new(config, governor, registry)
        .with_default_executor(Arc::clone(&gauge) as Arc<dyn WorkExecutor>);

    let items: Vec<WorkItem> = (0..6)
        .map(|i| WorkItem::new(format!("item-{i}"), format!("work {i}")))
        .collect();

    let batch = hub.coordinate(items).await.unwrap();
    assert!(batch.all_succeeded);
    assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_failed_item_surfaces_in_results_not_as_panic() {
    struct AlwaysFails;

    #[async_trait]
    impl WorkExecutor for AlwaysFails {
        async fn execute(&self, _input: StepInput) -> Result<StepResult> {
            Err(anyhow!("permanently broken"))
        }
    }

    let config = fast_config();
    let governor = Arc::new(ResourceGovernor::new(&config));
    let registry = Arc::new(AgentRegistry::new(10));
    let hub = CoordinationHub::new(config, governor, registry)
        .register_role("broken", Arc::new(AlwaysFails))
        .with_default_executor(Arc::new(FlakyExecutor::new(0)));

    let items = vec![
        WorkItem::new("bad", "doomed work").with_roles("planner", "broken"),
        WorkItem::new("good", "fine work"),
    ];

    let batch = hub.coordinate(items).await.unwrap();
    assert!(!batch.all_succeeded);
    assert_eq!(batch.outcomes["bad"].status, WorkItemStatus::Failed);
    assert_eq!(batch.outcomes["good"].status, WorkItemStatus::Completed);
    assert!(batch.outcomes["bad"]
        .error
        .as_deref()
        .unwrap()
        .contains("permanently broken"));
}
