//! Worker node: executes one task at a time against the completion
//! capability, with caching, tier routing, timeout, retry, and the
//! output quality gate.

use crate::quality;
use crate::router::{route, ModelTier, RouteContext, RouteOptions};
use hivemind_cache::PromptCache;
use hivemind_core::{
    diagnose, sanitize_output, CompletionBackend, CompletionOptions, NodeType, SwarmConfig,
    SwarmError, Task, TaskResult,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Whether a node is currently executing an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Ready for work.
    Idle,
    /// An attempt is in flight.
    Busy,
}

/// Counters snapshot for one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStats {
    /// Node id.
    pub id: Uuid,
    /// Node capability category.
    pub node_type: NodeType,
    /// Current status.
    pub status: WorkerStatus,
    /// Tasks that reached a successful terminal result.
    pub completed_tasks: u64,
    /// Re-attempts performed across all tasks.
    pub retried_tasks: u64,
    /// Attempts routed to the quality tier.
    pub routed_to_quality: u64,
    /// Mean task duration in milliseconds, over completed tasks.
    pub avg_duration_ms: u64,
}

/// Successful attempt payload.
struct Attempt {
    value: String,
    cached: bool,
}

/// Restores `Idle` on drop so every exit path of an attempt (success,
/// error, timeout) leaves the node idle.
struct StatusGuard<'a> {
    status: &'a Mutex<WorkerStatus>,
}

impl<'a> StatusGuard<'a> {
    fn busy(status: &'a Mutex<WorkerStatus>) -> Self {
        *status.lock() = WorkerStatus::Busy;
        Self { status }
    }
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        *self.status.lock() = WorkerStatus::Idle;
    }
}

/// A long-lived worker executing one task at a time.
///
/// Owned exclusively by the dispatcher, which creates nodes lazily up to
/// a per-type cap. All attempts for a given task run on the same node;
/// the internal execution lock serializes tasks queued onto one node.
pub struct WorkerNode {
    /// Node id.
    pub id: Uuid,
    /// Capability category.
    pub node_type: NodeType,
    backend: Arc<dyn CompletionBackend>,
    cache: Arc<PromptCache>,
    config: Arc<SwarmConfig>,
    status: Mutex<WorkerStatus>,
    exec_lock: tokio::sync::Mutex<()>,
    completed_tasks: AtomicU64,
    retried_tasks: AtomicU64,
    routed_to_quality: AtomicU64,
    total_duration_ms: AtomicU64,
    assigned: AtomicU64,
    finished: AtomicU64,
}

impl WorkerNode {
    /// Create an idle node.
    pub fn new(
        node_type: NodeType,
        backend: Arc<dyn CompletionBackend>,
        cache: Arc<PromptCache>,
        config: Arc<SwarmConfig>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_type,
            backend,
            cache,
            config,
            status: Mutex::new(WorkerStatus::Idle),
            exec_lock: tokio::sync::Mutex::new(()),
            completed_tasks: AtomicU64::new(0),
            retried_tasks: AtomicU64::new(0),
            routed_to_quality: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            assigned: AtomicU64::new(0),
            finished: AtomicU64::new(0),
        }
    }

    /// Current status.
    pub fn status(&self) -> WorkerStatus {
        *self.status.lock()
    }

    /// Tasks dispatched to this node that have not reached a terminal
    /// result yet (includes tasks queued on the execution lock).
    pub fn in_flight(&self) -> u64 {
        self.assigned
            .load(Ordering::SeqCst)
            .saturating_sub(self.finished.load(Ordering::SeqCst))
    }

    /// Record that the dispatcher assigned a task to this node.
    pub(crate) fn note_assigned(&self) {
        self.assigned.fetch_add(1, Ordering::SeqCst);
    }

    /// Counters snapshot.
    pub fn stats(&self) -> NodeStats {
        let completed = self.completed_tasks.load(Ordering::SeqCst);
        NodeStats {
            id: self.id,
            node_type: self.node_type,
            status: self.status(),
            completed_tasks: completed,
            retried_tasks: self.retried_tasks.load(Ordering::SeqCst),
            routed_to_quality: self.routed_to_quality.load(Ordering::SeqCst),
            avg_duration_ms: if completed > 0 {
                self.total_duration_ms.load(Ordering::SeqCst) / completed
            } else {
                0
            },
        }
    }

    /// Wall-clock budget per attempt: the task's explicit budget, else
    /// the configured override, else the automatic budget (extended for
    /// large prompts).
    fn effective_timeout_ms(&self, task: &Task) -> u64 {
        let scaling = &self.config.scaling;
        task.timeout_ms.or(scaling.timeout_ms).unwrap_or({
            if task.prompt_len() > scaling.large_prompt_threshold {
                scaling.large_prompt_timeout_ms
            } else {
                scaling.default_timeout_ms
            }
        })
    }

    /// Execute a task to its terminal result.
    ///
    /// Up to `task.retries` re-attempts with linear backoff; a
    /// non-transient error aborts the loop immediately. Exactly one
    /// `TaskResult` comes out regardless of outcome.
    pub async fn execute(&self, task: Task) -> TaskResult {
        let _slot = self.exec_lock.lock().await;
        let started = Instant::now();
        let timeout_ms = self.effective_timeout_ms(&task);
        let max_retries = task.retries;

        let mut last_err = SwarmError::Provider("no attempt was made".to_string());
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                self.retried_tasks.fetch_add(1, Ordering::SeqCst);
                let backoff = self.config.scaling.backoff_base_ms * u64::from(attempt);
                debug!(
                    task = %task.display_label(),
                    attempt,
                    backoff_ms = backoff,
                    "retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            match self.execute_once(&task, timeout_ms).await {
                Ok(outcome) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    self.completed_tasks.fetch_add(1, Ordering::SeqCst);
                    self.total_duration_ms
                        .fetch_add(duration_ms, Ordering::SeqCst);
                    self.finished.fetch_add(1, Ordering::SeqCst);
                    return TaskResult {
                        task_id: task.id,
                        node_id: self.id,
                        success: true,
                        value: Some(outcome.value),
                        error: None,
                        error_kind: None,
                        duration_ms,
                        cached: outcome.cached,
                        retry_count: attempt,
                        quality_rejected: false,
                    };
                }
                Err(e) => {
                    warn!(
                        task = %task.display_label(),
                        node = %self.id,
                        attempt,
                        error = %e,
                        "attempt failed"
                    );
                    let transient = e.is_transient();
                    last_err = e;
                    if !transient || attempt >= max_retries {
                        break;
                    }
                }
            }
            attempt += 1;
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        self.finished.fetch_add(1, Ordering::SeqCst);
        TaskResult {
            task_id: task.id,
            node_id: self.id,
            success: false,
            value: None,
            error: Some(last_err.to_string()),
            error_kind: Some(diagnose(&last_err).category),
            duration_ms,
            cached: false,
            retry_count: attempt,
            quality_rejected: matches!(last_err, SwarmError::QualityRejected(_)),
        }
    }

    /// One attempt: status transition, prompt assembly, cache lookup,
    /// routing, the timed completion call, sanitization, quality gate,
    /// cache store.
    async fn execute_once(&self, task: &Task, timeout_ms: u64) -> Result<Attempt, SwarmError> {
        let _status = StatusGuard::busy(&self.status);

        let persona = task
            .system_prompt
            .clone()
            .unwrap_or_else(|| task.node_type.default_persona().to_string());
        let prompt = build_prompt(task, &persona);

        // Grounded calls must be fresh; everything else may hit the cache.
        if task.uses_cache() {
            if let Some(hit) = self.cache.get(&task.instruction, &task.input, &persona) {
                debug!(task = %task.display_label(), "served from cache");
                return Ok(Attempt {
                    value: hit,
                    cached: true,
                });
            }
        }

        let mut opts = CompletionOptions {
            max_tokens: task.max_output_tokens,
            web_search: task.web_search,
            ..CompletionOptions::default()
        };
        // Large prompts (synthesis, multi-phase aggregation) need room to
        // answer unless the caller already set a cap.
        if task.max_output_tokens.is_none()
            && prompt.len() > self.config.scaling.large_prompt_threshold
        {
            opts.max_tokens = Some(self.config.scaling.large_prompt_max_tokens);
        }

        if self.config.routing.enabled {
            let decision = route(
                &RouteContext::from_task(task),
                &RouteOptions {
                    threshold: self.config.routing.threshold,
                    force: None,
                },
            );
            if decision.tier == ModelTier::Quality {
                debug!(
                    task = %task.display_label(),
                    score = decision.score,
                    "routing to quality tier"
                );
                opts.model = Some(self.config.routing.quality_model.clone());
                self.routed_to_quality.fetch_add(1, Ordering::SeqCst);
            }
        }

        let raw = match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.backend.complete(&prompt, &opts),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(SwarmError::Timeout { ms: timeout_ms }),
        };

        let value = sanitize_output(&raw);
        quality::check(&value, &self.config.quality)
            .map_err(|issue| SwarmError::QualityRejected(issue.to_string()))?;

        if task.uses_cache() {
            self.cache
                .set(&task.instruction, &task.input, &persona, &value, None);
        }

        Ok(Attempt {
            value,
            cached: false,
        })
    }
}

/// Assemble the final prompt: persona, instruction, optional context,
/// optional input, and the response directive.
fn build_prompt(task: &Task, persona: &str) -> String {
    let mut prompt = format!("{persona}\n\nTask: {}\n", task.instruction);
    if let Some(context) = &task.context {
        prompt.push_str(&format!("\nContext:\n{context}\n"));
    }
    if !task.input.is_empty() {
        prompt.push_str(&format!("\nInput:\n{}\n", task.input));
    }
    prompt.push_str(
        "\nProvide a focused, high-quality response. Prioritize insight density over length.",
    );
    prompt
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hivemind_core::{CacheConfig, SwarmResult};
    use std::sync::atomic::AtomicU32;

    /// Mock backend returning a scripted sequence of results.
    struct ScriptedBackend {
        results: parking_lot::Mutex<Vec<SwarmResult<String>>>,
        calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(results: Vec<SwarmResult<String>>) -> Self {
            Self {
                results: parking_lot::Mutex::new(results),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _prompt: &str, _opts: &CompletionOptions) -> SwarmResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock();
            if results.is_empty() {
                Err(SwarmError::Provider("script exhausted".into()))
            } else {
                results.remove(0)
            }
        }
    }

    fn fast_config() -> Arc<SwarmConfig> {
        let mut config = SwarmConfig::default();
        config.scaling.backoff_base_ms = 0;
        Arc::new(config)
    }

    fn node_with(backend: ScriptedBackend) -> (Arc<ScriptedBackend>, WorkerNode) {
        let backend = Arc::new(backend);
        let node = WorkerNode::new(
            NodeType::Analyze,
            Arc::clone(&backend) as Arc<dyn CompletionBackend>,
            Arc::new(PromptCache::new(CacheConfig::default())),
            fast_config(),
        );
        (backend, node)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let (backend, node) = node_with(ScriptedBackend::new(vec![Ok(
            "A solid, well-formed answer.".to_string()
        )]));

        let result = node.execute(Task::new(NodeType::Analyze, "go")).await;
        assert!(result.success);
        assert_eq!(result.retry_count, 0);
        assert_eq!(result.value.as_deref(), Some("A solid, well-formed answer."));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_error_retried_then_succeeds() {
        let (backend, node) = node_with(ScriptedBackend::new(vec![
            Err(SwarmError::Transport("connection reset".into())),
            Ok("Recovered on the second try.".to_string()),
        ]));

        let result = node
            .execute(Task::new(NodeType::Analyze, "go").with_retries(2))
            .await;
        assert!(result.success);
        assert_eq!(result.retry_count, 1);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_attempts_never_exceed_one_plus_retries() {
        let (backend, node) = node_with(ScriptedBackend::new(vec![
            Err(SwarmError::RateLimited("429".into())),
            Err(SwarmError::RateLimited("429".into())),
            Err(SwarmError::RateLimited("429".into())),
            Err(SwarmError::RateLimited("429".into())),
            Err(SwarmError::RateLimited("429".into())),
        ]));

        let result = node
            .execute(Task::new(NodeType::Analyze, "go").with_retries(2))
            .await;
        assert!(!result.success);
        assert_eq!(result.retry_count, 2);
        assert_eq!(backend.calls(), 3, "1 + retries attempts exactly");
    }

    #[tokio::test]
    async fn test_non_transient_error_stops_immediately() {
        let (backend, node) = node_with(ScriptedBackend::new(vec![
            Err(SwarmError::Unauthorized("key revoked".into())),
            Ok("should never be reached".to_string()),
        ]));

        let result = node
            .execute(Task::new(NodeType::Analyze, "go").with_retries(3))
            .await;
        assert!(!result.success);
        assert_eq!(result.retry_count, 0);
        assert_eq!(backend.calls(), 1, "retry budget not consumed");
        assert_eq!(
            result.error_kind,
            Some(hivemind_core::ErrorCategory::Auth)
        );
    }

    #[tokio::test]
    async fn test_quality_rejection_is_retried() {
        let (backend, node) = node_with(ScriptedBackend::new(vec![
            Ok("ok".to_string()), // rejected: near-empty
            Ok("A complete answer with substance.".to_string()),
        ]));

        let result = node
            .execute(Task::new(NodeType::Analyze, "go").with_retries(1))
            .await;
        assert!(result.success);
        assert_eq!(result.retry_count, 1);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_quality_rejection_flagged_when_exhausted() {
        let (_backend, node) = node_with(ScriptedBackend::new(vec![
            Ok("ok".to_string()),
            Ok("ok".to_string()),
        ]));

        let result = node
            .execute(Task::new(NodeType::Analyze, "go").with_retries(1))
            .await;
        assert!(!result.success);
        assert!(result.quality_rejected);
        assert_eq!(
            result.error_kind,
            Some(hivemind_core::ErrorCategory::Quality)
        );
    }

    #[tokio::test]
    async fn test_timeout_is_transient_and_retried() {
        struct SlowThenFast {
            calls: AtomicU32,
        }

        #[async_trait]
        impl CompletionBackend for SlowThenFast {
            async fn complete(
                &self,
                _prompt: &str,
                _opts: &CompletionOptions,
            ) -> SwarmResult<String> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Ok("Quick answer this time.".to_string())
            }
        }

        let backend = Arc::new(SlowThenFast {
            calls: AtomicU32::new(0),
        });
        let node = WorkerNode::new(
            NodeType::Analyze,
            Arc::clone(&backend) as Arc<dyn CompletionBackend>,
            Arc::new(PromptCache::new(CacheConfig::default())),
            fast_config(),
        );

        let result = node
            .execute(
                Task::new(NodeType::Analyze, "go")
                    .with_timeout_ms(50)
                    .with_retries(1),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.retry_count, 1);
    }

    #[tokio::test]
    async fn test_idle_before_and_after_every_outcome() {
        let (_backend, node) = node_with(ScriptedBackend::new(vec![
            Ok("A fine answer indeed.".to_string()),
            Err(SwarmError::Unauthorized("nope".into())),
        ]));

        assert_eq!(node.status(), WorkerStatus::Idle);
        let ok = node.execute(Task::new(NodeType::Analyze, "a")).await;
        assert!(ok.success);
        assert_eq!(node.status(), WorkerStatus::Idle);

        let failed = node
            .execute(Task::new(NodeType::Analyze, "b").with_retries(0))
            .await;
        assert!(!failed.success);
        assert_eq!(node.status(), WorkerStatus::Idle);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(
            "The cached-to-be answer.".to_string()
        )]));
        let cache = Arc::new(PromptCache::new(CacheConfig::default()));
        let node = WorkerNode::new(
            NodeType::Analyze,
            Arc::clone(&backend) as Arc<dyn CompletionBackend>,
            cache,
            fast_config(),
        );

        let task = Task::new(NodeType::Analyze, "same question").with_input("same input");
        let first = node.execute(task.clone()).await;
        assert!(first.success && !first.cached);

        let again = Task::new(NodeType::Analyze, "same question").with_input("same input");
        let second = node.execute(again).await;
        assert!(second.success && second.cached);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_web_search_bypasses_cache() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok("Fresh result one.".to_string()),
            Ok("Fresh result two.".to_string()),
        ]));
        let node = WorkerNode::new(
            NodeType::Search,
            Arc::clone(&backend) as Arc<dyn CompletionBackend>,
            Arc::new(PromptCache::new(CacheConfig::default())),
            fast_config(),
        );

        let make = || Task::new(NodeType::Search, "latest news").with_web_search(true);
        let first = node.execute(make()).await;
        let second = node.execute(make()).await;
        assert!(!first.cached && !second.cached);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_stats_counters() {
        let (_backend, node) = node_with(ScriptedBackend::new(vec![
            Err(SwarmError::Transport("blip".into())),
            Ok("Recovered fine in the end.".to_string()),
        ]));

        node.execute(Task::new(NodeType::Analyze, "go").with_retries(1))
            .await;
        let stats = node.stats();
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.retried_tasks, 1);
        assert_eq!(stats.status, WorkerStatus::Idle);
    }

    #[test]
    fn test_build_prompt_layout() {
        let task = Task::new(NodeType::Analyze, "Summarize")
            .with_context("Q3 report")
            .with_input("revenue grew 12%");
        let prompt = build_prompt(&task, "You are an analyst.");
        assert!(prompt.starts_with("You are an analyst."));
        assert!(prompt.contains("Task: Summarize"));
        assert!(prompt.contains("Context:\nQ3 report"));
        assert!(prompt.contains("Input:\nrevenue grew 12%"));
    }

    #[test]
    fn test_effective_timeout_extends_for_large_prompts() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let node = WorkerNode::new(
            NodeType::Analyze,
            backend as Arc<dyn CompletionBackend>,
            Arc::new(PromptCache::new(CacheConfig::default())),
            fast_config(),
        );

        let small = Task::new(NodeType::Analyze, "short");
        assert_eq!(node.effective_timeout_ms(&small), 30_000);

        let large = Task::new(NodeType::Analyze, "big").with_input("x".repeat(20_000));
        assert_eq!(node.effective_timeout_ms(&large), 90_000);

        let explicit = Task::new(NodeType::Analyze, "big")
            .with_input("x".repeat(20_000))
            .with_timeout_ms(5_000);
        assert_eq!(node.effective_timeout_ms(&explicit), 5_000);
    }
}
