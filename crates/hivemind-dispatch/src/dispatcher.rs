//! The dispatcher: owns the worker pool, runs waves of independent tasks
//! concurrently, and sequences dependent phases.

use crate::worker::{NodeStats, WorkerNode, WorkerStatus};
use async_trait::async_trait;
use futures_util::future::join_all;
use hivemind_cache::PromptCache;
use hivemind_core::{
    diagnose, CompletionBackend, NodeType, OrchestrationResult, Phase, PhaseResult, SwarmConfig,
    SwarmError, SwarmResult, Task, TaskExecutor, TaskResult,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Coordinates a bounded pool of worker nodes over a single completion
/// capability.
///
/// Nodes are created lazily per type up to `scaling.max_nodes_per_type`;
/// a global semaphore caps simultaneously in-flight completion calls at
/// `scaling.max_concurrent` across all types and pipelines. The
/// dispatcher instance is passed explicitly to every caller; there is
/// no ambient singleton.
pub struct Dispatcher {
    config: Arc<SwarmConfig>,
    backend: Arc<dyn CompletionBackend>,
    cache: Arc<PromptCache>,
    pool: Mutex<HashMap<NodeType, Vec<Arc<WorkerNode>>>>,
    permits: Arc<tokio::sync::Semaphore>,
    accepting: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher, opening the prompt cache (loading persisted
    /// entries when configured).
    pub fn new(config: SwarmConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        let cache = Arc::new(PromptCache::open(config.cache.clone()));
        Self::with_cache(config, backend, cache)
    }

    /// Create a dispatcher around an existing cache.
    pub fn with_cache(
        config: SwarmConfig,
        backend: Arc<dyn CompletionBackend>,
        cache: Arc<PromptCache>,
    ) -> Self {
        let max_concurrent = config.scaling.max_concurrent.max(1);
        Self {
            config: Arc::new(config),
            backend,
            cache,
            pool: Mutex::new(HashMap::new()),
            permits: Arc::new(tokio::sync::Semaphore::new(max_concurrent)),
            accepting: AtomicBool::new(true),
        }
    }

    /// The dispatcher's prompt cache.
    pub fn cache(&self) -> &Arc<PromptCache> {
        &self.cache
    }

    /// Get an idle node of the given type, creating one if the pool has
    /// room. Growth beyond the cap fails closed: the least-loaded
    /// existing node is reused instead, and tasks queue on it.
    pub fn get_or_create_node(&self, node_type: NodeType) -> SwarmResult<Arc<WorkerNode>> {
        let cap = self.config.scaling.max_nodes_per_type;
        let mut pool = self.pool.lock();
        let nodes = pool.entry(node_type).or_default();

        if let Some(idle) = nodes
            .iter()
            .find(|n| n.status() == WorkerStatus::Idle && n.in_flight() == 0)
        {
            idle.note_assigned();
            return Ok(Arc::clone(idle));
        }

        if nodes.len() < cap {
            let node = Arc::new(WorkerNode::new(
                node_type,
                Arc::clone(&self.backend),
                Arc::clone(&self.cache),
                Arc::clone(&self.config),
            ));
            info!(node = %node.id, node_type = %node_type, pool_size = nodes.len() + 1, "created worker node");
            node.note_assigned();
            nodes.push(Arc::clone(&node));
            return Ok(node);
        }

        nodes
            .iter()
            .min_by_key(|n| n.in_flight())
            .map(|n| {
                n.note_assigned();
                Arc::clone(n)
            })
            .ok_or_else(|| {
                SwarmError::PoolExhausted(format!(
                    "no {node_type} nodes exist and max_nodes_per_type is 0"
                ))
            })
    }

    /// Execute one wave of independent tasks concurrently.
    ///
    /// Every task is assigned a node up front; execution is gated by the
    /// global concurrency ceiling. The i-th result always corresponds to
    /// the i-th task, regardless of completion order.
    pub async fn execute_parallel(&self, tasks: Vec<Task>) -> SwarmResult<Vec<TaskResult>> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(SwarmError::PoolExhausted(
                "dispatcher is shut down".to_string(),
            ));
        }
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let mut work = Vec::with_capacity(tasks.len());
        for task in tasks {
            let node = self.get_or_create_node(task.node_type)?;
            let permits = Arc::clone(&self.permits);
            work.push(async move {
                match permits.acquire_owned().await {
                    Ok(_permit) => node.execute(task).await,
                    Err(_) => rejected(
                        &task,
                        node.id,
                        &SwarmError::PoolExhausted("dispatcher shut down mid-wave".to_string()),
                    ),
                }
            });
        }

        // join_all yields results in future order, which is submission
        // order, never completion order.
        Ok(join_all(work).await)
    }

    /// Execute dependent phases strictly in order.
    ///
    /// Before each phase runs, its task source is resolved against the
    /// ordered slice of all completed phase results (failures included).
    /// A `required` phase that ran tasks and got zero successes aborts
    /// the pipeline; non-required failures are recorded and skipped over.
    pub async fn orchestrate(&self, phases: Vec<Phase>) -> SwarmResult<OrchestrationResult> {
        let started = Instant::now();
        let mut completed: Vec<PhaseResult> = Vec::with_capacity(phases.len());

        for (index, phase) in phases.into_iter().enumerate() {
            let tasks = phase.source.resolve(&completed);
            info!(
                phase = %phase.name,
                index,
                tasks = tasks.len(),
                required = phase.required,
                "phase starting"
            );

            let phase_started = Instant::now();
            let results = self.execute_parallel(tasks).await?;
            let succeeded = results.iter().filter(|r| r.success).count();
            // A phase with no tasks is vacuously successful; a phase that
            // ran tasks needs at least one success.
            let success = results.is_empty() || succeeded > 0;

            info!(
                phase = %phase.name,
                succeeded,
                failed = results.len() - succeeded,
                duration_ms = phase_started.elapsed().as_millis() as u64,
                "phase finished"
            );

            let required = phase.required;
            completed.push(PhaseResult {
                name: phase.name,
                results,
                total_duration_ms: phase_started.elapsed().as_millis() as u64,
                success,
            });

            if required && !success {
                warn!(index, "required phase failed, aborting pipeline");
                return Ok(OrchestrationResult {
                    phases: completed,
                    success: false,
                    total_duration_ms: started.elapsed().as_millis() as u64,
                });
            }
        }

        Ok(OrchestrationResult {
            phases: completed,
            success: true,
            total_duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Stop accepting work, wait for in-flight tasks to drain, and
    /// persist the cache.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);

        let max = self.config.scaling.max_concurrent.max(1) as u32;
        // Holding every permit means nothing is in flight.
        if let Ok(_all) = self.permits.acquire_many(max).await {
            info!("dispatcher drained");
        }

        match self.cache.persist() {
            Ok(0) => {}
            Ok(entries) => info!(entries, "cache persisted on shutdown"),
            Err(e) => warn!(error = %e, "cache persist failed on shutdown"),
        }
    }

    /// Per-node counter snapshots, across all types.
    pub fn node_stats(&self) -> Vec<NodeStats> {
        let pool = self.pool.lock();
        let mut stats: Vec<NodeStats> = pool
            .values()
            .flat_map(|nodes| nodes.iter().map(|n| n.stats()))
            .collect();
        stats.sort_by_key(|s| s.id);
        stats
    }
}

fn rejected(task: &Task, node_id: Uuid, err: &SwarmError) -> TaskResult {
    TaskResult {
        task_id: task.id,
        node_id,
        success: false,
        value: None,
        error: Some(err.to_string()),
        error_kind: Some(diagnose(err).category),
        duration_ms: 0,
        cached: false,
        retry_count: 0,
        quality_rejected: false,
    }
}

#[async_trait]
impl TaskExecutor for Dispatcher {
    async fn execute_one(&self, task: Task) -> SwarmResult<TaskResult> {
        let mut results = self.execute_parallel(vec![task]).await?;
        results
            .pop()
            .ok_or_else(|| SwarmError::Provider("empty result set for one task".to_string()))
    }

    async fn execute_many(&self, tasks: Vec<Task>) -> SwarmResult<Vec<TaskResult>> {
        self.execute_parallel(tasks).await
    }
}
