//! Capability seams.
//!
//! [`CompletionBackend`] is the single boundary to the external
//! text-completion provider; the engine never assumes a specific vendor,
//! only this call shape. [`TaskExecutor`] is the seam the refinement
//! layers (reflection, voting) consume, implemented by the dispatcher.

use crate::error::SwarmResult;
use crate::task::{Task, TaskResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-call options for the completion capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Model override; `None` uses the provider's configured default.
    pub model: Option<String>,
    /// Sampling temperature override.
    pub temperature: Option<f32>,
    /// Output token cap override.
    pub max_tokens: Option<u32>,
    /// Request search grounding for this call.
    pub web_search: bool,
}

/// The external text-completion capability.
///
/// Implementations live outside this workspace (HTTP provider clients,
/// local runtimes); tests implement it with mocks.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Complete the prompt, returning the raw response text.
    async fn complete(&self, prompt: &str, opts: &CompletionOptions) -> SwarmResult<String>;
}

/// Executes tasks through the full worker pipeline (cache, routing,
/// retries, quality gate).
///
/// Implemented by the dispatcher; consumed by the reflection and voting
/// loops so they stay decoupled from the pool internals.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Execute a single task to its terminal result.
    async fn execute_one(&self, task: Task) -> SwarmResult<TaskResult>;

    /// Execute independent tasks concurrently; the i-th result corresponds
    /// to the i-th task regardless of completion order.
    async fn execute_many(&self, tasks: Vec<Task>) -> SwarmResult<Vec<TaskResult>>;
}
