//! Phases: named groups of tasks executed concurrently, sequenced by the
//! dispatcher's `orchestrate`.

use crate::task::{Task, TaskResult};
use serde::{Deserialize, Serialize};

/// Produces a phase's tasks.
///
/// The generator form receives the ordered slice of every completed
/// phase's results, including failures, which is what lets later stages
/// transform, filter, or fan out from earlier output. Kept as an explicit
/// function type rather than a closure over ambient state so the
/// dependency is visible and testable in isolation.
pub type TaskGenerator = Box<dyn Fn(&[PhaseResult]) -> Vec<Task> + Send + Sync>;

/// Where a phase's tasks come from.
pub enum TaskSource {
    /// A fixed task list, known up front.
    Fixed(Vec<Task>),
    /// Tasks generated from all prior phases' results.
    Generate(TaskGenerator),
}

impl TaskSource {
    /// Resolve the task list given all completed prior phases.
    pub fn resolve(&self, prior: &[PhaseResult]) -> Vec<Task> {
        match self {
            TaskSource::Fixed(tasks) => tasks.clone(),
            TaskSource::Generate(f) => f(prior),
        }
    }
}

impl std::fmt::Debug for TaskSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskSource::Fixed(tasks) => f.debug_tuple("Fixed").field(&tasks.len()).finish(),
            TaskSource::Generate(_) => f.write_str("Generate(..)"),
        }
    }
}

/// A named group of tasks executed concurrently.
#[derive(Debug)]
pub struct Phase {
    /// Phase name, used in results and logs.
    pub name: String,
    /// Whether the pipeline aborts when this phase produces zero
    /// successful results.
    pub required: bool,
    /// The phase's tasks.
    pub source: TaskSource,
}

impl Phase {
    /// A required phase with a fixed task list.
    pub fn fixed(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            required: true,
            source: TaskSource::Fixed(tasks),
        }
    }

    /// A required phase with a dynamic task generator.
    pub fn generated(
        name: impl Into<String>,
        generator: impl Fn(&[PhaseResult]) -> Vec<Task> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            required: true,
            source: TaskSource::Generate(Box::new(generator)),
        }
    }

    /// Mark the phase as optional: its failure is recorded but does not
    /// halt the pipeline.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Outcome of one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Phase name.
    pub name: String,
    /// One terminal result per task, in submission order.
    pub results: Vec<TaskResult>,
    /// Wall-clock time for the whole phase, in milliseconds.
    pub total_duration_ms: u64,
    /// Whether the phase met its success policy (at least one task
    /// succeeded; a phase that generated no tasks is vacuously
    /// successful).
    pub success: bool,
}

impl PhaseResult {
    /// Response texts of the successful tasks, in submission order.
    pub fn successful_outputs(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(TaskResult::text)
            .collect()
    }
}

/// Outcome of a full `orchestrate` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// Results of every phase that ran, in order. When a required phase
    /// failed, this ends at that phase.
    pub phases: Vec<PhaseResult>,
    /// False iff a required phase failed and the pipeline aborted.
    pub success: bool,
    /// Wall-clock time for the whole pipeline, in milliseconds.
    pub total_duration_ms: u64,
}

impl OrchestrationResult {
    /// The final phase's first successful output, if any.
    ///
    /// Convenience for reduce-terminated pipelines where the last phase
    /// holds exactly one synthesis task.
    pub fn final_output(&self) -> Option<&str> {
        self.phases
            .last()
            .and_then(|p| p.results.iter().find(|r| r.success))
            .map(TaskResult::text)
    }
}
