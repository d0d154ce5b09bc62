//! Shared types and capability traits for the Hivemind swarm engine.
//!
//! Everything the other workspace crates agree on lives here: the error
//! taxonomy with its transient/non-transient split, the task and phase
//! data model, the completion-capability seam, and the engine
//! configuration.
//!
//! # Main types
//!
//! - [`SwarmError`] / [`SwarmResult`] — error taxonomy driving retry policy.
//! - [`Task`] / [`TaskResult`] — the unit of work and its terminal outcome.
//! - [`Phase`] / [`PhaseResult`] — concurrent task groups sequenced by the
//!   dispatcher.
//! - [`CompletionBackend`] — the external text-completion capability.
//! - [`TaskExecutor`] — the execution seam consumed by refinement layers.
//! - [`SwarmConfig`] — TOML-loadable engine configuration.

/// Completion and execution capability traits.
pub mod completion;
/// Engine configuration.
pub mod config;
/// Structured error diagnostics.
pub mod diagnose;
/// Error taxonomy.
pub mod error;
/// Phase and pipeline result types.
pub mod phase;
/// Output sanitization and persona hardening.
pub mod sanitize;
/// Task and result types.
pub mod task;

pub use completion::{CompletionBackend, CompletionOptions, TaskExecutor};
pub use config::{CacheConfig, QualityConfig, RoutingConfig, ScalingConfig, SwarmConfig};
pub use diagnose::{diagnose, Diagnosis, ErrorCategory, Severity};
pub use error::{SwarmError, SwarmResult};
pub use phase::{OrchestrationResult, Phase, PhaseResult, TaskGenerator, TaskSource};
pub use sanitize::{harden_persona, sanitize_output};
pub use task::{NodeType, RoutingHint, Task, TaskResult};
