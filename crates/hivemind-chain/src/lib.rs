//! Declarative pipelines for the Hivemind swarm.
//!
//! A [`ChainDefinition`] describes a pipeline as ordered stages, each
//! with an execution mode (single, parallel, fan-out, reduce) and a
//! perspective. [`compile`] validates the definition and expands it into
//! the phase list the dispatcher's `orchestrate` consumes;
//! [`build_auto_chain`] constructs a definition automatically from a
//! natural-language task description.
//!
//! # Main types
//!
//! - [`ChainDefinition`] / [`Stage`] — the JSON-serializable pipeline format.
//! - [`compile`] — stage → phase expansion with fail-closed validation.
//! - [`Perspective`] — built-in or custom personas for stage workers.
//! - [`Transform`] — how one stage's outputs become the next stage's input.
//! - [`build_auto_chain`] / [`preview_chain`] — automatic pipeline construction.

/// Automatic pipeline construction.
pub mod builder;
/// Chain definitions, validation, and compilation.
pub mod compiler;
/// Stage personas.
pub mod perspective;
/// Stage input transforms.
pub mod transform;

pub use builder::{
    build_auto_chain, detect_task_pattern, preview_chain, select_perspectives, AutoChainOptions,
    ChainPreview, Depth, StagePreview, StageTemplate, TaskPattern, TASK_PATTERNS,
};
pub use compiler::{compile, ChainDefinition, Stage, StageMode};
pub use perspective::{BuiltInPerspective, Perspective};
pub use transform::{Transform, TransformOutput, SEPARATOR};
