//! Worker pool and dispatch engine for the Hivemind swarm.
//!
//! A wave of independent tasks goes through [`Dispatcher::execute_parallel`];
//! a pipeline of dependent phases goes through [`Dispatcher::orchestrate`].
//! Each task lands on a [`WorkerNode`] that assembles the prompt, consults
//! the cache, applies complexity routing, races the completion call against
//! a wall-clock timeout, and validates the output before accepting it.
//!
//! # Main types
//!
//! - [`Dispatcher`] — Bounded worker pool plus the global concurrency ceiling.
//! - [`WorkerNode`] — Executes one task at a time with retry and backoff.
//! - [`route`] / [`RoutingDecision`] — Complexity-based model tier routing.
//! - [`quality::check`] — The output quality gate.

/// Dispatcher and phase orchestration.
pub mod dispatcher;
/// Output quality gate.
pub mod quality;
/// Complexity-based model tier routing.
pub mod router;
/// Worker node execution.
pub mod worker;

pub use dispatcher::Dispatcher;
pub use quality::QualityIssue;
pub use router::{
    route, route_batch, ModelTier, RouteContext, RouteOptions, RouteSummary, RoutingDecision,
    SignalScore,
};
pub use worker::{NodeStats, WorkerNode, WorkerStatus};
