//! Quality-improvement loops layered on top of the dispatcher.
//!
//! Both strategies consume the [`TaskExecutor`](hivemind_core::TaskExecutor)
//! seam rather than the dispatcher directly, so they compose with any
//! execution pipeline:
//!
//! - [`reflect`] — critique-then-refine: a critic scores the output
//!   across fixed dimensions, and a bounded refinement loop rewrites it
//!   when the verdict demands it.
//! - [`vote`] — best-of-N: the same prompt sampled N times concurrently,
//!   with a winner picked by length, similarity consensus, or an LLM
//!   judge.

/// JSON extraction helpers.
mod parse;
/// Critique-then-refine loop.
pub mod reflect;
/// Best-of-N voting.
pub mod voting;

#[cfg(test)]
mod test_support;

pub use reflect::{
    criticize, reflect, Critique, Reflection, ReflectOptions, Verdict, SCORE_DIMENSIONS,
};
pub use voting::{
    vote, CandidateSummary, VoteOptions, VoteOutcome, VoteStrategy, DEFAULT_CANDIDATES,
    MAX_CANDIDATES,
};
