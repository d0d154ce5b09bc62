//! Complexity-based model tier routing.
//!
//! Scores a task over independent signals and picks the fast/cheap tier
//! or the higher-quality tier. Deterministic and side-effect-free: the
//! same context always yields the same decision, unknown or missing
//! signals contribute zero, and callers may force a tier to bypass
//! scoring entirely.

use hivemind_core::Task;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// The two model tiers the engine routes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheap and fast: simple extraction, factual questions, formatting.
    Fast,
    /// Higher quality: complex analysis, multi-step reasoning, synthesis.
    Quality,
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Fast => write!(f, "fast"),
            ModelTier::Quality => write!(f, "quality"),
        }
    }
}

/// One signal's contribution to a routing score.
#[derive(Debug, Clone, Serialize)]
pub struct SignalScore {
    /// Signal name.
    pub name: &'static str,
    /// Unweighted signal value.
    pub raw: f32,
    /// Value after weighting.
    pub weighted: f32,
}

/// The router's output. Pure data, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    /// Selected tier.
    pub tier: ModelTier,
    /// Total weighted score.
    pub score: f32,
    /// Threshold the score was compared against.
    pub threshold: f32,
    /// Whether the caller forced the tier, bypassing scoring.
    pub forced: bool,
    /// Per-signal breakdown, for observability.
    pub signals: Vec<SignalScore>,
}

/// What the router reads off a task.
#[derive(Debug, Clone, Default)]
pub struct RouteContext<'a> {
    /// The task instruction.
    pub instruction: &'a str,
    /// Length of the input payload in characters.
    pub input_len: usize,
    /// Perspective key, when the task came out of a chain stage.
    pub perspective: Option<&'a str>,
    /// Stage position within the pipeline (0-based).
    pub stage_index: Option<usize>,
    /// Whether the originating stage is the final one.
    pub is_last_stage: bool,
}

impl<'a> RouteContext<'a> {
    /// Build a routing context from a task and its routing hint.
    pub fn from_task(task: &'a Task) -> Self {
        Self {
            instruction: &task.instruction,
            input_len: task.input.chars().count(),
            perspective: task.routing.perspective.as_deref(),
            stage_index: task.routing.stage_index,
            is_last_stage: task.routing.is_last_stage,
        }
    }
}

/// Router options.
#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// Score at or above which the quality tier is selected.
    pub threshold: f32,
    /// Force a tier, bypassing scoring.
    pub force: Option<ModelTier>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            threshold: 8.0,
            force: None,
        }
    }
}

struct SignalPatterns {
    multi_step: Regex,
    comparison: Regex,
    synthesis: Regex,
    strategy: Regex,
    reasoning: Regex,
    critique: Regex,
    structured_output: Regex,
    precision: Regex,
}

#[allow(clippy::expect_used)] // static patterns
fn patterns() -> &'static SignalPatterns {
    static PATTERNS: OnceLock<SignalPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SignalPatterns {
        multi_step: Regex::new(r"\b(then|after|next|finally)\b").expect("static pattern"),
        comparison: Regex::new(r"\b(compare|contrast|evaluate|assess|weigh)\b")
            .expect("static pattern"),
        synthesis: Regex::new(r"\b(synthesize|reconcile|resolve|integrate)\b")
            .expect("static pattern"),
        strategy: Regex::new(r"\b(strategy|strategic|recommend|advise)\b")
            .expect("static pattern"),
        reasoning: Regex::new(r"\b(why|how|implications|consequences)\b")
            .expect("static pattern"),
        critique: Regex::new(r"\b(critique|challenge|devil|blind.?spot|assumption)\b")
            .expect("static pattern"),
        structured_output: Regex::new(r"\b(json|format|matrix|table|rank|rate)\b")
            .expect("static pattern"),
        precision: Regex::new(r"\b(specific|precise|exact|detailed)\b").expect("static pattern"),
    })
}

/// Input size: more context is harder to process well.
fn input_length_signal(ctx: &RouteContext<'_>) -> f32 {
    match ctx.input_len {
        0..=499 => 0.0,
        500..=1999 => 1.0,
        2000..=4999 => 2.0,
        _ => 3.0,
    }
}

/// Multi-step or analytical instructions, capped at 4.
fn instruction_complexity_signal(inst: &str) -> f32 {
    let p = patterns();
    let mut score: f32 = 0.0;
    if p.multi_step.is_match(inst) {
        score += 1.0;
    }
    if p.comparison.is_match(inst) {
        score += 1.0;
    }
    if p.synthesis.is_match(inst) {
        score += 2.0;
    }
    if p.strategy.is_match(inst) {
        score += 1.0;
    }
    if p.reasoning.is_match(inst) {
        score += 1.0;
    }
    if p.critique.is_match(inst) {
        score += 2.0;
    }
    score.min(4.0)
}

/// Some personas inherently need more reasoning.
fn perspective_signal(perspective: Option<&str>) -> f32 {
    match perspective {
        Some("challenger" | "critic" | "strategist" | "synthesizer") => 3.0,
        Some("analyst" | "optimizer" | "researcher") => 1.0,
        _ => 0.0,
    }
}

/// Later stages carry more accumulated context.
fn stage_position_signal(ctx: &RouteContext<'_>) -> f32 {
    match ctx.stage_index {
        None | Some(0) => 0.0,
        Some(_) if ctx.is_last_stage => 2.0,
        Some(_) => 1.0,
    }
}

/// Structured or precise output expectations.
fn output_precision_signal(inst: &str) -> f32 {
    let p = patterns();
    if p.structured_output.is_match(inst) {
        2.0
    } else if p.precision.is_match(inst) {
        1.0
    } else {
        0.0
    }
}

/// Route a task to a model tier.
pub fn route(ctx: &RouteContext<'_>, opts: &RouteOptions) -> RoutingDecision {
    if let Some(tier) = opts.force {
        return RoutingDecision {
            tier,
            score: match tier {
                ModelTier::Fast => 0.0,
                ModelTier::Quality => 99.0,
            },
            threshold: opts.threshold,
            forced: true,
            signals: Vec::new(),
        };
    }

    let inst = ctx.instruction.to_lowercase();
    let raw_signals: [(&'static str, f32, f32); 5] = [
        ("input_length", input_length_signal(ctx), 1.5),
        ("instruction_complexity", instruction_complexity_signal(&inst), 2.0),
        ("perspective", perspective_signal(ctx.perspective), 1.5),
        ("stage_position", stage_position_signal(ctx), 1.0),
        ("output_precision", output_precision_signal(&inst), 1.0),
    ];

    let mut signals = Vec::with_capacity(raw_signals.len());
    let mut score = 0.0;
    for (name, raw, weight) in raw_signals {
        let weighted = raw * weight;
        score += weighted;
        signals.push(SignalScore {
            name,
            raw,
            weighted,
        });
    }
    score = (score * 10.0).round() / 10.0;

    RoutingDecision {
        tier: if score >= opts.threshold {
            ModelTier::Quality
        } else {
            ModelTier::Fast
        },
        score,
        threshold: opts.threshold,
        forced: false,
        signals,
    }
}

/// Tier counts for a batch routing pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSummary {
    /// Batch size.
    pub total: usize,
    /// Tasks routed fast.
    pub fast: usize,
    /// Tasks routed to the quality tier.
    pub quality: usize,
    /// Mean score across the batch.
    pub avg_score: f32,
}

/// Route a batch of tasks, returning per-task decisions and a summary.
pub fn route_batch(tasks: &[Task], opts: &RouteOptions) -> (Vec<RoutingDecision>, RouteSummary) {
    let decisions: Vec<RoutingDecision> = tasks
        .iter()
        .map(|t| route(&RouteContext::from_task(t), opts))
        .collect();

    let quality = decisions
        .iter()
        .filter(|d| d.tier == ModelTier::Quality)
        .count();
    let avg_score = if decisions.is_empty() {
        0.0
    } else {
        decisions.iter().map(|d| d.score).sum::<f32>() / decisions.len() as f32
    };

    let summary = RouteSummary {
        total: tasks.len(),
        fast: tasks.len() - quality,
        quality,
        avg_score,
    };
    (decisions, summary)
}
