//! Critique-then-refine loop.
//!
//! A critic task scores an output across fixed dimensions and delivers a
//! pass/refine verdict; on "refine" (or a score below threshold) exactly
//! one refine task per cycle rewrites the output with the critique as
//! context, bounded by `max_refinements`. Worst case two extra calls per
//! cycle, best case one.
//!
//! Degrades gracefully: a critic response that does not parse as the
//! expected structure short-circuits to "pass": unparseable critique is
//! treated as good enough, never as a pipeline-blocking error.

use crate::parse::extract_json;
use hivemind_core::{harden_persona, NodeType, SwarmResult, Task, TaskExecutor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// The dimensions the critic scores, 1-10 each.
pub const SCORE_DIMENSIONS: [&str; 5] = [
    "accuracy",
    "completeness",
    "coherence",
    "actionability",
    "conciseness",
];

const CRITIC_PERSONA: &str = r#"You are a rigorous output quality critic. You evaluate text against specific dimensions and provide honest scores.

You MUST respond in EXACTLY this JSON format, nothing else:
{
  "scores": {
    "accuracy": <1-10>,
    "completeness": <1-10>,
    "coherence": <1-10>,
    "actionability": <1-10>,
    "conciseness": <1-10>
  },
  "critique": "<2-3 sentences on what is weak and how to fix it>",
  "verdict": "pass" | "refine"
}

Scoring guide:
- 8-10: Good to excellent. No refinement needed.
- 5-7: Acceptable but has clear weaknesses.
- 1-4: Poor. Needs significant improvement.

Set verdict to "refine" if the average score is below 7 OR any single dimension is below 5.
Be harsh but fair. Do not inflate scores."#;

const REFINE_PERSONA: &str = "You are refining output based on specific critique. \
Improve the weak areas identified by the critic while preserving what is already strong. \
Do NOT start with meta-commentary like \"Here's the refined version\"; output the improved content directly.";

/// Reflection loop options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectOptions {
    /// Average score below which refinement triggers.
    pub threshold: f32,
    /// Maximum refinement cycles.
    pub max_refinements: u32,
}

impl Default for ReflectOptions {
    fn default() -> Self {
        Self {
            threshold: 7.0,
            max_refinements: 1,
        }
    }
}

/// Critic verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Output is good enough.
    Pass,
    /// Output needs a refinement pass.
    Refine,
}

/// Parsed critic output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Critique {
    /// Per-dimension scores, clamped to 1-10; missing dimensions score 5.
    pub scores: HashMap<String, f32>,
    /// Mean over the fixed dimensions.
    pub avg_score: f32,
    /// The weakest dimension.
    pub weakest: String,
    /// The critic's prose feedback.
    pub critique: String,
    /// Pass or refine.
    pub verdict: Verdict,
    /// Whether the critic's response failed to parse (verdict forced to
    /// pass).
    pub parse_failed: bool,
}

/// What the critic is expected to emit.
#[derive(Debug, Deserialize)]
struct CritiqueWire {
    #[serde(default)]
    scores: HashMap<String, f32>,
    #[serde(default)]
    critique: Option<String>,
    #[serde(default)]
    verdict: Option<String>,
}

fn neutral_pass(reason: &str) -> Critique {
    Critique {
        scores: SCORE_DIMENSIONS
            .iter()
            .map(|d| ((*d).to_string(), 7.0))
            .collect(),
        avg_score: 7.0,
        weakest: String::new(),
        critique: reason.to_string(),
        verdict: Verdict::Pass,
        parse_failed: true,
    }
}

fn parse_critique(raw: &str) -> Critique {
    let Some(json) = extract_json(raw) else {
        return neutral_pass("Critic response was not valid JSON; skipping refinement.");
    };
    let wire: CritiqueWire = match serde_json::from_str(&json) {
        Ok(wire) => wire,
        Err(_) => {
            return neutral_pass("Critic response was not valid JSON; skipping refinement.")
        }
    };

    let scores: HashMap<String, f32> = SCORE_DIMENSIONS
        .iter()
        .map(|dim| {
            let value = wire
                .scores
                .get(*dim)
                .copied()
                .unwrap_or(5.0)
                .clamp(1.0, 10.0);
            ((*dim).to_string(), value)
        })
        .collect();
    let avg_score = scores.values().sum::<f32>() / SCORE_DIMENSIONS.len() as f32;
    let avg_score = (avg_score * 10.0).round() / 10.0;
    let weakest = SCORE_DIMENSIONS
        .iter()
        .min_by(|a, b| {
            scores[**a]
                .partial_cmp(&scores[**b])
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|d| (*d).to_string())
        .unwrap_or_default();

    let verdict = match wire.verdict.as_deref() {
        Some("refine") => Verdict::Refine,
        Some("pass") => Verdict::Pass,
        _ if avg_score < 7.0 => Verdict::Refine,
        _ => Verdict::Pass,
    };

    Critique {
        scores,
        avg_score,
        weakest,
        critique: wire.critique.unwrap_or_default(),
        verdict,
        parse_failed: false,
    }
}

/// Run the critic on an output.
pub async fn criticize(
    executor: &dyn TaskExecutor,
    output: &str,
    task_desc: &str,
) -> SwarmResult<Critique> {
    let instruction = format!(
        "Score this output that was generated for the task: \"{task_desc}\"\n\n\
         Evaluate each dimension 1-10. Respond with ONLY the JSON object."
    );
    let task = Task::new(NodeType::Analyze, instruction)
        .with_input(output)
        .with_system_prompt(harden_persona(CRITIC_PERSONA))
        .with_label("reflect [critic]");

    let result = executor.execute_one(task).await?;
    if !result.success {
        debug!("critic task failed; treating output as acceptable");
        return Ok(neutral_pass("Critic task failed; skipping refinement."));
    }
    Ok(parse_critique(result.text()))
}

/// Run one refinement pass incorporating the critique.
async fn refine_once(
    executor: &dyn TaskExecutor,
    output: &str,
    critique: &Critique,
    task_desc: &str,
) -> SwarmResult<Option<String>> {
    let weakest_score = critique.scores.get(&critique.weakest).copied().unwrap_or(5.0);
    let instruction = format!(
        "Original task: \"{task_desc}\"\n\n\
         Critic feedback (avg score: {}/10, weakest: {}):\n{}\n\n\
         Improve the output below. Focus especially on \"{}\" (scored {}/10).",
        critique.avg_score, critique.weakest, critique.critique, critique.weakest, weakest_score
    );
    let task = Task::new(NodeType::Analyze, instruction)
        .with_input(output)
        .with_system_prompt(harden_persona(REFINE_PERSONA))
        .with_label("reflect [refine]");

    let result = executor.execute_one(task).await?;
    Ok(result.success.then(|| result.text().to_string()))
}

/// Outcome of a reflection loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    /// The (possibly refined) output.
    pub output: String,
    /// Score of the original output.
    pub original_score: f32,
    /// Score of the final output.
    pub final_score: f32,
    /// Whether any refinement happened.
    pub refined: bool,
    /// Every critique produced, in order.
    pub critiques: Vec<Critique>,
}

/// Full loop: criticize, refine while warranted, re-criticize; bounded by
/// `max_refinements` cycles.
pub async fn reflect(
    executor: &dyn TaskExecutor,
    output: &str,
    task_desc: &str,
    opts: &ReflectOptions,
) -> SwarmResult<Reflection> {
    let mut current = output.to_string();
    let mut critiques: Vec<Critique> = Vec::new();
    let mut refined = false;

    for cycle in 0..=opts.max_refinements {
        let critique = criticize(executor, &current, task_desc).await?;
        let stop = critique.verdict == Verdict::Pass
            || critique.avg_score >= opts.threshold
            || cycle == opts.max_refinements;
        debug!(
            cycle,
            avg_score = critique.avg_score,
            verdict = ?critique.verdict,
            "critic pass complete"
        );
        critiques.push(critique);
        if stop {
            break;
        }

        let latest = critiques
            .last()
            .cloned()
            .unwrap_or_else(|| neutral_pass(""));
        match refine_once(executor, &current, &latest, task_desc).await? {
            Some(improved) => {
                current = improved;
                refined = true;
            }
            // A failed refine keeps the original rather than blocking.
            None => break,
        }
    }

    let original_score = critiques.first().map_or(7.0, |c| c.avg_score);
    let final_score = critiques.last().map_or(7.0, |c| c.avg_score);
    info!(
        original_score,
        final_score, refined, "reflection complete"
    );

    Ok(Reflection {
        output: current,
        original_score,
        final_score,
        refined,
        critiques,
    })
}
