//! Majority voting / best-of-N.
//!
//! The same prompt runs N times concurrently (never cached, so the
//! candidates are actually independent samples), then a winner is picked
//! by one of three interchangeable strategies: `longest` (heuristic, zero
//! extra cost), `similarity` (pairwise Jaccard consensus), or `judge`
//! (one extra LLM call that scores all candidates, falling back to
//! `longest` when its output does not parse).

use crate::parse::extract_json;
use hivemind_core::{harden_persona, NodeType, SwarmError, SwarmResult, Task, TaskExecutor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Default candidate count.
pub const DEFAULT_CANDIDATES: usize = 3;
/// Hard cap on candidate count.
pub const MAX_CANDIDATES: usize = 7;

const JUDGE_PERSONA: &str =
    "You are a precise quality evaluator. Always respond with valid JSON only, no markdown.";

/// Winner-selection strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStrategy {
    /// One extra LLM call scores all candidates and names a winner.
    #[default]
    Judge,
    /// Longest response wins; zero extra cost.
    Longest,
    /// Most central candidate by pairwise Jaccard similarity wins.
    Similarity,
}

/// Voting options.
#[derive(Debug, Clone)]
pub struct VoteOptions {
    /// Candidate count, clamped to [`MAX_CANDIDATES`].
    pub candidates: usize,
    /// Winner-selection strategy.
    pub strategy: VoteStrategy,
    /// System prompt shared by every candidate task.
    pub system_prompt: Option<String>,
}

impl Default for VoteOptions {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES,
            strategy: VoteStrategy::default(),
            system_prompt: None,
        }
    }
}

/// Candidate metadata reported in the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    /// Position in the original submission order.
    pub index: usize,
    /// Response length in characters.
    pub length: usize,
    /// First 200 characters of the response.
    pub preview: String,
}

/// Result of a voting round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteOutcome {
    /// The winning response.
    pub output: String,
    /// Index of the winner among the valid candidates.
    pub winner: usize,
    /// Strategy that picked the winner.
    pub strategy: VoteStrategy,
    /// Candidates requested (after clamping).
    pub requested: usize,
    /// Candidates that produced usable output.
    pub valid_candidates: usize,
    /// Per-candidate metadata.
    pub candidates: Vec<CandidateSummary>,
    /// Mean pairwise similarity per candidate, for the similarity
    /// strategy.
    pub similarity_scores: Option<Vec<f32>>,
    /// Whether the judge's output was unusable and `longest` decided
    /// instead.
    pub judge_fallback: bool,
}

struct Candidate {
    index: usize,
    text: String,
}

/// Run best-of-N voting over one prompt.
pub async fn vote(
    executor: &dyn TaskExecutor,
    instruction: &str,
    input: &str,
    opts: &VoteOptions,
) -> SwarmResult<VoteOutcome> {
    let n = opts.candidates.clamp(1, MAX_CANDIDATES);

    let tasks: Vec<Task> = (0..n)
        .map(|i| {
            let mut task = Task::new(NodeType::Analyze, instruction)
                .with_input(input)
                .non_cacheable()
                .with_label(format!("vote [{}/{n}]", i + 1));
            if let Some(system_prompt) = &opts.system_prompt {
                task = task.with_system_prompt(system_prompt.clone());
            }
            task
        })
        .collect();

    let results = executor.execute_many(tasks).await?;
    let candidates: Vec<Candidate> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.success && !r.text().trim().is_empty())
        .map(|(index, r)| Candidate {
            index,
            text: r.text().trim().to_string(),
        })
        .collect();

    if candidates.is_empty() {
        return Err(SwarmError::Provider(format!(
            "all {n} vote candidates failed"
        )));
    }

    let summaries: Vec<CandidateSummary> = candidates
        .iter()
        .map(|c| CandidateSummary {
            index: c.index,
            length: c.text.chars().count(),
            preview: c.text.chars().take(200).collect(),
        })
        .collect();

    if candidates.len() == 1 {
        debug!("only one valid candidate; it wins by default");
        return Ok(VoteOutcome {
            output: candidates[0].text.clone(),
            winner: 0,
            strategy: opts.strategy,
            requested: n,
            valid_candidates: 1,
            candidates: summaries,
            similarity_scores: None,
            judge_fallback: false,
        });
    }

    let mut similarity_scores = None;
    let mut judge_fallback = false;
    let winner = match opts.strategy {
        VoteStrategy::Longest => pick_longest(&candidates),
        VoteStrategy::Similarity => {
            let (winner, scores) = pick_by_similarity(&candidates);
            similarity_scores = Some(scores);
            winner
        }
        VoteStrategy::Judge => match judge_pick(executor, instruction, &candidates).await {
            Some(winner) => winner,
            None => {
                judge_fallback = true;
                pick_longest(&candidates)
            }
        },
    };

    info!(
        strategy = ?opts.strategy,
        winner,
        valid = candidates.len(),
        "vote decided"
    );

    Ok(VoteOutcome {
        output: candidates[winner].text.clone(),
        winner,
        strategy: opts.strategy,
        requested: n,
        valid_candidates: candidates.len(),
        candidates: summaries,
        similarity_scores,
        judge_fallback,
    })
}

/// Longest response wins; earliest wins ties, so the pick is
/// deterministic.
fn pick_longest(candidates: &[Candidate]) -> usize {
    let mut best = 0;
    let mut best_len = 0;
    for (i, candidate) in candidates.iter().enumerate() {
        let len = candidate.text.chars().count();
        if len > best_len {
            best_len = len;
            best = i;
        }
    }
    best
}

/// Jaccard similarity over lowercase word sets.
fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Consensus pick: the candidate most similar to all the others.
fn pick_by_similarity(candidates: &[Candidate]) -> (usize, Vec<f32>) {
    let lowered: Vec<String> = candidates.iter().map(|c| c.text.to_lowercase()).collect();
    let word_sets: Vec<HashSet<&str>> = lowered
        .iter()
        .map(|t| t.split_whitespace().collect())
        .collect();

    let scores: Vec<f32> = (0..candidates.len())
        .map(|i| {
            let total: f32 = (0..candidates.len())
                .filter(|&j| j != i)
                .map(|j| jaccard(&word_sets[i], &word_sets[j]))
                .sum();
            total / (candidates.len() - 1) as f32
        })
        .collect();

    let mut best = 0;
    for (i, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = i;
        }
    }
    (best, scores)
}

#[derive(Debug, Deserialize)]
struct JudgeWire {
    winner: Option<i64>,
}

/// One extra LLM call scoring all candidates. Returns `None` whenever
/// the judge's output cannot name a winner, so the caller can fall back
/// deterministically.
async fn judge_pick(
    executor: &dyn TaskExecutor,
    original_task: &str,
    candidates: &[Candidate],
) -> Option<usize> {
    let listing: String = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let excerpt: String = c.text.chars().take(2000).collect();
            format!("--- CANDIDATE {} ---\n{excerpt}\n", i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let instruction = format!(
        "You are a quality judge. Given the original task and {} candidate responses, pick the BEST one.\n\n\
         Score each on accuracy, completeness, clarity, and actionability (1-10 each), then pick the winner.\n\n\
         Original task: {original_task}\n\n{listing}\n\
         Respond in JSON: {{\"winner\": <candidate number, 1-indexed>, \"reasoning\": \"why\"}}",
        candidates.len()
    );

    let task = Task::new(NodeType::Analyze, instruction)
        .with_system_prompt(harden_persona(JUDGE_PERSONA))
        .non_cacheable()
        .with_label("vote [judge]");

    let result = executor.execute_one(task).await.ok()?;
    if !result.success {
        return None;
    }
    let wire: JudgeWire = serde_json::from_str(&extract_json(result.text())?).ok()?;
    let winner = wire.winner?;
    if winner < 1 {
        return None;
    }
    Some(((winner - 1) as usize).min(candidates.len() - 1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedExecutor;

    fn opts(strategy: VoteStrategy) -> VoteOptions {
        VoteOptions {
            strategy,
            ..VoteOptions::default()
        }
    }

    #[tokio::test]
    async fn test_longest_strategy_picks_longest() {
        let executor = ScriptedExecutor::with_many(vec![vec![
            Some("short.".to_string()),
            Some("a considerably longer and more thorough response.".to_string()),
            Some("mid-length answer here.".to_string()),
        ]]);

        let outcome = vote(&executor, "answer", "", &opts(VoteStrategy::Longest))
            .await
            .unwrap();
        assert_eq!(outcome.winner, 1);
        assert!(outcome.output.starts_with("a considerably"));
        assert_eq!(outcome.valid_candidates, 3);
    }

    #[tokio::test]
    async fn test_similarity_strategy_picks_consensus() {
        let executor = ScriptedExecutor::with_many(vec![vec![
            Some("the cache evicts the oldest entry first".to_string()),
            Some("the cache evicts the oldest entry when full".to_string()),
            Some("bananas are an excellent source of potassium".to_string()),
        ]]);

        let outcome = vote(&executor, "explain eviction", "", &opts(VoteStrategy::Similarity))
            .await
            .unwrap();
        assert_ne!(outcome.winner, 2, "the outlier must not win");
        let scores = outcome.similarity_scores.unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores[outcome.winner] >= scores[2]);
    }

    #[tokio::test]
    async fn test_judge_strategy_honors_judge_verdict() {
        let executor = ScriptedExecutor::with_many(vec![vec![
            Some("candidate one text.".to_string()),
            Some("candidate two text.".to_string()),
            Some("candidate three text.".to_string()),
        ]])
        .and_one(vec![Some(r#"{"winner": 2, "reasoning": "most complete"}"#.to_string())]);

        let outcome = vote(&executor, "pick", "", &opts(VoteStrategy::Judge))
            .await
            .unwrap();
        assert_eq!(outcome.winner, 1, "judge is 1-indexed");
        assert_eq!(outcome.output, "candidate two text.");
        assert!(!outcome.judge_fallback);
    }

    #[tokio::test]
    async fn test_unparseable_judge_falls_back_to_longest() {
        let executor = ScriptedExecutor::with_many(vec![vec![
            Some("tiny.".to_string()),
            Some("the decisively longest candidate response of them all.".to_string()),
            Some("medium sized one.".to_string()),
        ]])
        .and_one(vec![Some("I liked them all, great work everyone!".to_string())]);

        let outcome = vote(&executor, "pick", "", &opts(VoteStrategy::Judge))
            .await
            .unwrap();
        assert!(outcome.judge_fallback);
        assert_eq!(outcome.winner, 1, "deterministic longest fallback");
        assert!(outcome.output.starts_with("the decisively"));
    }

    #[tokio::test]
    async fn test_out_of_range_judge_winner_is_clamped() {
        let executor = ScriptedExecutor::with_many(vec![vec![
            Some("first answer text.".to_string()),
            Some("second answer text.".to_string()),
        ]])
        .and_one(vec![Some(r#"{"winner": 9}"#.to_string())]);

        let outcome = vote(&executor, "pick", "", &opts(VoteStrategy::Judge))
            .await
            .unwrap();
        assert_eq!(outcome.winner, 1, "clamped to the last candidate");
    }

    #[tokio::test]
    async fn test_candidate_count_is_clamped() {
        let executor = ScriptedExecutor::with_many(vec![(0..MAX_CANDIDATES)
            .map(|i| Some(format!("candidate number {i}.")))
            .collect()]);

        let outcome = vote(
            &executor,
            "go",
            "",
            &VoteOptions {
                candidates: 20,
                strategy: VoteStrategy::Longest,
                ..VoteOptions::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.requested, MAX_CANDIDATES);
        assert_eq!(executor.last_many_size(), MAX_CANDIDATES);
    }

    #[tokio::test]
    async fn test_failed_candidates_are_skipped() {
        let executor = ScriptedExecutor::with_many(vec![vec![
            None,
            Some("the only survivor.".to_string()),
            None,
        ]]);

        let outcome = vote(&executor, "go", "", &opts(VoteStrategy::Judge))
            .await
            .unwrap();
        assert_eq!(outcome.valid_candidates, 1);
        assert_eq!(outcome.output, "the only survivor.");
        assert_eq!(
            executor.one_calls(),
            0,
            "no judge call for a single candidate"
        );
    }

    #[tokio::test]
    async fn test_all_failed_candidates_error() {
        let executor = ScriptedExecutor::with_many(vec![vec![None, None, None]]);

        let err = vote(&executor, "go", "", &opts(VoteStrategy::Longest))
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::Provider(_)));
    }

    #[tokio::test]
    async fn test_candidates_are_not_cacheable() {
        let executor = ScriptedExecutor::with_many(vec![vec![
            Some("one answer.".to_string()),
            Some("two answer.".to_string()),
            Some("three answer.".to_string()),
        ]]);

        vote(&executor, "go", "", &opts(VoteStrategy::Longest))
            .await
            .unwrap();
        assert!(
            executor.last_many_tasks().iter().all(|t| !t.uses_cache()),
            "vote candidates must bypass the cache"
        );
    }
}
