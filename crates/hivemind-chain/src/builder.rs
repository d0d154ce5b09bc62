//! Automatic pipeline construction.
//!
//! Callers describe WHAT they want in natural language; the builder
//! detects the kind of processing required, picks a stage sequence and
//! fan-out perspectives, and emits a ready-to-compile [`ChainDefinition`].

use crate::compiler::{ChainDefinition, Stage, StageMode};
use crate::perspective::{BuiltInPerspective, Perspective};
use crate::transform::Transform;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// How thorough the generated pipeline should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    /// 2 stages max, minimal perspectives.
    Quick,
    /// Up to 4 stages, 3 perspectives on fan-out.
    #[default]
    Standard,
    /// Up to 6 stages, 4 perspectives, a challenge pass.
    Deep,
    /// All stages, 5 perspectives, challenge and optimize passes.
    Exhaustive,
}

impl Depth {
    fn max_stages(self) -> usize {
        match self {
            Depth::Quick => 2,
            Depth::Standard => 4,
            Depth::Deep => 6,
            Depth::Exhaustive => 8,
        }
    }

    fn fan_out_width(self) -> usize {
        match self {
            Depth::Quick => 2,
            Depth::Standard => 3,
            Depth::Deep => 4,
            Depth::Exhaustive => 5,
        }
    }
}

/// Reusable pipeline building blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageTemplate {
    /// Pull raw signals out of the input.
    Extract,
    /// Score and drop low-signal items.
    Filter,
    /// Pattern and trend analysis.
    Analyze,
    /// Add outside context (search-grounded).
    Enrich,
    /// Adversarial review.
    Challenge,
    /// Final polish pass.
    Optimize,
    /// Merge everything into one output.
    Synthesize,
    /// Fan-out tuned for comparisons.
    FanOutCompare,
    /// Fan-out across general perspectives.
    FanOutPerspectives,
    /// Fan-out tuned for business-opportunity analysis.
    FanOutStrategy,
}

impl StageTemplate {
    fn is_fan_out(self) -> bool {
        matches!(
            self,
            StageTemplate::FanOutCompare
                | StageTemplate::FanOutPerspectives
                | StageTemplate::FanOutStrategy
        )
    }

    fn build(self, task: &str) -> Stage {
        match self {
            StageTemplate::Extract => Stage {
                name: Some("Extract".to_string()),
                perspective: Some(BuiltInPerspective::Extractor.into()),
                prompt: Some(format!(
                    "Extract key data points and signals. One per line. \
                     Include numbers and metrics. Focus: {task}"
                )),
                ..Stage::default()
            },
            StageTemplate::Filter => Stage {
                name: Some("Filter & Score".to_string()),
                perspective: Some(BuiltInPerspective::Filter.into()),
                prompt: Some(format!(
                    "Remove noise and duplicates. Score items 1-10 for relevance \
                     to: {task}. Output only 6+ as: [score] item"
                )),
                input_transform: Some(Transform::Merge),
                ..Stage::default()
            },
            StageTemplate::Analyze => Stage {
                name: Some("Analyze".to_string()),
                perspective: Some(BuiltInPerspective::Analyst.into()),
                prompt: Some(format!(
                    "Identify patterns, trends, and implications. What is \
                     surprising? What is missing? Be concise. Focus: {task}"
                )),
                input_transform: Some(Transform::Merge),
                ..Stage::default()
            },
            StageTemplate::Enrich => Stage {
                name: Some("Enrich".to_string()),
                perspective: Some(BuiltInPerspective::Enricher.into()),
                prompt: Some(format!(
                    "Add market context and competitor data. No fluff; only facts \
                     that change the analysis. Focus: {task}"
                )),
                input_transform: Some(Transform::Merge),
                web_search: true,
                ..Stage::default()
            },
            StageTemplate::Challenge => Stage {
                name: Some("Challenge".to_string()),
                perspective: Some(BuiltInPerspective::Challenger.into()),
                prompt: Some(format!(
                    "Devil's advocate: blind spots, unsupported assumptions, \
                     ignored risks. Be specific. Context: {task}"
                )),
                input_transform: Some(Transform::Merge),
                ..Stage::default()
            },
            StageTemplate::Optimize => Stage {
                name: Some("Optimize".to_string()),
                perspective: Some(BuiltInPerspective::Optimizer.into()),
                prompt: Some(format!(
                    "Sharpen conclusions, fix inconsistencies, make actionable. \
                     Context: {task}"
                )),
                input_transform: Some(Transform::Merge),
                ..Stage::default()
            },
            StageTemplate::Synthesize => Stage {
                name: Some("Synthesize".to_string()),
                mode: StageMode::Reduce,
                perspective: Some(BuiltInPerspective::Synthesizer.into()),
                prompt: Some(format!(
                    "Synthesize into one coherent output. Resolve contradictions. \
                     Key insights and actionable takeaways. Be concise. Context: {task}"
                )),
                input_transform: Some(Transform::Merge),
                ..Stage::default()
            },
            StageTemplate::FanOutCompare => Stage {
                name: Some("Compare from Multiple Angles".to_string()),
                mode: StageMode::FanOut,
                perspectives: vec![
                    BuiltInPerspective::Analyst.into(),
                    BuiltInPerspective::Strategist.into(),
                    BuiltInPerspective::Critic.into(),
                ],
                prompt: Some(format!(
                    "Compare the items in this data. Evaluate strengths, \
                     weaknesses, and tradeoffs. Be specific. Context: {task}"
                )),
                input_transform: Some(Transform::Merge),
                ..Stage::default()
            },
            StageTemplate::FanOutPerspectives => Stage {
                name: Some("Multi-Perspective Analysis".to_string()),
                mode: StageMode::FanOut,
                perspectives: vec![
                    BuiltInPerspective::Analyst.into(),
                    BuiltInPerspective::Challenger.into(),
                    BuiltInPerspective::Strategist.into(),
                ],
                prompt: Some(format!(
                    "Analyze this data from your unique perspective. What do you \
                     see that others might miss? Context: {task}"
                )),
                input_transform: Some(Transform::Merge),
                ..Stage::default()
            },
            StageTemplate::FanOutStrategy => Stage {
                name: Some("Strategic Analysis".to_string()),
                mode: StageMode::FanOut,
                perspectives: vec![
                    BuiltInPerspective::Analyst.into(),
                    BuiltInPerspective::Strategist.into(),
                    BuiltInPerspective::Challenger.into(),
                ],
                prompt: Some(format!(
                    "Evaluate the business opportunities in this data. What should \
                     be built? Who pays? What is the moat? Context: {task}"
                )),
                input_transform: Some(Transform::Merge),
                ..Stage::default()
            },
        }
    }
}

/// A detected processing pattern.
#[derive(Debug, Clone, Copy)]
pub struct TaskPattern {
    /// Pattern name.
    pub name: &'static str,
    /// Human description of the detected pattern.
    pub description: &'static str,
    regex: &'static str,
    /// Stage sequence for this pattern.
    pub stages: &'static [StageTemplate],
}

/// The recognized task patterns, checked in order.
pub const TASK_PATTERNS: &[TaskPattern] = &[
    TaskPattern {
        name: "comparative",
        description: "Comparing multiple options or entities",
        regex: r"(?i)compare|vs\.?|versus|difference|better|worse|rank|which.*best",
        stages: &[
            StageTemplate::Extract,
            StageTemplate::FanOutCompare,
            StageTemplate::Synthesize,
        ],
    },
    TaskPattern {
        name: "research-deep",
        description: "Deep research requiring multiple passes",
        regex: r"(?i)research|investigate|deep.?dive|thorough|comprehensive|everything about",
        stages: &[
            StageTemplate::Extract,
            StageTemplate::Enrich,
            StageTemplate::FanOutPerspectives,
            StageTemplate::Synthesize,
        ],
    },
    TaskPattern {
        name: "adversarial",
        description: "Analysis with adversarial review",
        regex: r"(?i)challenge|devil.?s?.?advocate|poke holes|risk|what could go wrong|critique|stress.?test",
        stages: &[
            StageTemplate::Extract,
            StageTemplate::FanOutPerspectives,
            StageTemplate::Challenge,
            StageTemplate::Synthesize,
        ],
    },
    TaskPattern {
        name: "filter-refine",
        description: "Extract then progressively filter and refine",
        regex: r"(?i)filter|refine|narrow|top \d+|best \d+|most important|prioritize|relevant",
        stages: &[
            StageTemplate::Extract,
            StageTemplate::Filter,
            StageTemplate::FanOutPerspectives,
            StageTemplate::Synthesize,
        ],
    },
    TaskPattern {
        name: "multi-perspective",
        description: "Same data analyzed from multiple viewpoints",
        regex: r"(?i)perspective|viewpoint|angle|different.*view|stakeholder|opinion",
        stages: &[
            StageTemplate::Extract,
            StageTemplate::FanOutPerspectives,
            StageTemplate::Synthesize,
        ],
    },
    TaskPattern {
        name: "opportunity",
        description: "Business opportunity analysis",
        regex: r"(?i)opportunit|business|market|monetiz|revenue|profit|build|product",
        stages: &[
            StageTemplate::Extract,
            StageTemplate::Enrich,
            StageTemplate::FanOutStrategy,
            StageTemplate::Synthesize,
        ],
    },
    TaskPattern {
        name: "summarize",
        description: "Condensed summary",
        regex: r"(?i)summarize|summary|tldr|brief|condense|digest|overview",
        stages: &[StageTemplate::Extract, StageTemplate::Synthesize],
    },
];

const GENERAL_PATTERN: TaskPattern = TaskPattern {
    name: "general",
    description: "General analysis",
    regex: "",
    stages: &[
        StageTemplate::Extract,
        StageTemplate::FanOutPerspectives,
        StageTemplate::Synthesize,
    ],
};

#[allow(clippy::expect_used)] // static patterns
fn compiled_patterns() -> &'static Vec<Regex> {
    static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        TASK_PATTERNS
            .iter()
            .map(|p| Regex::new(p.regex).expect("static pattern"))
            .collect()
    })
}

/// Detect what kind of processing a task description asks for.
pub fn detect_task_pattern(task: &str) -> TaskPattern {
    for (pattern, regex) in TASK_PATTERNS.iter().zip(compiled_patterns()) {
        if regex.is_match(task) {
            return *pattern;
        }
    }
    GENERAL_PATTERN
}

/// Pick fan-out perspectives for a task: keyword-scored, always favoring
/// an analyst plus one contrarian voice.
pub fn select_perspectives(task: &str, count: usize) -> Vec<Perspective> {
    const KEYWORDS: &[(BuiltInPerspective, &str)] = &[
        (BuiltInPerspective::Analyst, r"(?i)data|pattern|trend|number|metric|stat"),
        (
            BuiltInPerspective::Strategist,
            r"(?i)business|market|revenue|growth|compete|position",
        ),
        (
            BuiltInPerspective::Challenger,
            r"(?i)risk|wrong|fail|problem|issue|concern|challenge",
        ),
        (
            BuiltInPerspective::Optimizer,
            r"(?i)improve|better|refine|optimize|efficient",
        ),
        (
            BuiltInPerspective::Researcher,
            r"(?i)research|learn|discover|explore|investigate",
        ),
        (
            BuiltInPerspective::Critic,
            r"(?i)quality|evaluate|assess|judge|rate|review",
        ),
        (
            BuiltInPerspective::Enricher,
            r"(?i)context|detail|depth|background|history",
        ),
        (
            BuiltInPerspective::Synthesizer,
            r"(?i)combine|merge|overall|summary|conclusion",
        ),
    ];

    let mut scored: Vec<(BuiltInPerspective, f32)> = KEYWORDS
        .iter()
        .map(|(persp, pattern)| {
            let hit = Regex::new(pattern).map(|re| re.is_match(task)).unwrap_or(false);
            let mut score = if hit { 2.0 } else { 1.0 };
            if *persp == BuiltInPerspective::Analyst {
                score += 1.0;
            }
            if *persp == BuiltInPerspective::Challenger {
                score += 0.5;
            }
            (*persp, score)
        })
        .collect();

    // Stable sort keeps the table order among equal scores, so the
    // selection is deterministic.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(count)
        .map(|(p, _)| p.into())
        .collect()
}

/// Inputs to [`build_auto_chain`].
#[derive(Debug, Clone, Default)]
pub struct AutoChainOptions {
    /// What to accomplish, in natural language.
    pub task: String,
    /// Input data to process.
    pub data: Option<String>,
    /// Depth preset.
    pub depth: Depth,
    /// Override the automatic perspective selection for fan-out stages.
    pub perspectives: Option<Vec<Perspective>>,
    /// Override the detected stage sequence.
    pub stages: Option<Vec<StageTemplate>>,
}

/// Build a chain definition automatically from a task description.
pub fn build_auto_chain(opts: &AutoChainOptions) -> ChainDefinition {
    let pattern = detect_task_pattern(&opts.task);
    let mut templates: Vec<StageTemplate> = opts
        .stages
        .clone()
        .unwrap_or_else(|| pattern.stages.to_vec());

    // Trim to the depth limit, always keeping the first and last stages.
    let max_stages = opts.depth.max_stages();
    if templates.len() > max_stages && templates.len() > 2 {
        let first = templates[0];
        let last = templates[templates.len() - 1];
        let middle: Vec<StageTemplate> = templates[1..templates.len() - 1]
            .iter()
            .copied()
            .take(max_stages.saturating_sub(2))
            .collect();
        templates = std::iter::once(first)
            .chain(middle)
            .chain(std::iter::once(last))
            .collect();
    }

    // Deeper presets add extra refinement passes.
    if matches!(opts.depth, Depth::Deep | Depth::Exhaustive)
        && !templates.contains(&StageTemplate::Challenge)
    {
        if let Some(synth) = templates
            .iter()
            .position(|t| *t == StageTemplate::Synthesize)
        {
            if synth > 0 {
                templates.insert(synth, StageTemplate::Challenge);
            }
        }
    }
    if opts.depth == Depth::Exhaustive && !templates.contains(&StageTemplate::Optimize) {
        templates.push(StageTemplate::Optimize);
    }

    let selected = opts
        .perspectives
        .clone()
        .unwrap_or_else(|| select_perspectives(&opts.task, opts.depth.fan_out_width()));

    let stages: Vec<Stage> = templates
        .iter()
        .map(|template| {
            let mut stage = template.build(&opts.task);
            if template.is_fan_out() {
                stage.perspectives = selected.clone();
            }
            stage
        })
        .collect();

    ChainDefinition {
        name: format!("Auto: {}", pattern.description),
        input: opts.data.clone(),
        stages,
    }
}

/// Per-stage summary for [`preview_chain`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagePreview {
    /// Stage name.
    pub name: String,
    /// Execution mode.
    pub mode: String,
    /// Perspective key(s), comma-joined.
    pub perspective: String,
    /// Whether the stage is search-grounded.
    pub web_search: bool,
}

/// Summary of what a chain would do, without executing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainPreview {
    /// Chain name.
    pub name: String,
    /// Stage count.
    pub stage_count: usize,
    /// Estimated task count across all stages.
    pub estimated_tasks: usize,
    /// Per-stage summaries.
    pub stages: Vec<StagePreview>,
}

/// Summarize a chain definition without executing it.
pub fn preview_chain(def: &ChainDefinition) -> ChainPreview {
    let stages: Vec<StagePreview> = def
        .stages
        .iter()
        .enumerate()
        .map(|(i, stage)| StagePreview {
            name: stage
                .name
                .clone()
                .unwrap_or_else(|| format!("Stage {}", i + 1)),
            mode: stage.mode.to_string(),
            perspective: if !stage.perspectives.is_empty() {
                stage
                    .perspectives
                    .iter()
                    .map(Perspective::key)
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                stage
                    .perspective
                    .as_ref()
                    .map_or_else(|| "default".to_string(), |p| p.key().to_string())
            },
            web_search: stage.web_search,
        })
        .collect();

    let estimated_tasks = def
        .stages
        .iter()
        .map(|stage| match stage.mode {
            StageMode::FanOut => stage.perspectives.len().max(1),
            StageMode::Parallel => stage.prompts.len().max(1),
            StageMode::Single | StageMode::Reduce => 1,
        })
        .sum();

    ChainPreview {
        name: def.name.clone(),
        stage_count: def.stages.len(),
        estimated_tasks,
        stages,
    }
}
