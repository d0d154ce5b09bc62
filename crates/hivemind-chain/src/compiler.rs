//! Chain definitions and the compiler that turns them into phases.
//!
//! A chain is the declarative, JSON-serializable description of a
//! pipeline: ordered stages, each with an execution mode and a
//! perspective. Compilation validates the definition up front (nothing
//! is dispatched on a malformed chain), then expands each stage into one
//! phase whose task generator reads the previous stage's results.

use crate::perspective::Perspective;
use crate::transform::{Transform, TransformOutput};
use hivemind_core::{
    harden_persona, NodeType, Phase, PhaseResult, RoutingHint, SwarmError, SwarmResult, Task,
    TaskSource,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_MAX_INPUT_CHARS: usize = 4000;
const TRUNCATION_MARKER: &str = "\n\n[... truncated]";
const DEFAULT_PERSONA: &str =
    "Process the input thoroughly and produce high-quality output.";

/// How a stage maps its input onto workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageMode {
    /// N caller-supplied prompts run as N tasks under one persona.
    Parallel,
    /// One worker processes the merged input (the default).
    #[default]
    Single,
    /// One input analyzed by N workers under N distinct personas.
    FanOut,
    /// N prior outputs merged by one worker into a single synthesis.
    Reduce,
}

impl std::fmt::Display for StageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageMode::Parallel => write!(f, "parallel"),
            StageMode::Single => write!(f, "single"),
            StageMode::FanOut => write!(f, "fan-out"),
            StageMode::Reduce => write!(f, "reduce"),
        }
    }
}

/// One declarative pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name; defaults to "Stage N" when omitted.
    #[serde(default)]
    pub name: Option<String>,
    /// Execution mode.
    #[serde(default)]
    pub mode: StageMode,
    /// Persona for single/parallel/reduce stages, or the sole fan-out
    /// perspective.
    #[serde(default)]
    pub perspective: Option<Perspective>,
    /// Fan-out perspectives.
    #[serde(default)]
    pub perspectives: Vec<Perspective>,
    /// Stage prompt (single/fan-out/reduce).
    #[serde(default)]
    pub prompt: Option<String>,
    /// Per-task prompts (parallel).
    #[serde(default)]
    pub prompts: Vec<String>,
    /// How the previous stage's outputs become this stage's input.
    #[serde(default)]
    pub input_transform: Option<Transform>,
    /// Extra context attached to every generated task.
    #[serde(default)]
    pub context: Option<String>,
    /// Request search grounding for this stage's tasks.
    #[serde(default)]
    pub web_search: bool,
    /// Per-task input cap; longer inputs are truncated with an explicit
    /// marker rather than failing, to stop context snowballing across
    /// long pipelines.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Whether the pipeline aborts if this stage produces zero
    /// successful results.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

fn default_required() -> bool {
    true
}

impl Default for Stage {
    fn default() -> Self {
        Self {
            name: None,
            mode: StageMode::default(),
            perspective: None,
            perspectives: Vec::new(),
            prompt: None,
            prompts: Vec::new(),
            input_transform: None,
            context: None,
            web_search: false,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            required: true,
        }
    }
}

/// A declarative pipeline: ordered stages over one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainDefinition {
    /// Pipeline name.
    pub name: String,
    /// Input fed to the first stage.
    #[serde(default)]
    pub input: Option<String>,
    /// Ordered stages.
    pub stages: Vec<Stage>,
}

impl ChainDefinition {
    /// Parse a chain from its JSON wire form.
    ///
    /// Parse failures (including unknown modes and transforms) surface as
    /// a validation error, before anything executes.
    pub fn from_json(json: &str) -> SwarmResult<Self> {
        serde_json::from_str(json).map_err(|e| SwarmError::Validation(vec![e.to_string()]))
    }

    /// Validate the definition, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.stages.is_empty() {
            errors.push("chain requires at least one stage".to_string());
        }

        for (i, stage) in self.stages.iter().enumerate() {
            match stage.mode {
                StageMode::Parallel if stage.prompts.is_empty() => {
                    errors.push(format!("stage {i} (parallel) requires a prompts list"));
                }
                StageMode::FanOut
                    if stage.perspectives.is_empty() && stage.perspective.is_none() =>
                {
                    errors.push(format!(
                        "stage {i} (fan-out) requires perspectives or a perspective"
                    ));
                }
                _ => {}
            }
            if stage.max_input_chars == 0 {
                errors.push(format!("stage {i} max_input_chars must be positive"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Compile a chain definition into the phase list the dispatcher
/// consumes. Fails closed with the full list of validation errors before
/// any task is built.
pub fn compile(def: ChainDefinition) -> SwarmResult<Vec<Phase>> {
    def.validate().map_err(SwarmError::Validation)?;

    let total = def.stages.len();
    let chain_input = def.input.clone();
    let mut phases = Vec::with_capacity(total);

    for (index, stage) in def.stages.into_iter().enumerate() {
        let phase_name = stage
            .name
            .clone()
            .unwrap_or_else(|| format!("Stage {}", index + 1));
        let required = stage.required;

        let stage = Arc::new(stage);
        let chain_input = chain_input.clone();
        let name = phase_name.clone();
        let generator = move |prior: &[PhaseResult]| {
            expand_stage(&stage, chain_input.as_deref(), index, total, &name, prior)
        };

        phases.push(Phase {
            name: phase_name,
            required,
            source: TaskSource::Generate(Box::new(generator)),
        });
    }

    debug!(stages = total, "chain compiled");
    Ok(phases)
}

/// Resolve a stage's input from the chain input (first stage) or the
/// previous stage's successful outputs run through the input transform.
fn stage_input(
    stage: &Stage,
    chain_input: Option<&str>,
    index: usize,
    prior: &[PhaseResult],
) -> TransformOutput {
    if index == 0 {
        return TransformOutput::One(chain_input.unwrap_or_default().to_string());
    }
    let outputs: Vec<&str> = prior
        .get(index - 1)
        .map(PhaseResult::successful_outputs)
        .unwrap_or_default();
    stage.input_transform.unwrap_or_default().apply(&outputs)
}

/// Cap a task input, marking the cut explicitly.
fn truncate_input(input: String, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input;
    }
    let mut cut: String = input.chars().take(max_chars).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

/// Expand one stage into its task list.
fn expand_stage(
    stage: &Stage,
    chain_input: Option<&str>,
    index: usize,
    total: usize,
    phase_name: &str,
    prior: &[PhaseResult],
) -> Vec<Task> {
    let input = stage_input(stage, chain_input, index, prior);
    let persona = harden_persona(
        stage
            .perspective
            .as_ref()
            .map_or(DEFAULT_PERSONA, Perspective::persona),
    );
    let routing = |perspective: Option<&Perspective>| RoutingHint {
        perspective: perspective
            .or(stage.perspective.as_ref())
            .map(|p| p.key().to_string()),
        stage_index: Some(index),
        is_last_stage: index + 1 == total,
    };
    let base_task = |instruction: String, task_input: String| {
        let mut task = Task::new(NodeType::Analyze, instruction)
            .with_input(truncate_input(task_input, stage.max_input_chars))
            .with_web_search(stage.web_search);
        if let Some(context) = &stage.context {
            task = task.with_context(context.clone());
        }
        task
    };

    match stage.mode {
        StageMode::Parallel => {
            let count = stage.prompts.len();
            stage
                .prompts
                .iter()
                .enumerate()
                .map(|(idx, prompt)| {
                    base_task(prompt.clone(), input.for_index(idx))
                        .with_system_prompt(persona.clone())
                        .with_routing(routing(None))
                        .with_label(format!("{phase_name} [{}/{count}]", idx + 1))
                })
                .collect()
        }
        StageMode::Single => {
            let instruction = stage
                .prompt
                .clone()
                .unwrap_or_else(|| "Process the following input.".to_string());
            vec![base_task(instruction, input.merged())
                .with_system_prompt(persona)
                .with_routing(routing(None))
                .with_label(phase_name.to_string())]
        }
        StageMode::FanOut => {
            let instruction = stage.prompt.clone().unwrap_or_else(|| {
                "Analyze the following from your unique perspective.".to_string()
            });
            let fallback: Vec<Perspective> = stage.perspective.clone().into_iter().collect();
            let perspectives: &[Perspective] = if stage.perspectives.is_empty() {
                &fallback
            } else {
                &stage.perspectives
            };
            let merged = input.merged();
            perspectives
                .iter()
                .map(|p| {
                    base_task(instruction.clone(), merged.clone())
                        .with_system_prompt(harden_persona(p.persona()))
                        .with_context(format!("Your perspective: {}", p.persona()))
                        .with_routing(routing(Some(p)))
                        .with_label(format!("{phase_name} [{}]", p.key()))
                })
                .collect()
        }
        StageMode::Reduce => {
            let instruction = stage.prompt.clone().unwrap_or_else(|| {
                "Synthesize the following analyses into a single coherent output.".to_string()
            });
            vec![base_task(instruction, input.merged())
                .with_system_prompt(persona)
                .with_routing(routing(None))
                .with_label(phase_name.to_string())]
        }
    }
}
