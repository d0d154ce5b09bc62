//! Task and result types: the unit of work the dispatcher hands to a
//! worker node, and the terminal record the worker hands back.

use crate::diagnose::ErrorCategory;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability category of a worker node.
///
/// Every node type is backed by the completion capability; the type picks
/// the default persona a task runs under when it does not override the
/// system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Finds information; responses are expected to be fresh, not cached.
    Search,
    /// Retrieves and condenses a single source.
    Fetch,
    /// General-purpose analysis.
    Analyze,
    /// Pulls structured facts out of unstructured text.
    Extract,
    /// Combines multiple inputs into one output.
    Synthesize,
}

impl NodeType {
    /// Default persona for tasks of this type.
    pub fn default_persona(&self) -> &'static str {
        match self {
            NodeType::Search => {
                "You find current, relevant information for the query. \
                 Prefer primary sources. Report what you found and what you could not."
            }
            NodeType::Fetch => {
                "You condense a single source into its essential content. \
                 Preserve facts, figures, and attribution. Drop boilerplate."
            }
            NodeType::Analyze => {
                "You analyze information thoroughly and produce focused, \
                 high-quality output. Prioritize insight density over length."
            }
            NodeType::Extract => {
                "You extract raw data, facts, and signals from text. \
                 No interpretation, just clean extraction. Be exhaustive."
            }
            NodeType::Synthesize => {
                "You combine multiple analyses into a coherent whole. \
                 Resolve contradictions. Highlight consensus and disagreement. Be concise."
            }
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::Search => write!(f, "search"),
            NodeType::Fetch => write!(f, "fetch"),
            NodeType::Analyze => write!(f, "analyze"),
            NodeType::Extract => write!(f, "extract"),
            NodeType::Synthesize => write!(f, "synthesize"),
        }
    }
}

/// Metadata the complexity router reads off a task.
///
/// Chain compilation fills this in; hand-built tasks usually leave it at
/// the default, where every signal contributes zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingHint {
    /// Perspective key the task runs under (built-in key or "custom").
    #[serde(default)]
    pub perspective: Option<String>,
    /// Position of the originating stage within its pipeline (0-based).
    #[serde(default)]
    pub stage_index: Option<usize>,
    /// Whether the originating stage is the pipeline's final stage.
    #[serde(default)]
    pub is_last_stage: bool,
}

/// A unit of work submitted to a worker node.
///
/// Immutable once dispatched: retries re-submit the same task, and the
/// dispatcher never rewrites fields after handing the task to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id, assigned at construction.
    pub id: Uuid,
    /// Capability category (selects the worker pool and default persona).
    pub node_type: NodeType,
    /// Primary prompt.
    pub instruction: String,
    /// Data to operate on.
    #[serde(default)]
    pub input: String,
    /// Extra prompt context, rendered between instruction and input.
    #[serde(default)]
    pub context: Option<String>,
    /// System prompt override; defaults to the node type's persona.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Request search grounding; implies the response must be fresh.
    #[serde(default)]
    pub web_search: bool,
    /// Whether the response may be served from / stored into the cache.
    /// Forced off when `web_search` is set.
    #[serde(default = "default_cacheable")]
    pub cacheable: bool,
    /// Additional attempts permitted after the first.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Explicit wall-clock budget per task; `None` selects the automatic
    /// budget (extended for large prompts).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Explicit output token cap; `None` selects the automatic cap.
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Router metadata.
    #[serde(default)]
    pub routing: RoutingHint,
    /// Human-readable label for logging and progress streams.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_cacheable() -> bool {
    true
}

fn default_retries() -> u32 {
    1
}

impl Task {
    /// Create a task with the given node type and instruction.
    pub fn new(node_type: NodeType, instruction: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_type,
            instruction: instruction.into(),
            input: String::new(),
            context: None,
            system_prompt: None,
            web_search: false,
            cacheable: true,
            retries: default_retries(),
            timeout_ms: None,
            max_output_tokens: None,
            routing: RoutingHint::default(),
            label: None,
        }
    }

    /// Set the input data.
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    /// Set extra prompt context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Override the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Enable search grounding. Grounded calls bypass the cache.
    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    /// Disable caching for this task.
    pub fn non_cacheable(mut self) -> Self {
        self.cacheable = false;
        self
    }

    /// Set the retry budget.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set an explicit per-task timeout.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set an explicit output token cap.
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Attach router metadata.
    pub fn with_routing(mut self, routing: RoutingHint) -> Self {
        self.routing = routing;
        self
    }

    /// Attach a display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether the cache may be consulted for this task.
    ///
    /// Grounded calls must be fresh, so `web_search` always wins over
    /// `cacheable`.
    pub fn uses_cache(&self) -> bool {
        self.cacheable && !self.web_search
    }

    /// Combined prompt-side length, used for the large-prompt budget.
    pub fn prompt_len(&self) -> usize {
        self.instruction.len()
            + self.context.as_deref().map_or(0, str::len)
            + self.input.len()
    }

    /// Label for logs: the explicit label if set, else the task id.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(l) => l.clone(),
            None => self.id.to_string(),
        }
    }
}

/// Terminal outcome of one task.
///
/// Exactly one per task: a retried task yields a single result after all
/// attempts, with `retry_count` recording how many re-attempts were used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Id of the originating task.
    pub task_id: Uuid,
    /// Id of the worker node that executed every attempt.
    pub node_id: Uuid,
    /// Whether the task produced an accepted response.
    pub success: bool,
    /// The response text, on success.
    pub value: Option<String>,
    /// The final error message, on failure.
    pub error: Option<String>,
    /// Category of the final error, on failure.
    pub error_kind: Option<ErrorCategory>,
    /// Total wall-clock time across all attempts, in milliseconds.
    pub duration_ms: u64,
    /// Whether the response was served from the cache.
    pub cached: bool,
    /// Number of re-attempts used (0 = first attempt succeeded).
    pub retry_count: u32,
    /// Whether the final failure was a quality-gate rejection.
    pub quality_rejected: bool,
}

impl TaskResult {
    /// The response text, or an empty string.
    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}
