//! Engine configuration.
//!
//! Serde structs with defaults, loadable from TOML. Every tunable that
//! the components treat as a policy knob (pool caps, routing threshold,
//! cache TTL, quality-gate bands) lives here rather than in code.

use crate::error::{SwarmError, SwarmResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Worker pool and retry settings.
    #[serde(default)]
    pub scaling: ScalingConfig,
    /// Model tier routing settings.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Prompt cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Output quality gate settings.
    #[serde(default)]
    pub quality: QualityConfig,
}

impl SwarmConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> SwarmResult<Self> {
        toml::from_str(s).map_err(|e| SwarmError::Config(e.to_string()))
    }

    /// Load a configuration file; a missing file yields the defaults.
    pub fn load(path: &Path) -> SwarmResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Worker pool, concurrency, and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Maximum worker nodes per node type (lazy growth cap).
    #[serde(default = "default_max_nodes_per_type")]
    pub max_nodes_per_type: usize,
    /// Global ceiling on simultaneously in-flight completion calls,
    /// shared across all node types and pipelines.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Default retry budget for tasks that do not set their own.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Explicit per-attempt timeout; `None` selects the automatic budget.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Base for the linear retry backoff (`backoff_base_ms × attempt`).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Per-attempt timeout when the prompt is below the large threshold.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Prompt length (chars) above which the extended budget applies.
    #[serde(default = "default_large_prompt_threshold")]
    pub large_prompt_threshold: usize,
    /// Per-attempt timeout for large prompts.
    #[serde(default = "default_large_prompt_timeout_ms")]
    pub large_prompt_timeout_ms: u64,
    /// Output token cap automatically applied to large prompts when the
    /// task did not set one.
    #[serde(default = "default_large_prompt_max_tokens")]
    pub large_prompt_max_tokens: u32,
}

fn default_max_nodes_per_type() -> usize {
    4
}

fn default_max_concurrent() -> usize {
    8
}

fn default_retries() -> u32 {
    1
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_large_prompt_threshold() -> usize {
    10_000
}

fn default_large_prompt_timeout_ms() -> u64 {
    90_000
}

fn default_large_prompt_max_tokens() -> u32 {
    8192
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            max_nodes_per_type: default_max_nodes_per_type(),
            max_concurrent: default_max_concurrent(),
            retries: default_retries(),
            timeout_ms: None,
            backoff_base_ms: default_backoff_base_ms(),
            default_timeout_ms: default_timeout_ms(),
            large_prompt_threshold: default_large_prompt_threshold(),
            large_prompt_timeout_ms: default_large_prompt_timeout_ms(),
            large_prompt_max_tokens: default_large_prompt_max_tokens(),
        }
    }
}

/// Model tier routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Whether complexity routing is applied at all.
    #[serde(default = "default_routing_enabled")]
    pub enabled: bool,
    /// Weighted-score threshold at or above which the quality tier is
    /// selected.
    #[serde(default = "default_routing_threshold")]
    pub threshold: f32,
    /// Model id for the fast/cheap tier.
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
    /// Model id for the higher-quality tier.
    #[serde(default = "default_quality_model")]
    pub quality_model: String,
}

fn default_routing_enabled() -> bool {
    true
}

fn default_routing_threshold() -> f32 {
    8.0
}

fn default_fast_model() -> String {
    "fast-tier".to_string()
}

fn default_quality_model() -> String {
    "quality-tier".to_string()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: default_routing_enabled(),
            threshold: default_routing_threshold(),
            fast_model: default_fast_model(),
            quality_model: default_quality_model(),
        }
    }
}

/// Prompt cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry cap; the least-recently-inserted entry is evicted at
    /// capacity.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Default entry lifetime in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// How many leading chars of the input participate in key
    /// derivation. Inputs differing only beyond this prefix alias to the
    /// same key; widen when long near-duplicate inputs are a real risk.
    #[serde(default = "default_key_input_prefix_chars")]
    pub key_input_prefix_chars: usize,
    /// Where to persist the cache between runs; `None` disables
    /// persistence.
    #[serde(default)]
    pub persist_path: Option<PathBuf>,
}

fn default_max_entries() -> usize {
    500
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_key_input_prefix_chars() -> usize {
    2000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
            key_input_prefix_chars: default_key_input_prefix_chars(),
            persist_path: None,
        }
    }
}

/// Output quality gate settings.
///
/// The truncation band is an empirically chosen heuristic; it is exposed
/// as configuration rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Responses shorter than this are rejected outright.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    /// Refusal-pattern matches are only rejected below this length.
    #[serde(default = "default_refusal_max_chars")]
    pub refusal_max_chars: usize,
    /// Lower bound of the truncation-rejection band.
    #[serde(default = "default_truncation_band_min")]
    pub truncation_band_min: usize,
    /// Upper bound of the truncation-rejection band. Longer unterminated
    /// responses still carry salvageable value and pass.
    #[serde(default = "default_truncation_band_max")]
    pub truncation_band_max: usize,
}

fn default_min_chars() -> usize {
    5
}

fn default_refusal_max_chars() -> usize {
    200
}

fn default_truncation_band_min() -> usize {
    500
}

fn default_truncation_band_max() -> usize {
    2000
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            refusal_max_chars: default_refusal_max_chars(),
            truncation_band_min: default_truncation_band_min(),
            truncation_band_max: default_truncation_band_max(),
        }
    }
}
