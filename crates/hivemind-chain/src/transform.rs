//! Stage input transforms.
//!
//! A transform reshapes the previous stage's successful outputs into the
//! next stage's input: one merged string for single/reduce stages, or a
//! list for parallel stages.

use serde::{Deserialize, Serialize};

/// Separator used when merging and splitting stage outputs.
pub const SEPARATOR: &str = "\n\n---\n\n";

/// Named transforms applicable between stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Join all outputs with the separator (the default).
    #[default]
    Merge,
    /// Merge and de-duplicate at line level, preserving first-seen order.
    MergeUnique,
    /// Keep only the longest output, as a proxy for the most thorough.
    Best,
    /// Split merged output back into a list of items.
    Split,
    /// Pass the outputs through as a list.
    Passthrough,
}

/// What a transform produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutput {
    /// A single merged input.
    One(String),
    /// A list of inputs, consumed positionally by parallel stages.
    Many(Vec<String>),
}

impl TransformOutput {
    /// Collapse into a single string, joining lists with the separator.
    pub fn merged(&self) -> String {
        match self {
            TransformOutput::One(s) => s.clone(),
            TransformOutput::Many(items) => items.join(SEPARATOR),
        }
    }

    /// The input for a positional task; lists index, single values are
    /// shared by every position.
    pub fn for_index(&self, idx: usize) -> String {
        match self {
            TransformOutput::One(s) => s.clone(),
            TransformOutput::Many(items) => items.get(idx).cloned().unwrap_or_default(),
        }
    }
}

impl Transform {
    /// Apply the transform to the previous stage's successful outputs.
    pub fn apply(&self, outputs: &[&str]) -> TransformOutput {
        match self {
            Transform::Merge => TransformOutput::One(outputs.join(SEPARATOR)),
            Transform::MergeUnique => {
                let mut seen = std::collections::HashSet::new();
                let lines: Vec<&str> = outputs
                    .iter()
                    .flat_map(|o| o.lines())
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && seen.insert(*l))
                    .collect();
                TransformOutput::One(lines.join("\n"))
            }
            Transform::Best => TransformOutput::One(
                outputs
                    .iter()
                    .max_by_key(|o| o.len())
                    .map(|o| (*o).to_string())
                    .unwrap_or_default(),
            ),
            Transform::Split => {
                let merged = outputs.join("\n\n");
                let items: Vec<String> = merged
                    .split(SEPARATOR)
                    .flat_map(|chunk| chunk.split("\n\n\n"))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect();
                TransformOutput::Many(items)
            }
            Transform::Passthrough => {
                TransformOutput::Many(outputs.iter().map(|o| (*o).to_string()).collect())
            }
        }
    }
}
