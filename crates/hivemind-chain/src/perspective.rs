//! Perspectives: named system prompts a chain stage runs its workers
//! under. Built-ins cover the common pipeline roles; arbitrary custom
//! persona text is the escape hatch.

use serde::{Deserialize, Serialize};

/// The built-in pipeline personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltInPerspective {
    /// Clean extraction, no interpretation.
    Extractor,
    /// Relevance and quality filtering.
    Filter,
    /// Adds context and connections to raw facts.
    Enricher,
    /// Patterns, trends, implications.
    Analyst,
    /// Combines analyses into one narrative.
    Synthesizer,
    /// Devil's advocate.
    Challenger,
    /// Refines and sharpens output.
    Optimizer,
    /// Business strategy and ROI lens.
    Strategist,
    /// Thorough, source-focused research.
    Researcher,
    /// Quality and rigor evaluation.
    Critic,
}

impl BuiltInPerspective {
    /// Every built-in, in a stable order.
    pub const ALL: [BuiltInPerspective; 10] = [
        BuiltInPerspective::Extractor,
        BuiltInPerspective::Filter,
        BuiltInPerspective::Enricher,
        BuiltInPerspective::Analyst,
        BuiltInPerspective::Synthesizer,
        BuiltInPerspective::Challenger,
        BuiltInPerspective::Optimizer,
        BuiltInPerspective::Strategist,
        BuiltInPerspective::Researcher,
        BuiltInPerspective::Critic,
    ];

    /// The lookup key this perspective (de)serializes as.
    pub fn key(&self) -> &'static str {
        match self {
            BuiltInPerspective::Extractor => "extractor",
            BuiltInPerspective::Filter => "filter",
            BuiltInPerspective::Enricher => "enricher",
            BuiltInPerspective::Analyst => "analyst",
            BuiltInPerspective::Synthesizer => "synthesizer",
            BuiltInPerspective::Challenger => "challenger",
            BuiltInPerspective::Optimizer => "optimizer",
            BuiltInPerspective::Strategist => "strategist",
            BuiltInPerspective::Researcher => "researcher",
            BuiltInPerspective::Critic => "critic",
        }
    }

    /// Resolve a key to a built-in perspective.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.key() == key)
    }

    /// The persona text.
    pub fn persona(&self) -> &'static str {
        match self {
            BuiltInPerspective::Extractor => {
                "You extract raw data, facts, and signals from text. No interpretation, \
                 just clean extraction. Be exhaustive."
            }
            BuiltInPerspective::Filter => {
                "You filter for relevance and quality. Remove noise, duplicates, and \
                 low-signal items. Score remaining items by importance. Be ruthless."
            }
            BuiltInPerspective::Enricher => {
                "You add context, market data, and connections to raw facts. \
                 Cross-reference with your knowledge. Add depth without adding noise."
            }
            BuiltInPerspective::Analyst => {
                "You analyze patterns, trends, and implications. Find what others miss. \
                 Be specific with numbers and evidence."
            }
            BuiltInPerspective::Synthesizer => {
                "You combine multiple analyses into a coherent narrative. Resolve \
                 contradictions. Highlight consensus and disagreements. Be concise."
            }
            BuiltInPerspective::Challenger => {
                "You are a devil's advocate. Poke holes in every argument. Find blind \
                 spots, risks, and assumptions. Be constructive but skeptical."
            }
            BuiltInPerspective::Optimizer => {
                "You refine and improve output quality. Fix inconsistencies, sharpen \
                 language, add missing context. Make it actionable."
            }
            BuiltInPerspective::Strategist => {
                "You think in terms of business strategy, competitive advantage, and \
                 ROI. Prioritize by impact. Be opinionated."
            }
            BuiltInPerspective::Researcher => {
                "You research thoroughly using available data. Cite sources. Focus on \
                 accuracy and completeness."
            }
            BuiltInPerspective::Critic => {
                "You evaluate quality and rigor. Rate confidence levels. Flag \
                 unsupported claims. Suggest what needs more evidence."
            }
        }
    }
}

/// A stage's persona: a built-in key or arbitrary custom text.
///
/// Serializes as a plain string either way, so chain definitions write
/// `"perspective": "analyst"` for a built-in and any other string for a
/// custom persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Perspective {
    /// One of the named pipeline roles.
    BuiltIn(BuiltInPerspective),
    /// Arbitrary persona text.
    Custom(String),
}

impl Perspective {
    /// The persona text.
    pub fn persona(&self) -> &str {
        match self {
            Perspective::BuiltIn(p) => p.persona(),
            Perspective::Custom(text) => text,
        }
    }

    /// The routing key: the built-in key, or "custom".
    pub fn key(&self) -> &str {
        match self {
            Perspective::BuiltIn(p) => p.key(),
            Perspective::Custom(_) => "custom",
        }
    }
}

impl From<String> for Perspective {
    fn from(s: String) -> Self {
        match BuiltInPerspective::from_key(&s) {
            Some(p) => Perspective::BuiltIn(p),
            None => Perspective::Custom(s),
        }
    }
}

impl From<Perspective> for String {
    fn from(p: Perspective) -> Self {
        match p {
            Perspective::BuiltIn(b) => b.key().to_string(),
            Perspective::Custom(text) => text,
        }
    }
}

impl From<BuiltInPerspective> for Perspective {
    fn from(p: BuiltInPerspective) -> Self {
        Perspective::BuiltIn(p)
    }
}
