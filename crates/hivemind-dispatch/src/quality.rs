//! Output quality gate.
//!
//! Post-hoc heuristic checks applied to every successful raw response
//! before it is accepted. A rejection is surfaced to the retry loop
//! exactly like a transport error, so garbage never propagates through a
//! chain.

use hivemind_core::QualityConfig;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Why a response was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityIssue {
    /// Empty or near-empty response.
    Empty,
    /// One line prefix dominates the response.
    DegenerateRepetition {
        /// How many times the dominating line repeats.
        repeats: usize,
    },
    /// The model declined to answer.
    Refusal,
    /// The response appears to cut off mid-sentence.
    Truncated,
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityIssue::Empty => write!(f, "empty or near-empty response"),
            QualityIssue::DegenerateRepetition { repeats } => {
                write!(f, "degenerate repetition ({repeats}x repeated line)")
            }
            QualityIssue::Refusal => write!(f, "model refusal detected"),
            QualityIssue::Truncated => write!(f, "response appears truncated"),
        }
    }
}

#[allow(clippy::expect_used)] // static pattern
fn refusal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(I cannot|I'm unable to|I apologize|As an AI|I don't have access)")
            .expect("static pattern")
    })
}

/// Check a response against the quality gate.
pub fn check(response: &str, cfg: &QualityConfig) -> Result<(), QualityIssue> {
    let trimmed = response.trim();
    let len = trimmed.chars().count();

    if len < cfg.min_chars {
        return Err(QualityIssue::Empty);
    }

    // Repetition: the same 60-char line prefix accounting for 5+ lines
    // and more than half of them indicates degenerate output.
    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() >= 5 {
        let mut freq: HashMap<String, usize> = HashMap::new();
        for line in &lines {
            let prefix: String = line.chars().take(60).collect();
            *freq.entry(prefix).or_insert(0) += 1;
        }
        if let Some(&max_repeat) = freq.values().max() {
            if max_repeat >= 5 && max_repeat * 2 > lines.len() {
                return Err(QualityIssue::DegenerateRepetition {
                    repeats: max_repeat,
                });
            }
        }
    }

    if refusal_pattern().is_match(trimmed) && len < cfg.refusal_max_chars {
        return Err(QualityIssue::Refusal);
    }

    // Truncation: no terminal punctuation/closing token, within the
    // configured band. Long responses are exempt (a long truncated answer
    // still carries salvageable value); short ones are exempt (terminal
    // punctuation is a noisy signal at small sizes).
    let has_terminal = trimmed.chars().last().is_some_and(|c| {
        c.is_ascii_digit()
            || matches!(
                c,
                '.' | '!' | '?' | ')' | ']' | '`' | '"' | '\'' | '*' | '-'
            )
    });
    if !has_terminal && len > cfg.truncation_band_min && len < cfg.truncation_band_max {
        return Err(QualityIssue::Truncated);
    }

    Ok(())
}
