//! Structured error diagnostics.
//!
//! Maps every [`SwarmError`] to a category, a severity, and an actionable
//! suggestion, so front ends can tell the user what happened and how to
//! fix it without pattern-matching on error strings themselves.

use crate::error::SwarmError;
use serde::{Deserialize, Serialize};

/// Coarse error category, stable across error message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Provider rate limiting or quota exhaustion.
    RateLimit,
    /// Authentication or authorization failure.
    Auth,
    /// Wall-clock budget exceeded.
    Timeout,
    /// Network/transport failure.
    Network,
    /// Referenced model or endpoint unavailable.
    Model,
    /// Content blocked by safety filters.
    Safety,
    /// Input too large or otherwise invalid.
    Input,
    /// Output failed the quality gate.
    Quality,
    /// Malformed response from the provider.
    Parse,
    /// Chain definition failed validation.
    Validation,
    /// Worker pool exhausted.
    Pool,
    /// Anything else.
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Network => "network",
            ErrorCategory::Model => "model",
            ErrorCategory::Safety => "safety",
            ErrorCategory::Input => "input",
            ErrorCategory::Quality => "quality",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Pool => "pool",
            ErrorCategory::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// How urgently a human needs to look at this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Self-healing; logged for observability.
    Warning,
    /// Task-level failure, pipeline may continue.
    Error,
    /// Requires operator intervention before anything will succeed.
    Fatal,
}

/// Structured diagnosis of a swarm error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Coarse category.
    pub category: ErrorCategory,
    /// Whether an automatic retry is worthwhile.
    pub retryable: bool,
    /// Severity of the failure.
    pub severity: Severity,
    /// Actionable hint for the operator.
    pub suggestion: String,
}

/// Classify an error and return structured diagnostics.
pub fn diagnose(err: &SwarmError) -> Diagnosis {
    match err {
        SwarmError::RateLimited(_) => Diagnosis {
            category: ErrorCategory::RateLimit,
            retryable: true,
            severity: Severity::Warning,
            suggestion: "Reduce scaling.max_concurrent, or wait and retry. Check provider quotas."
                .to_string(),
        },
        SwarmError::Unauthorized(_) => Diagnosis {
            category: ErrorCategory::Auth,
            retryable: false,
            severity: Severity::Fatal,
            suggestion: "Check the completion provider credentials.".to_string(),
        },
        SwarmError::Timeout { .. } => Diagnosis {
            category: ErrorCategory::Timeout,
            retryable: true,
            severity: Severity::Error,
            suggestion:
                "Increase the task timeout_ms, reduce input size, or split the work across stages."
                    .to_string(),
        },
        SwarmError::Transport(_) => Diagnosis {
            category: ErrorCategory::Network,
            retryable: true,
            severity: Severity::Error,
            suggestion: "Network error. Check connectivity to the completion provider.".to_string(),
        },
        SwarmError::NotFound(_) => Diagnosis {
            category: ErrorCategory::Model,
            retryable: false,
            severity: Severity::Error,
            suggestion: "Model or endpoint not available. Check routing.fast_model / routing.quality_model.".to_string(),
        },
        SwarmError::SafetyRefusal(_) => Diagnosis {
            category: ErrorCategory::Safety,
            retryable: false,
            severity: Severity::Error,
            suggestion: "Content was blocked by safety filters. Rephrase the prompt.".to_string(),
        },
        SwarmError::InvalidInput(_) => Diagnosis {
            category: ErrorCategory::Input,
            retryable: false,
            severity: Severity::Error,
            suggestion: "The request was rejected as invalid. Reduce input size or fix the task fields.".to_string(),
        },
        SwarmError::QualityRejected(_) => Diagnosis {
            category: ErrorCategory::Quality,
            retryable: true,
            severity: Severity::Warning,
            suggestion: "Output failed the quality gate and will be retried. If persistent, simplify the prompt.".to_string(),
        },
        SwarmError::Provider(_) => Diagnosis {
            category: ErrorCategory::Parse,
            retryable: true,
            severity: Severity::Error,
            suggestion: "Provider returned a malformed response. Usually transient.".to_string(),
        },
        SwarmError::Serialization(_) => Diagnosis {
            category: ErrorCategory::Parse,
            retryable: false,
            severity: Severity::Error,
            suggestion: "Local serialization failed. Check the payload being encoded.".to_string(),
        },
        SwarmError::Validation(_) => Diagnosis {
            category: ErrorCategory::Validation,
            retryable: false,
            severity: Severity::Error,
            suggestion: "Fix the chain definition; nothing was executed.".to_string(),
        },
        SwarmError::PoolExhausted(_) => Diagnosis {
            category: ErrorCategory::Pool,
            retryable: false,
            severity: Severity::Fatal,
            suggestion: "Raise scaling.max_nodes_per_type, or stop submitting after shutdown.".to_string(),
        },
        SwarmError::Config(_) | SwarmError::Io(_) => Diagnosis {
            category: ErrorCategory::Unknown,
            retryable: false,
            severity: Severity::Error,
            suggestion: "Unexpected error. Check the engine logs.".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retryable_warning() {
        let d = diagnose(&SwarmError::RateLimited("429 Too Many Requests".into()));
        assert_eq!(d.category, ErrorCategory::RateLimit);
        assert!(d.retryable);
        assert_eq!(d.severity, Severity::Warning);
    }

    #[test]
    fn test_auth_is_fatal() {
        let d = diagnose(&SwarmError::Unauthorized("401".into()));
        assert_eq!(d.category, ErrorCategory::Auth);
        assert!(!d.retryable);
        assert_eq!(d.severity, Severity::Fatal);
    }

    #[test]
    fn test_quality_rejection_is_retryable() {
        let d = diagnose(&SwarmError::QualityRejected("degenerate repetition".into()));
        assert_eq!(d.category, ErrorCategory::Quality);
        assert!(d.retryable);
    }

    #[test]
    fn test_retryable_agrees_with_is_transient() {
        let errors = vec![
            SwarmError::Timeout { ms: 1 },
            SwarmError::Transport("x".into()),
            SwarmError::RateLimited("x".into()),
            SwarmError::Provider("x".into()),
            SwarmError::QualityRejected("x".into()),
            SwarmError::InvalidInput("x".into()),
            SwarmError::Unauthorized("x".into()),
            SwarmError::NotFound("x".into()),
            SwarmError::SafetyRefusal("x".into()),
            SwarmError::PoolExhausted("x".into()),
        ];
        for err in &errors {
            assert_eq!(
                diagnose(err).retryable,
                err.is_transient(),
                "diagnosis disagrees with is_transient for {err}"
            );
        }
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "rate_limit");
        assert_eq!(ErrorCategory::Quality.to_string(), "quality");
    }
}
