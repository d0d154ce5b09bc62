use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type SwarmResult<T> = Result<T, SwarmError>;

/// Error taxonomy for the swarm engine.
///
/// The split that matters operationally is transient vs. non-transient:
/// transient errors are retried up to a task's retry budget with linear
/// backoff, non-transient errors fail the attempt immediately without
/// consuming the budget. See [`SwarmError::is_transient`].
#[derive(Error, Debug)]
pub enum SwarmError {
    /// An attempt exceeded its wall-clock budget.
    #[error("task timed out after {ms}ms")]
    Timeout {
        /// The budget that was exceeded, in milliseconds.
        ms: u64,
    },

    /// Network or transport failure reaching the completion provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider rejected the call due to rate limiting or quota.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider returned a response the engine could not use.
    #[error("provider error: {0}")]
    Provider(String),

    /// A successful response was rejected by the output quality gate.
    #[error("quality check failed: {0}")]
    QualityRejected(String),

    /// The request itself was malformed or otherwise invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Authentication or authorization failure.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A referenced resource (model, endpoint) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider refused the content on safety grounds.
    #[error("content refused: {0}")]
    SafetyRefusal(String),

    /// No worker node available and none can be created.
    #[error("worker pool exhausted: {0}")]
    PoolExhausted(String),

    /// A chain definition failed validation; nothing was dispatched.
    #[error("chain validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SwarmError {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Timeouts, transport failures, rate limits, malformed provider
    /// responses, and quality-gate rejections are all transient. Invalid
    /// input, auth failures, missing resources, and safety refusals are
    /// not expected to succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SwarmError::Timeout { .. }
                | SwarmError::Transport(_)
                | SwarmError::RateLimited(_)
                | SwarmError::Provider(_)
                | SwarmError::QualityRejected(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SwarmError::Timeout { ms: 30_000 }.is_transient());
        assert!(SwarmError::Transport("connection reset".into()).is_transient());
        assert!(SwarmError::RateLimited("429".into()).is_transient());
        assert!(SwarmError::Provider("malformed body".into()).is_transient());
        assert!(SwarmError::QualityRejected("empty response".into()).is_transient());

        assert!(!SwarmError::InvalidInput("bad request".into()).is_transient());
        assert!(!SwarmError::Unauthorized("key revoked".into()).is_transient());
        assert!(!SwarmError::NotFound("no such model".into()).is_transient());
        assert!(!SwarmError::SafetyRefusal("blocked".into()).is_transient());
        assert!(!SwarmError::PoolExhausted("cap is 0".into()).is_transient());
    }

    #[test]
    fn test_validation_error_joins_messages() {
        let err = SwarmError::Validation(vec![
            "stage 0 has no prompts".to_string(),
            "stage 2 has no perspectives".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("stage 0"));
        assert!(msg.contains("stage 2"));
    }

    #[test]
    fn test_timeout_message() {
        let err = SwarmError::Timeout { ms: 1500 };
        assert_eq!(err.to_string(), "task timed out after 1500ms");
    }
}
