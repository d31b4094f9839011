//! Coordinator error types.

use scalegate_state::{ComponentKey, StateError};
use thiserror::Error;

/// Errors surfaced by coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("orchestration failed to apply {replicas} replicas to {component}: {reason}")]
    OrchestrationApplyFailed {
        component: ComponentKey,
        replicas: u32,
        reason: String,
    },

    #[error("component {0} is busy, retry the operation")]
    Busy(ComponentKey),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

impl CoordinatorError {
    /// Whether repeating the same call may succeed without any other change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OrchestrationApplyFailed { .. } | Self::Busy(_))
    }

    /// Stable machine-readable code, used by the API error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::State(e) => e.code(),
            Self::OrchestrationApplyFailed { .. } => "orchestration_apply_failed",
            Self::Busy(_) => "busy",
            Self::Join(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        let key = ComponentKey::backend("api");
        assert!(CoordinatorError::Busy(key.clone()).is_retryable());
        assert!(
            CoordinatorError::OrchestrationApplyFailed {
                component: key,
                replicas: 3,
                reason: "timeout".to_string(),
            }
            .is_retryable()
        );
        assert!(!CoordinatorError::State(StateError::NotFound("x".into())).is_retryable());
    }

    #[test]
    fn codes_delegate_to_state() {
        let err = CoordinatorError::from(StateError::ReasonRequired(7));
        assert_eq!(err.code(), "reason_required");
        assert_eq!(CoordinatorError::Busy(ComponentKey::frontend("web")).code(), "busy");
    }
}
