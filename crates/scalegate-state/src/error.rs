//! Error types for the ScaleGate state store.

use thiserror::Error;

use crate::types::{ComponentKey, RequestId, RequestStatus, ScaleRequest};

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
///
/// Storage variants wrap redb/serde failures. Domain variants report an
/// invariant the caller tried to violate.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid replica count {requested}: must be between 1 and {max} and differ from current {current}")]
    InvalidReplicaCount { requested: u32, current: u32, max: u32 },

    #[error("component {0} must run at least one replica")]
    NoReplicas(ComponentKey),

    #[error("scale request {} is already pending for {}", .0.id, .0.component_key())]
    PendingRequestExists(Box<ScaleRequest>),

    #[error("scale request {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("a reason is required to reject scale request {0}")]
    ReasonRequired(RequestId),
}

impl StateError {
    pub(crate) fn component_not_found(key: &ComponentKey) -> Self {
        Self::NotFound(format!("component {key}"))
    }

    pub(crate) fn request_not_found(id: RequestId) -> Self {
        Self::NotFound(format!("scale request {id}"))
    }

    /// Stable machine-readable code, used by the API error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidReplicaCount { .. } | Self::NoReplicas(_) => "invalid_replica_count",
            Self::PendingRequestExists(_) => "pending_request_exists",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ReasonRequired(_) => "reason_required",
            _ => "storage",
        }
    }
}
