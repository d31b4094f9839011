//! JSON envelope shared by all handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use scalegate_coordinator::CoordinatorError;
use scalegate_state::StateError;
use serde::Serialize;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retryable: Option<bool>,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            retryable: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, code: &'static str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
            code: Some(code),
            retryable: Some(false),
        }),
    )
        .into_response()
}

/// Map a coordinator error onto a status code and envelope.
///
/// A conflicting pending request is returned under `data` so the client can
/// offer to cancel it.
pub(crate) fn coordinator_error(err: CoordinatorError) -> Response {
    let status = match &err {
        CoordinatorError::State(e) => match e {
            StateError::NotFound(_) => StatusCode::NOT_FOUND,
            StateError::InvalidReplicaCount { .. }
            | StateError::NoReplicas(_)
            | StateError::ReasonRequired(_) => {
                StatusCode::BAD_REQUEST
            }
            StateError::PendingRequestExists(_) | StateError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        CoordinatorError::OrchestrationApplyFailed { .. } => StatusCode::BAD_GATEWAY,
        CoordinatorError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoordinatorError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::warn!(error = %err, code = err.code(), "request failed");
    }

    let data = match &err {
        CoordinatorError::State(StateError::PendingRequestExists(existing)) => {
            Some(existing.as_ref().clone())
        }
        _ => None,
    };
    (
        status,
        Json(ApiResponse {
            success: false,
            data,
            error: Some(err.to_string()),
            code: Some(err.code()),
            retryable: Some(err.is_retryable()),
        }),
    )
        .into_response()
}

/// Render a coordinator result with the given success status.
pub(crate) fn respond<T: Serialize>(
    result: Result<T, CoordinatorError>,
    status: StatusCode,
) -> Response {
    match result {
        Ok(data) => (status, ApiResponse::ok(data)).into_response(),
        Err(e) => coordinator_error(e),
    }
}
