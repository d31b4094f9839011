//! REST API handlers for the scale request workflow.
//!
//! Each handler delegates to the `Coordinator` and returns the JSON
//! envelope from `response`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use scalegate_state::*;

use crate::ApiState;
use crate::response::{ApiResponse, error_response, respond};

// ── Bodies and queries ─────────────────────────────────────────

/// Body of `POST /scale-requests`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScaleRequestBody {
    pub component_id: ComponentId,
    pub kind: ComponentKind,
    pub new_replicas: u32,
    #[serde(default)]
    pub requested_by: Option<String>,
}

/// Optional body of cancel/approve.
#[derive(Debug, Default, Deserialize)]
pub struct DecisionBody {
    #[serde(default)]
    pub actor: Option<String>,
}

/// Body of reject. A missing reason is reported as `reason_required`.
#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaInfoQuery {
    pub component_id: ComponentId,
    pub kind: ComponentKind,
}

#[derive(Debug, Default, Deserialize)]
pub struct PendingQuery {
    pub kind: Option<ComponentKind>,
    pub after: Option<RequestId>,
    pub limit: Option<usize>,
}

/// Parse an optional JSON body; an empty body yields the default.
fn optional_body<T>(body: &Bytes) -> Result<T, Response>
where
    T: Default + serde::de::DeserializeOwned,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        error_response(
            &format!("invalid request body: {e}"),
            "invalid_body",
            StatusCode::BAD_REQUEST,
        )
    })
}

// ── Scale requests ─────────────────────────────────────────────

/// POST /api/v1/scale-requests
pub async fn create_scale_request(
    State(state): State<ApiState>,
    Json(body): Json<CreateScaleRequestBody>,
) -> Response {
    let key = ComponentKey::new(body.kind, body.component_id);
    let result = state
        .coordinator
        .create_request(&key, body.new_replicas, body.requested_by)
        .await;
    respond(result, StatusCode::CREATED)
}

/// GET /api/v1/scale-requests/:id
pub async fn get_scale_request(
    State(state): State<ApiState>,
    Path(id): Path<RequestId>,
) -> Response {
    respond(state.coordinator.get_request(id).await, StatusCode::OK)
}

/// POST /api/v1/scale-requests/:id/cancel
pub async fn cancel_scale_request(
    State(state): State<ApiState>,
    Path(id): Path<RequestId>,
    body: Bytes,
) -> Response {
    let body: DecisionBody = match optional_body(&body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    respond(state.coordinator.cancel(id, body.actor).await, StatusCode::OK)
}

/// POST /api/v1/scale-requests/:id/approve
pub async fn approve_scale_request(
    State(state): State<ApiState>,
    Path(id): Path<RequestId>,
    body: Bytes,
) -> Response {
    let body: DecisionBody = match optional_body(&body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    respond(state.coordinator.approve(id, body.actor).await, StatusCode::OK)
}

/// POST /api/v1/scale-requests/:id/reject
pub async fn reject_scale_request(
    State(state): State<ApiState>,
    Path(id): Path<RequestId>,
    body: Bytes,
) -> Response {
    let body: RejectBody = match optional_body(&body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let result = state
        .coordinator
        .reject(id, body.reason.unwrap_or_default(), body.actor)
        .await;
    respond(result, StatusCode::OK)
}

/// GET /api/v1/scale-requests/pending
pub async fn list_pending(
    State(state): State<ApiState>,
    Query(query): Query<PendingQuery>,
) -> Response {
    let result = state
        .coordinator
        .pending_page(query.kind, query.after, query.limit)
        .await;
    respond(result, StatusCode::OK)
}

// ── Replica info ───────────────────────────────────────────────

/// GET /api/v1/replica-info?componentId=..&kind=..
pub async fn replica_info(
    State(state): State<ApiState>,
    Query(query): Query<ReplicaInfoQuery>,
) -> Response {
    let key = ComponentKey::new(query.kind, query.component_id);
    respond(state.coordinator.replica_info(&key).await, StatusCode::OK)
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}
