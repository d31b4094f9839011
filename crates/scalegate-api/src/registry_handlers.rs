//! REST API handlers for the component registry.
//!
//! Deploy/start/stop pipelines report replica counts here; the dashboard
//! reads request history per component.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;

use scalegate_state::*;

use crate::ApiState;
use crate::response::{error_response, respond};

/// Body of `PUT /components/:kind/:id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutComponentBody {
    pub current_replicas: u32,
    #[serde(default)]
    pub max_replicas: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListComponentsQuery {
    pub kind: Option<ComponentKind>,
}

fn component_key(kind: &str, id: String) -> Result<ComponentKey, Response> {
    kind.parse::<ComponentKind>()
        .map(|kind| ComponentKey::new(kind, id))
        .map_err(|e| error_response(&e, "invalid_kind", StatusCode::BAD_REQUEST))
}

/// GET /api/v1/components
pub async fn list_components(
    State(state): State<ApiState>,
    Query(query): Query<ListComponentsQuery>,
) -> Response {
    respond(state.coordinator.list_components(query.kind).await, StatusCode::OK)
}

/// GET /api/v1/components/:kind/:id
pub async fn get_component(
    State(state): State<ApiState>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let key = match component_key(&kind, id) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    respond(state.coordinator.get_component(&key).await, StatusCode::OK)
}

/// PUT /api/v1/components/:kind/:id
pub async fn put_component(
    State(state): State<ApiState>,
    Path((kind, id)): Path<(String, String)>,
    Json(body): Json<PutComponentBody>,
) -> Response {
    let key = match component_key(&kind, id) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let component = Component::new(key, body.current_replicas, body.max_replicas);
    respond(state.coordinator.register_component(component).await, StatusCode::OK)
}

/// DELETE /api/v1/components/:kind/:id
pub async fn delete_component(
    State(state): State<ApiState>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let key = match component_key(&kind, id) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let result = state
        .coordinator
        .remove_component(&key)
        .await
        .map(|removal| removal.cancelled);
    respond(result, StatusCode::OK)
}

/// GET /api/v1/components/:kind/:id/scale-requests
pub async fn component_history(
    State(state): State<ApiState>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let key = match component_key(&kind, id) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    respond(state.coordinator.history(&key).await, StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use scalegate_coordinator::{Coordinator, CoordinatorConfig, NoopApplier};

    fn test_state() -> ApiState {
        let store = StateStore::open_in_memory().unwrap();
        ApiState {
            coordinator: Coordinator::new(store, Arc::new(NoopApplier), CoordinatorConfig::default()),
        }
    }

    fn path(kind: &str, id: &str) -> Path<(String, String)> {
        Path((kind.to_string(), id.to_string()))
    }

    #[tokio::test]
    async fn put_and_get_component() {
        let state = test_state();
        let body = PutComponentBody {
            current_replicas: 2,
            max_replicas: 0,
        };
        let resp = put_component(State(state.clone()), path("backend", "api"), Json(body)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = get_component(State(state), path("backend", "api")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn put_zero_replicas_is_bad_request() {
        let state = test_state();
        let body = PutComponentBody {
            current_replicas: 0,
            max_replicas: 3,
        };
        let resp = put_component(State(state), path("frontend", "web"), Json(body)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_kind_is_bad_request() {
        let state = test_state();
        let resp = get_component(State(state.clone()), path("database", "pg")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Path kinds follow the same lower-case spelling as JSON bodies.
        let resp = get_component(State(state), path("Backend", "api")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_nonexistent_component() {
        let state = test_state();
        let resp = delete_component(State(state), path("backend", "nope")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_cancels_pending_request() {
        let state = test_state();
        let key = ComponentKey::backend("api");
        state
            .coordinator
            .register_component(Component::new(key.clone(), 2, 0))
            .await
            .unwrap();
        let req = state.coordinator.create_request(&key, 3, None).await.unwrap();

        let resp = delete_component(State(state.clone()), path("backend", "api")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            state.coordinator.get_request(req.id).await.unwrap().status,
            RequestStatus::Cancelled
        );

        let resp = component_history(State(state), path("backend", "api")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_components_empty() {
        let state = test_state();
        let resp = list_components(State(state), Query(ListComponentsQuery::default())).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
