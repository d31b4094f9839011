//! API regression tests.
//!
//! Drives the full router the daemon serves through the scale request
//! lifecycle: create, conflict, approve, reject, cancel, the admin queue and
//! registry maintenance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use scalegate_api::build_router;
use scalegate_coordinator::{Coordinator, CoordinatorConfig, ReplicaApplier};
use scalegate_state::*;
use serde_json::{Value, json};
use tower::ServiceExt;

#[derive(Default)]
struct RecordingApplier {
    calls: Mutex<Vec<(ComponentKey, u32)>>,
    failing: AtomicBool,
}

#[async_trait]
impl ReplicaApplier for RecordingApplier {
    async fn apply_replicas(&self, component: &ComponentKey, replicas: u32) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("orchestrator down");
        }
        self.calls.lock().unwrap().push((component.clone(), replicas));
        Ok(())
    }
}

fn test_router() -> (Router, Arc<RecordingApplier>) {
    let store = StateStore::open_in_memory().unwrap();
    store
        .put_component(&Component::new(ComponentKey::backend("api"), 2, 0))
        .unwrap();
    store
        .put_component(&Component::new(ComponentKey::frontend("web"), 5, 3))
        .unwrap();
    let applier = Arc::new(RecordingApplier::default());
    let coordinator = Coordinator::new(store, applier.clone(), CoordinatorConfig::default());
    (build_router(coordinator), applier)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };
    let resp = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(router: &Router, id: &str, kind: &str, new_replicas: u32) -> (StatusCode, Value) {
    send(
        router,
        "POST",
        "/api/v1/scale-requests",
        Some(json!({"componentId": id, "kind": kind, "newReplicas": new_replicas})),
    )
    .await
}

async fn replica_info(router: &Router, id: &str, kind: &str) -> Value {
    let (status, body) = send(
        router,
        "GET",
        &format!("/api/v1/replica-info?componentId={id}&kind={kind}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"].clone()
}

#[tokio::test]
async fn healthz() {
    let (router, _) = test_router();
    let (status, body) = send(&router, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "ok");
}

#[tokio::test]
async fn create_then_replica_info_shows_pending() {
    let (router, _) = test_router();
    let (status, body) = create(&router, "api", "backend", 4).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_u64().unwrap();

    let info = replica_info(&router, "api", "backend").await;
    assert_eq!(info["replicas"], 2);
    assert_eq!(info["maxReplicas"], 6);
    assert_eq!(info["hasPendingRequest"], true);
    assert_eq!(info["pendingRequestId"], id);
    assert_eq!(info["pendingNewReplicas"], 4);
    assert_eq!(info["pendingStatus"], "PENDING");
}

#[tokio::test]
async fn stored_max_is_respected() {
    let (router, _) = test_router();
    // current 5, stored max 3 → effective max 6
    let info = replica_info(&router, "web", "frontend").await;
    assert_eq!(info["maxReplicas"], 6);

    let (status, body) = create(&router, "web", "frontend", 7).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_replica_count");

    let (status, _) = create(&router, "web", "frontend", 6).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn bounds_are_enforced() {
    let (router, _) = test_router();
    for n in [0, 2, 7] {
        let (status, body) = create(&router, "api", "backend", n).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "newReplicas={n}");
        assert_eq!(body["success"], false);
    }
}

#[tokio::test]
async fn second_create_conflicts_with_existing() {
    let (router, _) = test_router();
    let (_, first) = create(&router, "api", "backend", 3).await;

    let (status, body) = create(&router, "api", "backend", 5).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "pending_request_exists");
    assert_eq!(body["data"]["id"], first["data"]["id"]);
}

#[tokio::test]
async fn unknown_component_is_not_found() {
    let (router, _) = test_router();
    let (status, body) = create(&router, "ghost", "backend", 2).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn approve_reconciles_replicas() {
    let (router, applier) = test_router();
    let (_, body) = create(&router, "api", "backend", 4).await;
    let id = body["data"]["id"].as_u64().unwrap();

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/scale-requests/{id}/approve"),
        Some(json!({"actor": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "APPROVED");
    assert_eq!(body["data"]["decidedBy"], "admin");

    assert_eq!(
        *applier.calls.lock().unwrap(),
        vec![(ComponentKey::backend("api"), 4)]
    );

    let info = replica_info(&router, "api", "backend").await;
    assert_eq!(info["replicas"], 4);
    assert_eq!(info["hasPendingRequest"], false);

    let (status, body) = send(&router, "GET", "/api/v1/components/backend/api", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["currentReplicas"], 4);
}

#[tokio::test]
async fn failed_apply_keeps_request_pending() {
    let (router, applier) = test_router();
    let (_, body) = create(&router, "api", "backend", 4).await;
    let id = body["data"]["id"].as_u64().unwrap();
    let approve_uri = format!("/api/v1/scale-requests/{id}/approve");

    applier.failing.store(true, Ordering::SeqCst);
    let (status, body) = send(&router, "POST", &approve_uri, None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "orchestration_apply_failed");
    assert_eq!(body["retryable"], true);

    let info = replica_info(&router, "api", "backend").await;
    assert_eq!(info["replicas"], 2);
    assert_eq!(info["pendingStatus"], "PENDING");

    applier.failing.store(false, Ordering::SeqCst);
    let (status, _) = send(&router, "POST", &approve_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replica_info(&router, "api", "backend").await["replicas"], 4);
}

#[tokio::test]
async fn reject_stores_reason() {
    let (router, applier) = test_router();
    let (_, body) = create(&router, "api", "backend", 4).await;
    let id = body["data"]["id"].as_u64().unwrap();

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/scale-requests/{id}/reject"),
        Some(json!({"reason": "insufficient quota"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "REJECTED");
    assert_eq!(body["data"]["reasonReject"], "insufficient quota");

    let info = replica_info(&router, "api", "backend").await;
    assert_eq!(info["replicas"], 2);
    assert_eq!(info["hasPendingRequest"], false);

    // A rejected request can no longer be approved.
    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/scale-requests/{id}/approve"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
    assert!(applier.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn reject_requires_reason() {
    let (router, _) = test_router();
    let (_, body) = create(&router, "api", "backend", 4).await;
    let id = body["data"]["id"].as_u64().unwrap();

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/scale-requests/{id}/reject"),
        Some(json!({"reason": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "reason_required");
}

#[tokio::test]
async fn cancel_clears_pending() {
    let (router, _) = test_router();
    let (_, body) = create(&router, "api", "backend", 5).await;
    let id = body["data"]["id"].as_u64().unwrap();

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/scale-requests/{id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CANCELLED");

    let info = replica_info(&router, "api", "backend").await;
    assert_eq!(info["hasPendingRequest"], false);
    assert_eq!(info["replicas"], 2);

    // A fresh request is accepted once the slot is free.
    let (status, _) = create(&router, "api", "backend", 3).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn get_request_by_id() {
    let (router, _) = test_router();
    let (_, body) = create(&router, "api", "backend", 3).await;
    let id = body["data"]["id"].as_u64().unwrap();

    let (status, body) = send(&router, "GET", &format!("/api/v1/scale-requests/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["componentId"], "api");
    assert_eq!(body["data"]["componentKind"], "backend");

    let (status, _) = send(&router, "GET", "/api/v1/scale-requests/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pending_queue_pages_oldest_first() {
    let (router, _) = test_router();
    for i in 0..3 {
        let id = format!("svc-{i}");
        let (status, _) = send(
            &router,
            "PUT",
            &format!("/api/v1/components/backend/{id}"),
            Some(json!({"currentReplicas": 1, "maxReplicas": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = create(&router, &id, "backend", 2).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(&router, "GET", "/api/v1/scale-requests/pending?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = page["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["componentId"], "svc-0");
    assert_eq!(items[1]["componentId"], "svc-1");
    let next = page["data"]["next"].as_u64().unwrap();

    let (_, page) = send(
        &router,
        "GET",
        &format!("/api/v1/scale-requests/pending?limit=2&after={next}"),
        None,
    )
    .await;
    let items = page["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["componentId"], "svc-2");
    assert!(page["data"]["next"].is_null());

    let (_, page) = send(&router, "GET", "/api/v1/scale-requests/pending?kind=frontend", None).await;
    assert!(page["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_component_cancels_pending_request() {
    let (router, _) = test_router();
    let (_, body) = create(&router, "api", "backend", 3).await;
    let id = body["data"]["id"].as_u64().unwrap();

    let (status, _) = send(&router, "DELETE", "/api/v1/components/backend/api", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&router, "GET", &format!("/api/v1/scale-requests/{id}"), None).await;
    assert_eq!(body["data"]["status"], "CANCELLED");
    assert_eq!(body["data"]["decidedBy"], "system");

    let (status, _) = send(&router, "GET", "/api/v1/components/backend/api", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &router,
        "GET",
        "/api/v1/components/backend/api/scale-requests",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn component_listing_filters_by_kind() {
    let (router, _) = test_router();
    let (_, body) = send(&router, "GET", "/api/v1/components", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = send(&router, "GET", "/api/v1/components?kind=frontend", None).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "web");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_yield_one_request() {
    let (router, _) = test_router();
    let mut handles = Vec::new();
    for i in 0..50 {
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            create(&router, "api", "backend", 3 + (i % 4)).await.0
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for h in handles {
        match h.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 49);
}
