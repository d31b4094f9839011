//! scalegate-api — REST API for ScaleGate.
//!
//! Provides axum route handlers for the scale request workflow and for the
//! component registry that deploy/start/stop writers keep in sync.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/scale-requests` | Create a scale request |
//! | GET | `/api/v1/scale-requests/pending` | Admin queue, oldest first (`kind`, `after`, `limit`) |
//! | GET | `/api/v1/scale-requests/:id` | Get a scale request |
//! | POST | `/api/v1/scale-requests/:id/cancel` | Cancel a pending request |
//! | POST | `/api/v1/scale-requests/:id/approve` | Approve and reconcile (admin) |
//! | POST | `/api/v1/scale-requests/:id/reject` | Reject with a reason (admin) |
//! | GET | `/api/v1/replica-info` | Replica view (`componentId`, `kind`) |
//! | GET | `/api/v1/components` | List registry entries (`kind`) |
//! | GET | `/api/v1/components/:kind/:id` | Get a registry entry |
//! | PUT | `/api/v1/components/:kind/:id` | Create or update a registry entry |
//! | DELETE | `/api/v1/components/:kind/:id` | Remove a registry entry |
//! | GET | `/api/v1/components/:kind/:id/scale-requests` | Request history |
//! | GET | `/healthz` | Liveness |

pub mod handlers;
pub mod registry_handlers;
mod response;

use axum::Router;
use axum::routing::{get, post};
use scalegate_coordinator::Coordinator;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Coordinator,
}

/// Build the complete API router.
pub fn build_router(coordinator: Coordinator) -> Router {
    let api_state = ApiState { coordinator };

    let api_routes = Router::new()
        .route("/scale-requests", post(handlers::create_scale_request))
        .route("/scale-requests/pending", get(handlers::list_pending))
        .route("/scale-requests/{id}", get(handlers::get_scale_request))
        .route("/scale-requests/{id}/cancel", post(handlers::cancel_scale_request))
        .route("/scale-requests/{id}/approve", post(handlers::approve_scale_request))
        .route("/scale-requests/{id}/reject", post(handlers::reject_scale_request))
        .route("/replica-info", get(handlers::replica_info))
        .route("/components", get(registry_handlers::list_components))
        .route(
            "/components/{kind}/{id}",
            get(registry_handlers::get_component)
                .put(registry_handlers::put_component)
                .delete(registry_handlers::delete_component),
        )
        .route(
            "/components/{kind}/{id}/scale-requests",
            get(registry_handlers::component_history),
        )
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
