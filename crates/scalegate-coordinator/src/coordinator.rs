//! Coordinator — drives the scale request state machine.
//!
//! Every mutation takes the target component's lock, then performs its
//! check-and-write as a single store transaction on the blocking pool.
//! Approval additionally calls the orchestration hook while holding the
//! lock and only commits the registry update and the APPROVED status after
//! the hook succeeded.

use std::sync::Arc;

use scalegate_state::*;
use tracing::{debug, info, warn};

use crate::applier::ReplicaApplier;
use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::locks::ComponentLocks;

/// Mediates the component registry, the scale request store and the
/// orchestration layer.
#[derive(Clone)]
pub struct Coordinator {
    store: StateStore,
    applier: Arc<dyn ReplicaApplier>,
    locks: ComponentLocks,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        store: StateStore,
        applier: Arc<dyn ReplicaApplier>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            applier,
            locks: ComponentLocks::new(),
            config,
        }
    }

    /// Run a store operation on the blocking thread pool.
    async fn blocking<T, F>(&self, f: F) -> CoordinatorResult<T>
    where
        T: Send + 'static,
        F: FnOnce(StateStore) -> StateResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || f(store)).await??)
    }

    // ── Registry ───────────────────────────────────────────────────

    /// Create or update a registry entry (deploy/start/stop writers).
    pub async fn register_component(&self, component: Component) -> CoordinatorResult<Component> {
        let key = component.key();
        let _guard = self.locks.acquire(&key, self.config.lock_timeout).await?;
        self.blocking(move |store| store.put_component(&component))
            .await
    }

    pub async fn get_component(&self, key: &ComponentKey) -> CoordinatorResult<Component> {
        let lookup = key.clone();
        self.blocking(move |store| store.get_component(&lookup))
            .await?
            .ok_or_else(|| StateError::NotFound(format!("component {key}")).into())
    }

    pub async fn list_components(
        &self,
        kind: Option<ComponentKind>,
    ) -> CoordinatorResult<Vec<Component>> {
        self.blocking(move |store| store.list_components(kind)).await
    }

    /// Delete a component; its PENDING request, if any, becomes CANCELLED.
    pub async fn remove_component(&self, key: &ComponentKey) -> CoordinatorResult<ComponentRemoval> {
        let _guard = self.locks.acquire(key, self.config.lock_timeout).await?;
        let lookup = key.clone();
        self.blocking(move |store| store.delete_component(&lookup))
            .await?
            .ok_or_else(|| StateError::NotFound(format!("component {key}")).into())
    }

    // ── Requests ───────────────────────────────────────────────────

    /// Propose a new replica count for a component.
    pub async fn create_request(
        &self,
        key: &ComponentKey,
        new_replicas: u32,
        requested_by: Option<String>,
    ) -> CoordinatorResult<ScaleRequest> {
        let _guard = self.locks.acquire(key, self.config.lock_timeout).await?;
        let target = key.clone();
        let result = self
            .blocking(move |store| store.create_request(&target, new_replicas, requested_by.as_deref()))
            .await;
        if let Err(CoordinatorError::State(StateError::PendingRequestExists(existing))) = &result {
            debug!(component = %key, existing = existing.id, "scale request already pending");
        }
        result
    }

    pub async fn get_request(&self, id: RequestId) -> CoordinatorResult<ScaleRequest> {
        self.blocking(move |store| store.get_request(id)).await
    }

    pub async fn pending_request(
        &self,
        key: &ComponentKey,
    ) -> CoordinatorResult<Option<ScaleRequest>> {
        let key = key.clone();
        self.blocking(move |store| store.get_pending_request(&key)).await
    }

    /// Every request ever made for a component, oldest first.
    pub async fn history(&self, key: &ComponentKey) -> CoordinatorResult<Vec<ScaleRequest>> {
        let key = key.clone();
        self.blocking(move |store| store.list_requests_for_component(&key))
            .await
    }

    /// Current replicas, effective ceiling and pending request, read from
    /// one snapshot.
    pub async fn replica_info(&self, key: &ComponentKey) -> CoordinatorResult<ReplicaInfo> {
        let key = key.clone();
        self.blocking(move |store| store.replica_info(&key)).await
    }

    /// Withdraw a PENDING request. Registry is left untouched.
    pub async fn cancel(&self, id: RequestId, actor: Option<String>) -> CoordinatorResult<ScaleRequest> {
        self.decide(id, RequestStatus::Cancelled, None, actor).await
    }

    /// Turn down a PENDING request. `reason` must not be blank.
    pub async fn reject(
        &self,
        id: RequestId,
        reason: String,
        actor: Option<String>,
    ) -> CoordinatorResult<ScaleRequest> {
        self.decide(id, RequestStatus::Rejected, Some(reason), actor)
            .await
    }

    async fn decide(
        &self,
        id: RequestId,
        to: RequestStatus,
        reason: Option<String>,
        actor: Option<String>,
    ) -> CoordinatorResult<ScaleRequest> {
        let key = self.get_request(id).await?.component_key();
        let _guard = self.locks.acquire(&key, self.config.lock_timeout).await?;
        let result = self
            .blocking(move |store| store.transition(id, to, reason.as_deref(), actor.as_deref()))
            .await;
        if let Err(CoordinatorError::State(StateError::InvalidTransition { from, .. })) = &result {
            info!(request_id = id, %from, %to, "scale request already decided");
        }
        result
    }

    /// Approve a PENDING request.
    ///
    /// The orchestration hook runs first, bounded by `apply_timeout`. If it
    /// fails or times out the request stays PENDING, the registry is
    /// unchanged, and `OrchestrationApplyFailed` is returned so the admin can
    /// retry.
    pub async fn approve(&self, id: RequestId, actor: Option<String>) -> CoordinatorResult<ScaleRequest> {
        let key = self.get_request(id).await?.component_key();
        let _guard = self.locks.acquire(&key, self.config.lock_timeout).await?;

        // Re-read under the lock, another admin may have decided it meanwhile.
        let request = self.get_request(id).await?;
        if !request.status.can_transition_to(RequestStatus::Approved) {
            info!(request_id = id, from = %request.status, "scale request already decided");
            return Err(StateError::InvalidTransition {
                id,
                from: request.status,
                to: RequestStatus::Approved,
            }
            .into());
        }

        self.apply(&key, request.new_replicas).await?;

        let (approved, component) = self
            .blocking(move |store| store.approve_request(id, actor.as_deref()))
            .await?;
        info!(
            request_id = id,
            component = %key,
            from = request.old_replicas,
            to = component.current_replicas,
            "replicas reconciled"
        );
        Ok(approved)
    }

    async fn apply(&self, key: &ComponentKey, replicas: u32) -> CoordinatorResult<()> {
        let timeout = self.config.apply_timeout;
        let outcome = tokio::time::timeout(timeout, self.applier.apply_replicas(key, replicas)).await;
        let reason = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}ms", timeout.as_millis()),
        };
        warn!(component = %key, replicas, %reason, "apply replicas failed, request stays pending");
        Err(CoordinatorError::OrchestrationApplyFailed {
            component: key.clone(),
            replicas,
            reason,
        })
    }

    // ── Admin queue ────────────────────────────────────────────────

    /// One page of the oldest-first pending queue. `limit` defaults to the
    /// configured page size.
    pub async fn pending_page(
        &self,
        kind: Option<ComponentKind>,
        after: Option<RequestId>,
        limit: Option<usize>,
    ) -> CoordinatorResult<PendingPage> {
        let limit = limit.unwrap_or(self.config.page_size);
        self.blocking(move |store| store.list_pending_page(kind, after, limit))
            .await
    }

    /// Lazy iterator over the pending queue. Each page is a blocking read;
    /// drive it from a blocking context.
    pub fn pending_requests(&self, kind: Option<ComponentKind>) -> PendingRequests {
        self.store.pending_requests(kind, self.config.page_size)
    }
}
