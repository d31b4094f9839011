//! StateStore — redb-backed state persistence for ScaleGate.
//!
//! Provides the component registry and the scale request store. Every
//! operation that checks an invariant and then writes does both inside a
//! single redb write transaction; redb admits one writer at a time, so the
//! check cannot be raced. The store supports both on-disk and in-memory
//! backends (the latter for testing).

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable, Table};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::pending::PendingRequests;
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type JsonTable<'txn> = Table<'txn, &'static str, &'static [u8]>;
type IdTable<'txn> = Table<'txn, &'static str, u64>;

/// Actor recorded on requests cancelled by component removal.
pub const SYSTEM_ACTOR: &str = "system";

/// Result of removing a component from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRemoval {
    pub component: Component,
    /// The pending request that was cancelled along with the component.
    pub cancelled: Option<ScaleRequest>,
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(COMPONENTS).map_err(map_err!(Table))?;
        txn.open_table(SCALE_REQUESTS).map_err(map_err!(Table))?;
        txn.open_table(PENDING).map_err(map_err!(Table))?;
        txn.open_table(PENDING_QUEUE).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Component registry ─────────────────────────────────────────

    /// Insert or update a component. Called by deploy/start/stop writers.
    pub fn put_component(&self, component: &Component) -> StateResult<Component> {
        if component.current_replicas == 0 {
            return Err(StateError::NoReplicas(component.key()));
        }
        let mut stored = component.clone();
        stored.updated_at = now_millis();
        let key = stored.table_key();

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(COMPONENTS).map_err(map_err!(Table))?;
            write_json(&mut table, &key, &stored)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, replicas = stored.current_replicas, max = stored.max_replicas, "component stored");
        Ok(stored)
    }

    /// Get a component by kind and id.
    pub fn get_component(&self, key: &ComponentKey) -> StateResult<Option<Component>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(COMPONENTS).map_err(map_err!(Table))?;
        read_json(&table, &key.table_key())
    }

    /// List registered components, optionally restricted to one kind.
    pub fn list_components(&self, kind: Option<ComponentKind>) -> StateResult<Vec<Component>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(COMPONENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let component: Component =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if kind.is_none_or(|k| k == component.kind) {
                results.push(component);
            }
        }
        Ok(results)
    }

    /// Remove a component. A PENDING request for it is cancelled in the
    /// same transaction. Returns `None` if the component did not exist.
    pub fn delete_component(&self, key: &ComponentKey) -> StateResult<Option<ComponentRemoval>> {
        let table_key = key.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removal = {
            let mut components = txn.open_table(COMPONENTS).map_err(map_err!(Table))?;
            let removed = components
                .remove(table_key.as_str())
                .map_err(map_err!(Write))?
                .map(|guard| guard.value().to_vec());
            match removed {
                None => None,
                Some(bytes) => {
                    let component: Component =
                        serde_json::from_slice(&bytes).map_err(map_err!(Deserialize))?;
                    let mut requests = txn.open_table(SCALE_REQUESTS).map_err(map_err!(Table))?;
                    let mut pending = txn.open_table(PENDING).map_err(map_err!(Table))?;
                    let mut queue = txn.open_table(PENDING_QUEUE).map_err(map_err!(Table))?;
                    let pending_id = pending
                        .get(table_key.as_str())
                        .map_err(map_err!(Read))?
                        .map(|guard| guard.value());
                    let cancelled = match pending_id {
                        Some(id) => Some(finish_pending(
                            &mut requests,
                            &mut pending,
                            &mut queue,
                            Decision {
                                id,
                                to: RequestStatus::Cancelled,
                                reason: None,
                                actor: Some(SYSTEM_ACTOR),
                                at: now_millis(),
                            },
                        )?),
                        None => None,
                    };
                    Some(ComponentRemoval {
                        component,
                        cancelled,
                    })
                }
            }
        };
        txn.commit().map_err(map_err!(Transaction))?;
        if let Some(removal) = &removal {
            info!(
                component = %key,
                cancelled = ?removal.cancelled.as_ref().map(|r| r.id),
                "component removed"
            );
        }
        Ok(removal)
    }

    // ── Scale requests ─────────────────────────────────────────────

    /// Create a PENDING scale request for a component.
    ///
    /// Fails with `PendingRequestExists` if the component already has one,
    /// `InvalidReplicaCount` if `new_replicas` is outside `[1, effective_max]`
    /// or equal to the current count, and `NotFound` for unknown components.
    pub fn create_request(
        &self,
        key: &ComponentKey,
        new_replicas: u32,
        requested_by: Option<&str>,
    ) -> StateResult<ScaleRequest> {
        let component_key = key.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let request = {
            let components = txn.open_table(COMPONENTS).map_err(map_err!(Table))?;
            let mut requests = txn.open_table(SCALE_REQUESTS).map_err(map_err!(Table))?;
            let mut pending = txn.open_table(PENDING).map_err(map_err!(Table))?;
            let mut queue = txn.open_table(PENDING_QUEUE).map_err(map_err!(Table))?;
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;

            let component: Component = read_json(&components, &component_key)?
                .ok_or_else(|| StateError::component_not_found(key))?;

            let existing_id = pending
                .get(component_key.as_str())
                .map_err(map_err!(Read))?
                .map(|guard| guard.value());
            if let Some(existing_id) = existing_id {
                let existing: ScaleRequest =
                    read_json(&requests, &request_table_key(existing_id))?
                        .ok_or_else(|| StateError::request_not_found(existing_id))?;
                return Err(StateError::PendingRequestExists(Box::new(existing)));
            }

            component.validate_target(new_replicas)?;

            let id = meta
                .get(NEXT_REQUEST_ID)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(1);
            meta.insert(NEXT_REQUEST_ID, id + 1).map_err(map_err!(Write))?;

            // Never go below the previous creation time, even if the clock steps back.
            let last_created = meta
                .get(LAST_CREATED_AT)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0);
            let created_at = now_millis().max(last_created);
            meta.insert(LAST_CREATED_AT, created_at)
                .map_err(map_err!(Write))?;

            let request = ScaleRequest {
                id,
                component_id: key.id.clone(),
                component_kind: key.kind,
                old_replicas: component.current_replicas,
                new_replicas,
                status: RequestStatus::Pending,
                reason_reject: None,
                requested_by: requested_by.map(str::to_string),
                decided_by: None,
                created_at,
                decided_at: None,
            };
            write_json(&mut requests, &request.table_key(), &request)?;
            pending
                .insert(component_key.as_str(), id)
                .map_err(map_err!(Write))?;
            queue
                .insert(request.queue_key().as_str(), id)
                .map_err(map_err!(Write))?;
            request
        };
        txn.commit().map_err(map_err!(Transaction))?;
        info!(
            request_id = request.id,
            component = %key,
            from = request.old_replicas,
            to = request.new_replicas,
            "scale request created"
        );
        Ok(request)
    }

    /// Get a scale request by id.
    pub fn get_request(&self, id: RequestId) -> StateResult<ScaleRequest> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCALE_REQUESTS).map_err(map_err!(Table))?;
        read_json(&table, &request_table_key(id))?.ok_or_else(|| StateError::request_not_found(id))
    }

    /// Get the PENDING request for a component, if any.
    pub fn get_pending_request(&self, key: &ComponentKey) -> StateResult<Option<ScaleRequest>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let pending = txn.open_table(PENDING).map_err(map_err!(Table))?;
        let requests = txn.open_table(SCALE_REQUESTS).map_err(map_err!(Table))?;
        read_pending(&pending, &requests, key)
    }

    /// Move a PENDING request to a terminal status.
    ///
    /// Registry state is not touched; approval with reconciliation goes
    /// through [`StateStore::approve_request`].
    pub fn transition(
        &self,
        id: RequestId,
        to: RequestStatus,
        reason: Option<&str>,
        actor: Option<&str>,
    ) -> StateResult<ScaleRequest> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let request = {
            let mut requests = txn.open_table(SCALE_REQUESTS).map_err(map_err!(Table))?;
            let mut pending = txn.open_table(PENDING).map_err(map_err!(Table))?;
            let mut queue = txn.open_table(PENDING_QUEUE).map_err(map_err!(Table))?;
            finish_pending(
                &mut requests,
                &mut pending,
                &mut queue,
                Decision {
                    id,
                    to,
                    reason,
                    actor,
                    at: now_millis(),
                },
            )?
        };
        txn.commit().map_err(map_err!(Transaction))?;
        info!(request_id = id, status = %request.status, "scale request decided");
        Ok(request)
    }

    /// Approve a PENDING request: write `new_replicas` into the registry and
    /// mark the request APPROVED in one transaction.
    pub fn approve_request(
        &self,
        id: RequestId,
        actor: Option<&str>,
    ) -> StateResult<(ScaleRequest, Component)> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome = {
            let mut components = txn.open_table(COMPONENTS).map_err(map_err!(Table))?;
            let mut requests = txn.open_table(SCALE_REQUESTS).map_err(map_err!(Table))?;
            let mut pending = txn.open_table(PENDING).map_err(map_err!(Table))?;
            let mut queue = txn.open_table(PENDING_QUEUE).map_err(map_err!(Table))?;

            let request: ScaleRequest = read_json(&requests, &request_table_key(id))?
                .ok_or_else(|| StateError::request_not_found(id))?;
            if !request.status.can_transition_to(RequestStatus::Approved) {
                return Err(StateError::InvalidTransition {
                    id,
                    from: request.status,
                    to: RequestStatus::Approved,
                });
            }

            let key = request.component_key();
            let mut component: Component = read_json(&components, &key.table_key())?
                .ok_or_else(|| StateError::component_not_found(&key))?;
            let now = now_millis();
            component.current_replicas = request.new_replicas;
            component.updated_at = now;
            write_json(&mut components, &key.table_key(), &component)?;

            let approved = finish_pending(
                &mut requests,
                &mut pending,
                &mut queue,
                Decision {
                    id,
                    to: RequestStatus::Approved,
                    reason: None,
                    actor,
                    at: now,
                },
            )?;
            (approved, component)
        };
        txn.commit().map_err(map_err!(Transaction))?;
        info!(
            request_id = id,
            component = %outcome.1.key(),
            replicas = outcome.1.current_replicas,
            "scale request approved"
        );
        Ok(outcome)
    }

    /// Full request history for a component, oldest first.
    pub fn list_requests_for_component(
        &self,
        key: &ComponentKey,
    ) -> StateResult<Vec<ScaleRequest>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCALE_REQUESTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let request: ScaleRequest =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if request.component_kind == key.kind && request.component_id == key.id {
                results.push(request);
            }
        }
        results.sort_by_key(|r| (r.created_at, r.id));
        Ok(results)
    }

    /// One page of PENDING requests, oldest first.
    ///
    /// `after` resumes behind the given request id (the `next` cursor of the
    /// previous page). The cursor stays valid after that request is decided.
    pub fn list_pending_page(
        &self,
        kind: Option<ComponentKind>,
        after: Option<RequestId>,
        limit: usize,
    ) -> StateResult<PendingPage> {
        let limit = limit.max(1);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let queue = txn.open_table(PENDING_QUEUE).map_err(map_err!(Table))?;
        let requests = txn.open_table(SCALE_REQUESTS).map_err(map_err!(Table))?;

        let after_key = match after {
            Some(id) => {
                let cursor: ScaleRequest = read_json(&requests, &request_table_key(id))?
                    .ok_or_else(|| StateError::request_not_found(id))?;
                Some(cursor.queue_key())
            }
            None => None,
        };
        let start: Bound<&str> = match &after_key {
            Some(k) => Bound::Excluded(k.as_str()),
            None => Bound::Unbounded,
        };

        let mut items = Vec::new();
        for entry in queue
            .range::<&str>((start, Bound::Unbounded))
            .map_err(map_err!(Read))?
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let id = value.value();
            let request: ScaleRequest = read_json(&requests, &request_table_key(id))?
                .ok_or_else(|| StateError::request_not_found(id))?;
            if kind.is_some_and(|k| k != request.component_kind) {
                continue;
            }
            items.push(request);
            if items.len() > limit {
                break;
            }
        }

        let next = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|r| r.id)
        } else {
            None
        };
        Ok(PendingPage { items, next })
    }

    /// Lazy, restartable iterator over PENDING requests, oldest first.
    pub fn pending_requests(
        &self,
        kind: Option<ComponentKind>,
        page_size: usize,
    ) -> PendingRequests {
        PendingRequests::new(self.clone(), kind, page_size)
    }

    /// Registry entry and pending request read from one snapshot.
    pub fn replica_info(&self, key: &ComponentKey) -> StateResult<ReplicaInfo> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let components = txn.open_table(COMPONENTS).map_err(map_err!(Table))?;
        let pending = txn.open_table(PENDING).map_err(map_err!(Table))?;
        let requests = txn.open_table(SCALE_REQUESTS).map_err(map_err!(Table))?;

        let component: Component = read_json(&components, &key.table_key())?
            .ok_or_else(|| StateError::component_not_found(key))?;
        let pending_request = read_pending(&pending, &requests, key)?;
        Ok(ReplicaInfo::compose(&component, pending_request.as_ref()))
    }
}

/// A terminal transition to apply to a PENDING request.
struct Decision<'a> {
    id: RequestId,
    to: RequestStatus,
    reason: Option<&'a str>,
    actor: Option<&'a str>,
    at: u64,
}

/// Apply `decision` inside an open write transaction and drop the request
/// from both pending indexes.
fn finish_pending(
    requests: &mut JsonTable<'_>,
    pending: &mut IdTable<'_>,
    queue: &mut IdTable<'_>,
    decision: Decision<'_>,
) -> StateResult<ScaleRequest> {
    let id = decision.id;
    let mut request: ScaleRequest = read_json(&*requests, &request_table_key(id))?
        .ok_or_else(|| StateError::request_not_found(id))?;
    if !request.status.can_transition_to(decision.to) {
        return Err(StateError::InvalidTransition {
            id,
            from: request.status,
            to: decision.to,
        });
    }

    request.reason_reject = match decision.to {
        RequestStatus::Rejected => {
            let reason = decision
                .reason
                .filter(|r| !r.trim().is_empty())
                .ok_or(StateError::ReasonRequired(id))?;
            Some(reason.to_string())
        }
        _ => None,
    };
    request.status = decision.to;
    request.decided_by = decision.actor.map(str::to_string);
    request.decided_at = Some(decision.at);

    write_json(requests, &request.table_key(), &request)?;
    pending
        .remove(request.component_key().table_key().as_str())
        .map_err(map_err!(Write))?;
    queue
        .remove(request.queue_key().as_str())
        .map_err(map_err!(Write))?;
    Ok(request)
}

fn read_pending<P, R>(pending: &P, requests: &R, key: &ComponentKey) -> StateResult<Option<ScaleRequest>>
where
    P: ReadableTable<&'static str, u64>,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let id = pending
        .get(key.table_key().as_str())
        .map_err(map_err!(Read))?
        .map(|guard| guard.value());
    match id {
        Some(id) => read_json(requests, &request_table_key(id)),
        None => Ok(None),
    }
}

fn read_json<T, R>(table: &R, key: &str) -> StateResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn write_json<T: Serialize>(table: &mut JsonTable<'_>, key: &str, value: &T) -> StateResult<()> {
    let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
    table
        .insert(key, bytes.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
