//! Domain types for the ScaleGate state store.
//!
//! These types represent the component registry, scale requests and the
//! composed replica view served to the dashboard. All types are
//! serializable to/from JSON, both for storage in redb tables and for the
//! REST API (camelCase field names).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a deployable component (unique per kind).
pub type ComponentId = String;

/// Identifier of a scale request, assigned monotonically at creation.
pub type RequestId = u64;

/// Ceiling headroom applied when a component has no stored maximum.
pub const DEFAULT_MAX_HEADROOM: u32 = 4;

// ── Component ─────────────────────────────────────────────────────

/// What kind of workload a component is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Backend,
    Frontend,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Frontend => "frontend",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backend" => Ok(Self::Backend),
            "frontend" => Ok(Self::Frontend),
            other => Err(format!("unknown component kind: {other}")),
        }
    }
}

/// Identity of a component in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentKey {
    pub kind: ComponentKind,
    pub id: ComponentId,
}

impl ComponentKey {
    pub fn new(kind: ComponentKind, id: impl Into<ComponentId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn backend(id: impl Into<ComponentId>) -> Self {
        Self::new(ComponentKind::Backend, id)
    }

    pub fn frontend(id: impl Into<ComponentId>) -> Self {
        Self::new(ComponentKind::Frontend, id)
    }

    /// Build the composite key for the components and pending tables.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Registry entry for a deployed backend or frontend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: ComponentId,
    pub kind: ComponentKind,
    /// Replicas currently running (always >= 1 once registered).
    pub current_replicas: u32,
    /// Stored ceiling; 0 means unset and the default policy applies.
    #[serde(default)]
    pub max_replicas: u32,
    /// Unix timestamp (millis) of the last registry write.
    #[serde(default)]
    pub updated_at: u64,
}

impl Component {
    pub fn new(key: ComponentKey, current_replicas: u32, max_replicas: u32) -> Self {
        Self {
            id: key.id,
            kind: key.kind,
            current_replicas,
            max_replicas,
            updated_at: 0,
        }
    }

    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.kind, self.id.clone())
    }

    /// Build the composite key for the components table.
    pub fn table_key(&self) -> String {
        self.key().table_key()
    }

    /// The authoritative replica ceiling for this component.
    pub fn effective_max(&self) -> u32 {
        effective_max(self.current_replicas, self.max_replicas)
    }

    /// Check a requested replica count against `[1, effective_max]` and the
    /// current count.
    pub fn validate_target(&self, requested: u32) -> Result<(), crate::StateError> {
        let max = self.effective_max();
        if requested == 0 || requested > max || requested == self.current_replicas {
            return Err(crate::StateError::InvalidReplicaCount {
                requested,
                current: self.current_replicas,
                max,
            });
        }
        Ok(())
    }
}

/// Resolve the replica ceiling for a component.
///
/// A stored maximum is honoured but never allowed to sit at or below the
/// current count (there must always be room for one more replica). With no
/// stored maximum the ceiling is the current count plus a fixed headroom.
pub fn effective_max(current_replicas: u32, max_replicas: u32) -> u32 {
    if max_replicas > 0 {
        max_replicas.max(current_replicas.saturating_add(1))
    } else {
        current_replicas.max(1).saturating_add(DEFAULT_MAX_HEADROOM)
    }
}

// ── Scale request ─────────────────────────────────────────────────

/// Lifecycle status of a scale request.
///
/// ```text
/// PENDING ──► APPROVED
///    │
///    ├──────► REJECTED
///    │
///    └──────► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(self, Self::Pending) && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed change to a component's replica count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScaleRequest {
    pub id: RequestId,
    pub component_id: ComponentId,
    pub component_kind: ComponentKind,
    /// `current_replicas` of the component when the request was created.
    pub old_replicas: u32,
    pub new_replicas: u32,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_reject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    /// Unix timestamp (millis) of creation.
    pub created_at: u64,
    /// Unix timestamp (millis) of the terminal transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<u64>,
}

impl ScaleRequest {
    pub fn component_key(&self) -> ComponentKey {
        ComponentKey::new(self.component_kind, self.component_id.clone())
    }

    /// Build the key for the scale_requests table.
    pub fn table_key(&self) -> String {
        request_table_key(self.id)
    }

    /// Build the key for the pending_queue table.
    pub fn queue_key(&self) -> String {
        format!("{:020}:{:020}", self.created_at, self.id)
    }
}

/// Zero-padded so that lexicographic key order equals numeric id order.
pub fn request_table_key(id: RequestId) -> String {
    format!("{id:020}")
}

// ── Read models ───────────────────────────────────────────────────

/// Consistent replica view of one component, as consumed by the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaInfo {
    pub component_id: ComponentId,
    pub kind: ComponentKind,
    pub replicas: u32,
    pub max_replicas: u32,
    pub has_pending_request: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_new_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_status: Option<RequestStatus>,
    /// Informational annotation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReplicaInfo {
    /// Compose the view from a registry entry and its pending request.
    pub fn compose(component: &Component, pending: Option<&ScaleRequest>) -> Self {
        Self {
            component_id: component.id.clone(),
            kind: component.kind,
            replicas: component.current_replicas,
            max_replicas: component.effective_max(),
            has_pending_request: pending.is_some(),
            pending_request_id: pending.map(|r| r.id),
            pending_new_replicas: pending.map(|r| r.new_replicas),
            pending_status: pending.map(|r| r.status),
            message: pending.map(|_| "a scale request is already pending".to_string()),
        }
    }
}

/// One page of the oldest-first pending queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingPage {
    pub items: Vec<ScaleRequest>,
    /// Cursor for the following page (the last returned id), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<RequestId>,
}
