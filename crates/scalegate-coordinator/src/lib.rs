//! scalegate-coordinator — the replica scale request workflow.
//!
//! Mediates between the component registry and the scale request store
//! held in `scalegate-state`:
//!
//! ```text
//! user ── create ──► PENDING ──approve──► applyReplicas ──► registry + APPROVED
//!                       │
//!                       ├── reject (admin, reason) ──► REJECTED
//!                       └── cancel (user/admin) ─────► CANCELLED
//! ```
//!
//! # Components
//!
//! - **`coordinator`** — `Coordinator`: create/approve/reject/cancel, replica
//!   info, admin queue listing, registry sync
//! - **`applier`** — `ReplicaApplier`, the hook into the orchestration layer
//! - **`locks`** — per-component mutation locks with bounded waits
//! - **`error`** — `CoordinatorError` and retryability
//!
//! All mutations on one component are serialized through its lock, so an
//! approval's external call cannot interleave with a cancel or a second
//! approval of the same request. Locks are never nested.

pub mod applier;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod locks;

pub use applier::{NoopApplier, ReplicaApplier};
pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use error::{CoordinatorError, CoordinatorResult};
pub use locks::ComponentLocks;
