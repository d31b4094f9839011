//! scalegate-state — embedded state store for ScaleGate.
//!
//! Backed by [redb](https://docs.rs/redb), holds the component registry
//! (current and maximum replica counts per backend/frontend) and the scale
//! request history, including the indexes that enforce the single-pending
//! request invariant.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns. Index
//! tables map string keys to request ids (`u64`):
//!
//! - `pending` — `{kind}/{component_id}` → id of its PENDING request
//! - `pending_queue` — `{created_at}:{id}` (zero padded) → id, giving the
//!   oldest-first admin queue order
//!
//! redb serializes write transactions, so every check-and-write performed
//! inside one transaction is atomic with respect to concurrent callers.
//! Reads run against an MVCC snapshot and never observe a torn state.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod pending;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use pending::PendingRequests;
pub use store::{ComponentRemoval, StateStore};
pub use types::*;
