//! redb table definitions for the ScaleGate state store.
//!
//! Record tables use `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Index tables store request ids as `u64` values.

use redb::TableDefinition;

/// Component registry keyed by `{kind}/{component_id}`.
pub const COMPONENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("components");

/// Scale request history keyed by the zero-padded request id.
pub const SCALE_REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("scale_requests");

/// At most one entry per component: `{kind}/{component_id}` → pending request id.
pub const PENDING: TableDefinition<&str, u64> = TableDefinition::new("pending");

/// Admin queue: `{created_at}:{id}` (both zero-padded) → pending request id.
pub const PENDING_QUEUE: TableDefinition<&str, u64> = TableDefinition::new("pending_queue");

/// Counters. Holds `next_request_id`.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key in [`META`] for the request id allocator.
pub const NEXT_REQUEST_ID: &str = "next_request_id";

/// Key in [`META`] for the newest request `created_at`, kept monotonic.
pub const LAST_CREATED_AT: &str = "last_created_at";
