//! Coordinator tuning knobs.

use std::time::Duration;

/// Timeouts and paging for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Longest wait for a component's mutation lock before returning `Busy`.
    pub lock_timeout: Duration,
    /// Bound on one `apply_replicas` call during approval.
    pub apply_timeout: Duration,
    /// Default page size for the admin queue.
    pub page_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            apply_timeout: Duration::from_secs(10),
            page_size: 50,
        }
    }
}
