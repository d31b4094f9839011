//! Per-component mutation locks.
//!
//! One async mutex per `ComponentKey`, created on demand. Entries nobody
//! holds or waits on are pruned on the next acquisition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use scalegate_state::ComponentKey;
use tokio::sync::OwnedMutexGuard;
use tracing::warn;

use crate::error::{CoordinatorError, CoordinatorResult};

type Slot = Arc<tokio::sync::Mutex<()>>;

#[derive(Clone, Default)]
pub struct ComponentLocks {
    slots: Arc<Mutex<HashMap<ComponentKey, Slot>>>,
}

impl ComponentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to `key`.
    pub async fn acquire(
        &self,
        key: &ComponentKey,
        timeout: Duration,
    ) -> CoordinatorResult<OwnedMutexGuard<()>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                warn!(component = %key, ?timeout, "timed out waiting for component lock");
                Err(CoordinatorError::Busy(key.clone()))
            }
        }
    }

    /// Number of components with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
