//! Orchestration hook invoked when a scale request is approved.

use async_trait::async_trait;
use scalegate_state::ComponentKey;
use tracing::info;

/// Applies a replica count to the live workload of a component.
///
/// Implementations must be idempotent: the coordinator calls this again with
/// the same target when an admin retries an approval after a failure or a
/// timeout.
#[async_trait]
pub trait ReplicaApplier: Send + Sync {
    async fn apply_replicas(&self, component: &ComponentKey, replicas: u32) -> anyhow::Result<()>;
}

/// Applier for deployments without an orchestrator attached. Only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopApplier;

#[async_trait]
impl ReplicaApplier for NoopApplier {
    async fn apply_replicas(&self, component: &ComponentKey, replicas: u32) -> anyhow::Result<()> {
        info!(%component, replicas, "no orchestrator configured, skipping apply");
        Ok(())
    }
}
