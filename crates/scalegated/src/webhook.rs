//! HTTP applier that pushes approved replica counts to an orchestrator.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use scalegate_coordinator::ReplicaApplier;
use scalegate_state::{ComponentId, ComponentKey, ComponentKind};
use serde::Serialize;
use tracing::{debug, info};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyReplicasBody<'a> {
    component_id: &'a ComponentId,
    kind: ComponentKind,
    replicas: u32,
}

/// POSTs `{componentId, kind, replicas}` to a fixed URL. Any non-2xx status
/// counts as a failed apply.
pub struct WebhookApplier {
    client: Client,
    url: String,
}

impl WebhookApplier {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReplicaApplier for WebhookApplier {
    async fn apply_replicas(&self, component: &ComponentKey, replicas: u32) -> anyhow::Result<()> {
        let body = ApplyReplicasBody {
            component_id: &component.id,
            kind: component.kind,
            replicas,
        };
        debug!(%component, replicas, url = %self.url, "posting replica count");

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("orchestrator unreachable at {}", self.url))?;
        let status = resp.status();
        resp.error_for_status()
            .with_context(|| format!("orchestrator rejected apply ({status})"))?;

        info!(%component, replicas, "orchestrator applied replica count");
        Ok(())
    }
}
