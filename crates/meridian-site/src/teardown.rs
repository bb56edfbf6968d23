//! Bounded-retry teardown of a site's network components.
//!
//! Adapters that provision a network, subnet and router call
//! [`teardown_network`] from their `stop()`; the components are removed in
//! dependency order and the whole sequence is retried a fixed number of
//! times.

use std::time::Duration;

use async_trait::async_trait;
use meridian_config::TeardownSettings;
use tracing::{error, info, warn};

use crate::SiteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownPolicy {
  pub max_rounds: u32,
  pub delay: Duration,
}

impl Default for TeardownPolicy {
  fn default() -> Self {
    Self::from(&TeardownSettings::default())
  }
}

impl From<&TeardownSettings> for TeardownPolicy {
  fn from(settings: &TeardownSettings) -> Self {
    Self {
      max_rounds: settings.max_rounds,
      delay: settings.delay(),
    }
  }
}

/// Identifiers of the components making up a provisioned network. Absent
/// components are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkResources {
  pub region: String,
  pub network_id: Option<String>,
  pub subnet_id: Option<String>,
  pub router_id: Option<String>,
}

/// Native delete operations of a backend's networking API.
#[async_trait]
pub trait NetworkTeardown: Send + Sync {
  async fn detach_subnet(
    &self,
    region: &str,
    router_id: &str,
    subnet_id: &str,
  ) -> Result<(), SiteError>;

  async fn delete_router(&self, region: &str, router_id: &str) -> Result<(), SiteError>;

  async fn delete_subnet(&self, region: &str, subnet_id: &str) -> Result<(), SiteError>;

  async fn delete_network(&self, region: &str, network_id: &str) -> Result<(), SiteError>;
}

/// Delete `resources` through `backend`, retrying the full sequence up to
/// `policy.max_rounds` times.
///
/// Returns `true` once a round completes; `false` if every round failed.
pub async fn teardown_network(
  backend: &dyn NetworkTeardown,
  resources: &NetworkResources,
  policy: &TeardownPolicy,
) -> bool {
  for round in 1..=policy.max_rounds {
    match delete_round(backend, resources).await {
      Ok(()) => {
        info!(region = %resources.region, round, "network teardown completed");
        return true;
      }
      Err(e) => {
        warn!(
          region = %resources.region,
          round,
          error = %e,
          "network teardown round failed"
        );
        if round < policy.max_rounds {
          tokio::time::sleep(policy.delay).await;
        }
      }
    }
  }

  error!(
    region = %resources.region,
    network_id = ?resources.network_id,
    rounds = policy.max_rounds,
    "giving up on network teardown"
  );
  false
}

async fn delete_round(
  backend: &dyn NetworkTeardown,
  resources: &NetworkResources,
) -> Result<(), SiteError> {
  let region = resources.region.as_str();

  if let (Some(router), Some(subnet)) = (&resources.router_id, &resources.subnet_id) {
    backend.detach_subnet(region, router, subnet).await?;
  }
  if let Some(router) = &resources.router_id {
    backend.delete_router(region, router).await?;
  }
  if let Some(subnet) = &resources.subnet_id {
    backend.delete_subnet(region, subnet).await?;
  }
  if let Some(network) = &resources.network_id {
    backend.delete_network(region, network).await?;
  }
  Ok(())
}
