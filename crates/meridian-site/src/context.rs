use std::collections::BTreeMap;

use async_trait::async_trait;
use meridian_config::{ComputeRequest, SdxPrefix, StitchRequest, StorageRequest};
use serde::{Deserialize, Serialize};

use crate::{SiteError, SiteRecord};

/// Result of a provisioning call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
  /// The backend applied the request.
  Completed(T),
  /// The backend cannot satisfy the request yet (capacity, lease window);
  /// it should be retried on a later reconciliation tick.
  Deferred,
}

impl<T> Outcome<T> {
  pub fn is_deferred(&self) -> bool {
    matches!(self, Outcome::Deferred)
  }

  pub fn completed(self) -> Option<T> {
    match self {
      Outcome::Completed(value) => Some(value),
      Outcome::Deferred => None,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
    match self {
      Outcome::Completed(value) => Outcome::Completed(f(value)),
      Outcome::Deferred => Outcome::Deferred,
    }
  }
}

/// Workflow-wide counters handed to a compute call so the backend can
/// generate names that are unique across every site of the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeCounters {
  pub node_count: u32,
  pub stitch_count: u32,
}

/// What a site reports back after provisioning compute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeResponse {
  pub node_count: u32,
  pub stitch_count: u32,
  /// Provisioned host names, each with the allocation (slice) it lives in
  /// when the backend has one.
  pub host_names: BTreeMap<String, Option<String>>,
}

/// Arguments for connecting one endpoint of a link to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchSetup {
  pub host: String,
  pub ip: String,
  pub subnet: String,
  pub local_subnet: Option<String>,
  /// Identifier of the far endpoint, either a host name or, for peers behind
  /// a site-local network, the peer site's short name.
  pub peer: String,
  pub controller: Option<String>,
}

/// A single route from one of the source's subnets to one of the
/// destination's subnets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRoute {
  pub host: String,
  pub from_subnet: String,
  pub to_subnet: String,
  pub link_speed: Option<String>,
  pub peer_ip: String,
  pub controller: Option<String>,
}

/// Companion stitch from the connecting site into another site's network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStitch {
  pub tag: String,
  pub port_url: String,
  pub bandwidth: Option<String>,
  pub vlan_id: String,
  pub destination_url: String,
}

/// One cloud backend participating in a workflow.
///
/// A context is owned exclusively by the workflow that created it and is
/// only ever called while that workflow's lock is held. Every method may
/// block on a remote API for a long time.
#[async_trait]
pub trait SiteContext: Send + Sync {
  /// Site key this context was created for.
  fn site(&self) -> &str;

  /// Backend family, persisted as the record's `type`.
  fn kind(&self) -> &str;

  /// True for backends that sit behind a site-local network and can only be
  /// addressed by their site's short name from the other side of a link.
  /// Stitching to or through such a site requires an exchange controller.
  fn requires_local_endpoint_substitution(&self) -> bool {
    false
  }

  fn contains_host(&self, host: &str) -> bool;

  fn contains_slice(&self, slice: &str) -> bool;

  async fn process_compute(
    &mut self,
    request: &ComputeRequest,
    counters: ComputeCounters,
    is_deferred: bool,
  ) -> Result<Outcome<ComputeResponse>, SiteError>;

  /// Returns the updated storage counter.
  async fn process_storage(
    &mut self,
    request: &StorageRequest,
    storage_count: u32,
    is_deferred: bool,
  ) -> Result<Outcome<u32>, SiteError>;

  /// Returns the updated stitch counter.
  async fn process_stitch(
    &mut self,
    request: &StitchRequest,
    stitch_count: u32,
    is_deferred: bool,
  ) -> Result<Outcome<u32>, SiteError>;

  async fn setup_stitching_and_route(&mut self, setup: &StitchSetup) -> Result<(), SiteError>;

  async fn install_link(&mut self, link: &LinkRoute) -> Result<(), SiteError>;

  async fn process_sdx_prefix(&mut self, prefix: &SdxPrefix) -> Result<(), SiteError>;

  /// VLAN of the network this site provisioned, if any. A compute request
  /// carrying a stitch port and tag is bridged to the connecting site over
  /// this VLAN.
  fn network_vlan_id(&self) -> Option<String> {
    None
  }

  /// Stitch the connecting site into another site's VLAN. Returns the
  /// updated stitch counter.
  async fn stitch_to_network(
    &mut self,
    peer: &PeerStitch,
    stitch_count: u32,
  ) -> Result<u32, SiteError> {
    let _ = (peer, stitch_count);
    Err(SiteError::unsupported(self.site(), "stitch_to_network"))
  }

  /// Host name under which the metadata service knows `host`.
  fn metadata_host_name(&self, host: &str) -> String {
    host.to_string()
  }

  /// Current status, `None` when the site has nothing to report.
  fn status(&self) -> Option<serde_json::Value>;

  /// Reload externally observable state and return the fresh status.
  async fn periodic_refresh(&mut self) -> Result<Option<serde_json::Value>, SiteError>;

  /// Read and clear the "publish a notification" flag.
  fn take_notification_request(&mut self) -> bool;

  /// Deprovision everything this context owns.
  async fn stop(&mut self) -> Result<(), SiteError>;

  fn to_record(&self) -> SiteRecord;

  /// Rebuild state from a persisted record.
  async fn restore(&mut self, record: &SiteRecord) -> Result<(), SiteError>;
}
