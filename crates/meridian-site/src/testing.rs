//! Scripted in-memory backend for exercising the orchestrator without a
//! cloud.
//!
//! Every site created by a [`ScriptedBackend`] shares a ledger with the
//! backend, so tests can inspect calls made to a context even after the
//! orchestrator has dropped it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use meridian_config::{ComputeRequest, SdxPrefix, StitchRequest, StorageRequest};

use crate::{
  ComputeCounters, ComputeResponse, LinkRoute, Outcome, PeerStitch, SiteContext,
  SiteContextFactory, SiteError, SiteRecord, StitchSetup,
};

/// How a site answers its next provisioning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
  Succeed,
  Defer,
  Fail,
}

/// Calls observed on one site key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteLedger {
  pub created: u32,
  pub compute_calls: u32,
  pub deferred_compute_calls: u32,
  pub storage_calls: u32,
  pub stitch_calls: u32,
  pub sdx_calls: u32,
  pub refresh_calls: u32,
  pub stop_calls: u32,
  pub restore_calls: u32,
  pub stitch_setups: Vec<StitchSetup>,
  pub links: Vec<LinkRoute>,
  pub peer_stitches: Vec<PeerStitch>,
}

#[derive(Default)]
struct Shared {
  ledgers: HashMap<String, SiteLedger>,
  replies: HashMap<String, VecDeque<Reply>>,
  local_families: Vec<String>,
  vlans: HashMap<String, String>,
  rejected: HashSet<String>,
  failing_refresh: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct ScriptedBackend {
  shared: Arc<Mutex<Shared>>,
}

impl ScriptedBackend {
  pub fn new() -> Self {
    Self::default()
  }

  fn state(&self) -> MutexGuard<'_, Shared> {
    lock(&self.shared)
  }

  /// Queue the answer for the next provisioning call on `site`. Sites with
  /// an empty queue succeed.
  pub fn reply(&self, site: &str, reply: Reply) {
    self
      .state()
      .replies
      .entry(site.to_string())
      .or_default()
      .push_back(reply);
  }

  /// Sites whose key starts with `prefix` sit behind a site-local network.
  pub fn local_network_family(&self, prefix: &str) {
    self.state().local_families.push(prefix.to_string());
  }

  /// Give `site` a provisioned VLAN, enabling companion stitches.
  pub fn vlan(&self, site: &str, vlan_id: &str) {
    self
      .state()
      .vlans
      .insert(site.to_string(), vlan_id.to_string());
  }

  /// Make the factory refuse `site`.
  pub fn reject_site(&self, site: &str) {
    self.state().rejected.insert(site.to_string());
  }

  /// Make `periodic_refresh` fail on `site`.
  pub fn fail_refresh(&self, site: &str) {
    self.state().failing_refresh.insert(site.to_string());
  }

  pub fn ledger(&self, site: &str) -> SiteLedger {
    self.state().ledgers.get(site).cloned().unwrap_or_default()
  }

  pub fn pending_replies(&self, site: &str) -> usize {
    self.state().replies.get(site).map_or(0, VecDeque::len)
  }
}

impl SiteContextFactory for ScriptedBackend {
  fn create(&self, site: &str, workflow_id: &str) -> Result<Box<dyn SiteContext>, SiteError> {
    let mut state = self.state();
    if state.rejected.contains(site) {
      return Err(SiteError::unknown_site(site));
    }
    state.ledgers.entry(site.to_string()).or_default().created += 1;
    let local = state
      .local_families
      .iter()
      .any(|prefix| site.starts_with(prefix.as_str()));
    let vlan = state.vlans.get(site).cloned();
    drop(state);

    Ok(Box::new(ScriptedSite {
      site: site.to_string(),
      workflow_id: workflow_id.to_string(),
      shared: Arc::clone(&self.shared),
      hosts: BTreeMap::new(),
      slices: BTreeSet::new(),
      notify: false,
      local,
      vlan,
    }))
  }
}

/// A site that provisions one host per successful compute call.
pub struct ScriptedSite {
  site: String,
  workflow_id: String,
  shared: Arc<Mutex<Shared>>,
  hosts: BTreeMap<String, String>,
  slices: BTreeSet<String>,
  notify: bool,
  local: bool,
  vlan: Option<String>,
}

impl ScriptedSite {
  fn record(&self, f: impl FnOnce(&mut SiteLedger)) {
    let mut state = lock(&self.shared);
    f(state.ledgers.entry(self.site.clone()).or_default());
  }

  fn next_reply(&self) -> Reply {
    lock(&self.shared)
      .replies
      .get_mut(&self.site)
      .and_then(VecDeque::pop_front)
      .unwrap_or(Reply::Succeed)
  }

  fn family(&self) -> &str {
    self.site.split(':').next().unwrap_or(&self.site)
  }

  fn failed(&self, operation: &str) -> SiteError {
    SiteError::provision(&self.site, format!("scripted failure in {operation}"))
  }
}

#[async_trait]
impl SiteContext for ScriptedSite {
  fn site(&self) -> &str {
    &self.site
  }

  fn kind(&self) -> &str {
    self.family()
  }

  fn requires_local_endpoint_substitution(&self) -> bool {
    self.local
  }

  fn contains_host(&self, host: &str) -> bool {
    self.hosts.contains_key(host)
  }

  fn contains_slice(&self, slice: &str) -> bool {
    self.slices.contains(slice)
  }

  async fn process_compute(
    &mut self,
    request: &ComputeRequest,
    counters: ComputeCounters,
    is_deferred: bool,
  ) -> Result<Outcome<ComputeResponse>, SiteError> {
    self.record(|l| {
      l.compute_calls += 1;
      if is_deferred {
        l.deferred_compute_calls += 1;
      }
    });

    match self.next_reply() {
      Reply::Defer => return Ok(Outcome::Deferred),
      Reply::Fail => return Err(self.failed("compute")),
      Reply::Succeed => {}
    }

    let node_count = counters.node_count + 1;
    let prefix = request.host_name_prefix.as_deref().unwrap_or("node");
    let host = format!("{prefix}{node_count}");
    let slice = request
      .slice_name
      .clone()
      .unwrap_or_else(|| format!("{}-{}", self.workflow_id, self.family()));

    self.slices.insert(slice.clone());
    self.hosts.insert(host.clone(), slice.clone());
    self.notify = true;

    Ok(Outcome::Completed(ComputeResponse {
      node_count,
      stitch_count: counters.stitch_count,
      host_names: BTreeMap::from([(host, Some(slice))]),
    }))
  }

  async fn process_storage(
    &mut self,
    _request: &StorageRequest,
    storage_count: u32,
    _is_deferred: bool,
  ) -> Result<Outcome<u32>, SiteError> {
    self.record(|l| l.storage_calls += 1);
    match self.next_reply() {
      Reply::Succeed => Ok(Outcome::Completed(storage_count + 1)),
      Reply::Defer => Ok(Outcome::Deferred),
      Reply::Fail => Err(self.failed("storage")),
    }
  }

  async fn process_stitch(
    &mut self,
    _request: &StitchRequest,
    stitch_count: u32,
    _is_deferred: bool,
  ) -> Result<Outcome<u32>, SiteError> {
    self.record(|l| l.stitch_calls += 1);
    match self.next_reply() {
      Reply::Succeed => Ok(Outcome::Completed(stitch_count + 1)),
      Reply::Defer => Ok(Outcome::Deferred),
      Reply::Fail => Err(self.failed("stitch")),
    }
  }

  async fn setup_stitching_and_route(&mut self, setup: &StitchSetup) -> Result<(), SiteError> {
    self.record(|l| l.stitch_setups.push(setup.clone()));
    Ok(())
  }

  async fn install_link(&mut self, link: &LinkRoute) -> Result<(), SiteError> {
    self.record(|l| l.links.push(link.clone()));
    Ok(())
  }

  async fn process_sdx_prefix(&mut self, _prefix: &SdxPrefix) -> Result<(), SiteError> {
    self.record(|l| l.sdx_calls += 1);
    Ok(())
  }

  fn network_vlan_id(&self) -> Option<String> {
    self.vlan.clone()
  }

  async fn stitch_to_network(
    &mut self,
    peer: &PeerStitch,
    stitch_count: u32,
  ) -> Result<u32, SiteError> {
    self.record(|l| l.peer_stitches.push(peer.clone()));
    match self.next_reply() {
      Reply::Fail => Err(self.failed("stitch_to_network")),
      _ => Ok(stitch_count + 1),
    }
  }

  fn metadata_host_name(&self, host: &str) -> String {
    if self.local && !host.ends_with(".novalocal") {
      format!("{host}.novalocal")
    } else {
      host.to_string()
    }
  }

  fn status(&self) -> Option<serde_json::Value> {
    if self.hosts.is_empty() {
      return None;
    }
    Some(serde_json::json!({
      "site": self.site,
      "hosts": self.hosts.keys().collect::<Vec<_>>(),
    }))
  }

  async fn periodic_refresh(&mut self) -> Result<Option<serde_json::Value>, SiteError> {
    self.record(|l| l.refresh_calls += 1);
    if lock(&self.shared).failing_refresh.contains(&self.site) {
      return Err(self.failed("refresh"));
    }
    Ok(self.status())
  }

  fn take_notification_request(&mut self) -> bool {
    std::mem::take(&mut self.notify)
  }

  async fn stop(&mut self) -> Result<(), SiteError> {
    self.record(|l| l.stop_calls += 1);
    self.hosts.clear();
    self.slices.clear();
    Ok(())
  }

  fn to_record(&self) -> SiteRecord {
    let mut record = SiteRecord::new(self.family(), &self.site);
    record.slices = self.slices.iter().cloned().collect();
    record
      .extra
      .insert("hosts".to_string(), serde_json::json!(self.hosts));
    record
  }

  async fn restore(&mut self, record: &SiteRecord) -> Result<(), SiteError> {
    self.record(|l| l.restore_calls += 1);
    let hosts = record
      .extra
      .get("hosts")
      .cloned()
      .ok_or_else(|| SiteError::snapshot(&self.site, "missing hosts"))?;
    self.hosts = serde_json::from_value(hosts)
      .map_err(|e| SiteError::snapshot(&self.site, e.to_string()))?;
    self.slices = record.slices.iter().cloned().collect();
    Ok(())
  }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
  shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
