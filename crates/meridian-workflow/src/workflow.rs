use std::collections::BTreeMap;
use std::sync::Arc;

use meridian_config::{ComputeRequest, NetworkRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::deferred::{DeferredQueue, DeferredRequest};
use crate::{OrchestratorError, SiteRegistry, WorkflowEnv};

/// Workflow-wide counters used to generate unique resource names across
/// every site. They only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
  pub node_count: u32,
  pub storage_count: u32,
  pub stitch_count: u32,
}

#[derive(Default)]
pub(crate) struct WorkflowState {
  pub(crate) registry: SiteRegistry,
  pub(crate) counters: Counters,
  pub(crate) host_requests: BTreeMap<String, String>,
  pub(crate) link_requests: BTreeMap<String, String>,
  pub(crate) deferred: DeferredQueue,
  pub(crate) stopped: bool,
}

/// One orchestrated workflow: its site contexts, counters, request memos and
/// deferred queue, all behind a single lock.
///
/// Mutating entry points live on [`WorkflowGuard`], obtained from
/// [`Workflow::lock`]; the guard releases the lock when dropped, on every
/// exit path.
pub struct Workflow {
  id: String,
  env: Arc<WorkflowEnv>,
  state: Mutex<WorkflowState>,
}

impl Workflow {
  pub fn new(id: impl Into<String>, env: Arc<WorkflowEnv>) -> Self {
    Self::with_state(id.into(), env, WorkflowState::default())
  }

  pub(crate) fn with_state(id: String, env: Arc<WorkflowEnv>, state: WorkflowState) -> Self {
    Self {
      id,
      env,
      state: Mutex::new(state),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Wait for exclusive access to the workflow.
  pub async fn lock(&self) -> WorkflowGuard<'_> {
    WorkflowGuard {
      workflow_id: &self.id,
      env: &self.env,
      state: self.state.lock().await,
    }
  }

  /// Whether someone currently holds the lock. Diagnostic only.
  pub fn locked(&self) -> bool {
    self.state.try_lock().is_err()
  }

  /// Status of every site that has something to report.
  ///
  /// Takes the lock briefly, so it waits for an in-flight mutation rather
  /// than observing it half applied.
  pub async fn status(&self) -> serde_json::Value {
    self.lock().await.status()
  }
}

/// Exclusive access to a workflow's state.
pub struct WorkflowGuard<'a> {
  pub(crate) workflow_id: &'a str,
  pub(crate) env: &'a WorkflowEnv,
  pub(crate) state: MutexGuard<'a, WorkflowState>,
}

impl WorkflowGuard<'_> {
  pub fn workflow_id(&self) -> &str {
    self.workflow_id
  }

  /// Whether [`WorkflowGuard::stop`] has run. A stopped workflow accepts
  /// no further requests.
  pub fn is_stopped(&self) -> bool {
    self.state.stopped
  }

  pub(crate) fn ensure_running(&self) -> Result<(), OrchestratorError> {
    if self.state.stopped {
      return Err(OrchestratorError::not_found(format!(
        "workflow '{}' has been stopped",
        self.workflow_id
      )));
    }
    Ok(())
  }

  pub fn counters(&self) -> Counters {
    self.state.counters
  }

  pub fn site_keys(&self) -> Vec<String> {
    self.state.registry.keys().map(str::to_string).collect()
  }

  pub fn has_site(&self, site: &str) -> bool {
    self.state.registry.contains(site)
  }

  pub fn host_requests(&self) -> &BTreeMap<String, String> {
    &self.state.host_requests
  }

  pub fn link_requests(&self) -> &BTreeMap<String, String> {
    &self.state.link_requests
  }

  /// Serialized compute request that produced `host`.
  pub fn host_request(&self, host: &str) -> Option<&str> {
    self.state.host_requests.get(host).map(String::as_str)
  }

  /// Request that would provision another node alongside `host`.
  pub fn reprovision_request(&self, host: &str) -> Result<ComputeRequest, OrchestratorError> {
    let json = self
      .host_request(host)
      .ok_or_else(|| OrchestratorError::not_found(format!("host '{host}' not found")))?;
    Ok(serde_json::from_str(json)?)
  }

  /// Network request that established the `source` to `destination` link.
  pub fn link_request(
    &self,
    source: &str,
    destination: &str,
  ) -> Result<Option<NetworkRequest>, OrchestratorError> {
    self
      .state
      .link_requests
      .get(&format!("{source}+{destination}"))
      .map(|json| serde_json::from_str(json))
      .transpose()
      .map_err(OrchestratorError::from)
  }

  pub fn deferred_len(&self) -> usize {
    self.state.deferred.len()
  }

  pub fn deferred_requests(&self) -> Vec<DeferredRequest> {
    self.state.deferred.pending()
  }

  pub fn status(&self) -> serde_json::Value {
    serde_json::Value::Array(
      self
        .state
        .registry
        .iter()
        .filter_map(|(_, context)| context.status())
        .filter(|status| !is_empty_status(status))
        .collect(),
    )
  }

  /// Tear the workflow down: forget every recorded link, stop every site
  /// context and clear the registry. Later requests fail with `NotFound`.
  ///
  /// Every context is stopped even if an earlier one fails; the first
  /// failure is returned.
  pub async fn stop(&mut self) -> Result<(), OrchestratorError> {
    let state = &mut *self.state;
    state.stopped = true;
    for key in std::mem::take(&mut state.link_requests).into_keys() {
      debug!(workflow_id = %self.workflow_id, link = %key, "forgetting network link");
    }
    state.host_requests.clear();
    state.deferred.clear();

    let mut first_error = None;
    for (site, mut context) in state.registry.drain() {
      match context.stop().await {
        Ok(()) => info!(workflow_id = %self.workflow_id, site = %site, "site context stopped"),
        Err(e) => {
          error!(
            workflow_id = %self.workflow_id,
            site = %site,
            error = %e,
            "failed to stop site context"
          );
          first_error.get_or_insert(OrchestratorError::backend(site, e));
        }
      }
    }

    first_error.map_or(Ok(()), Err)
  }
}

pub(crate) fn is_empty_status(status: &serde_json::Value) -> bool {
  match status {
    serde_json::Value::Null => true,
    serde_json::Value::Object(map) => map.is_empty(),
    serde_json::Value::Array(items) => items.is_empty(),
    _ => false,
  }
}
