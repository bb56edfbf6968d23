//! Routing of compute, storage, stitch, script and prefix requests to the
//! site context that should handle them.

use meridian_config::{ComputeRequest, ScriptRequest, SdxPrefix, StitchRequest, StorageRequest};
use meridian_site::{ComputeCounters, ComputeResponse, Outcome, PeerStitch, SiteContext};
use tracing::{debug, info, instrument, warn};

use crate::deferred::DeferredRequest;
use crate::{OrchestratorError, SiteRegistry, WorkflowEnv, WorkflowGuard};

impl WorkflowGuard<'_> {
  /// Provision compute on the site named by the request, or inside the
  /// existing allocation it names.
  ///
  /// A site seen for the first time gets a new context, which is only
  /// registered once the whole attempt succeeds; on failure it is stopped
  /// and discarded. Counters and the host map change only on success.
  #[instrument(skip(self, request), fields(workflow_id = %self.workflow_id, site = %request.site))]
  pub async fn process_compute(
    &mut self,
    request: &ComputeRequest,
    is_deferred: bool,
  ) -> Result<Outcome<ComputeResponse>, OrchestratorError> {
    debug!(is_deferred, "processing compute request");
    self.ensure_running()?;

    let env = self.env;
    let workflow_id = self.workflow_id;
    let state = &mut *self.state;

    let site = if request.targets_existing_slice() {
      let slice = request.slice_name.as_deref().ok_or_else(|| {
        OrchestratorError::bad_request("slice name must be given for the existing slice policy")
      })?;
      state
        .registry
        .site_of_slice(slice)
        .ok_or_else(|| OrchestratorError::not_found(format!("slice '{slice}' not found")))?
    } else {
      request.site.clone()
    };

    let mut fresh = if state.registry.contains(&site) {
      None
    } else {
      Some(env.create_context(&site, workflow_id)?)
    };

    let counters = ComputeCounters {
      node_count: state.counters.node_count,
      stitch_count: state.counters.stitch_count,
    };
    let context: &mut dyn SiteContext = match fresh.as_mut() {
      Some(context) => &mut **context,
      None => state
        .registry
        .get_mut(&site)
        .ok_or_else(|| OrchestratorError::not_found(format!("site '{site}' not found")))?,
    };

    let result = context.process_compute(request, counters, is_deferred).await;
    let vlan_id = if request.wants_stitch() {
      context.network_vlan_id()
    } else {
      None
    };

    let response = match result {
      Ok(Outcome::Completed(response)) => response,
      Ok(Outcome::Deferred) => {
        info!("compute request deferred");
        if let Some(mut context) = fresh {
          discard(&site, context.as_mut()).await;
        }
        state
          .deferred
          .push(DeferredRequest::Compute(request.clone()));
        return Ok(Outcome::Deferred);
      }
      Err(e) => {
        if let Some(mut context) = fresh {
          discard(&site, context.as_mut()).await;
        }
        return Err(OrchestratorError::backend(site, e));
      }
    };

    let host_entries = match host_entries(request, &response) {
      Ok(entries) => entries,
      Err(e) => {
        if let Some(mut context) = fresh {
          discard(&site, context.as_mut()).await;
        }
        return Err(e);
      }
    };

    let mut stitch_count = response.stitch_count;
    let mut companion = None;
    if let Some(vlan_id) = vlan_id {
      if site == env.connecting_site() {
        debug!("site is the connecting site; no companion stitch needed");
      } else {
        match companion_stitch(
          env,
          workflow_id,
          &mut state.registry,
          &site,
          request,
          vlan_id,
          stitch_count,
        )
        .await
        {
          Ok((count, context)) => {
            stitch_count = count;
            companion = context;
          }
          Err(e) => {
            if let Some(mut context) = fresh {
              discard(&site, context.as_mut()).await;
            }
            return Err(e);
          }
        }
      }
    }

    // Commit.
    state.counters.node_count = state.counters.node_count.max(response.node_count);
    state.counters.stitch_count = state.counters.stitch_count.max(stitch_count);
    if let Some(context) = fresh {
      info!("registering new site context");
      let _ = state.registry.insert(site.clone(), context);
    }
    if let Some(context) = companion {
      info!(connecting_site = %env.connecting_site(), "registering connecting site context");
      let _ = state
        .registry
        .insert(env.connecting_site().to_string(), context);
    }
    state.host_requests.extend(host_entries);

    info!(
      node_count = state.counters.node_count,
      hosts = response.host_names.len(),
      "compute request completed"
    );
    Ok(Outcome::Completed(ComputeResponse {
      node_count: state.counters.node_count,
      stitch_count: state.counters.stitch_count,
      host_names: response.host_names,
    }))
  }

  /// Attach storage to the host named by `request.target`.
  #[instrument(skip(self, request), fields(workflow_id = %self.workflow_id, target = %request.target))]
  pub async fn process_storage(
    &mut self,
    request: &StorageRequest,
    is_deferred: bool,
  ) -> Result<Outcome<u32>, OrchestratorError> {
    debug!(is_deferred, "processing storage request");
    self.ensure_running()?;
    let state = &mut *self.state;
    let context = state.registry.context_for_host(&request.target)?;

    match context
      .process_storage(request, state.counters.storage_count, is_deferred)
      .await
    {
      Ok(Outcome::Completed(count)) => {
        state.counters.storage_count = state.counters.storage_count.max(count);
        Ok(Outcome::Completed(state.counters.storage_count))
      }
      Ok(Outcome::Deferred) => {
        info!("storage request deferred");
        state
          .deferred
          .push(DeferredRequest::Storage(request.clone()));
        Ok(Outcome::Deferred)
      }
      Err(e) => Err(OrchestratorError::backend(context.site(), e)),
    }
  }

  /// Stitch the host named by `request.target` to an external port.
  #[instrument(skip(self, request), fields(workflow_id = %self.workflow_id, target = %request.target))]
  pub async fn process_stitch(
    &mut self,
    request: &StitchRequest,
    is_deferred: bool,
  ) -> Result<Outcome<u32>, OrchestratorError> {
    debug!(is_deferred, "processing stitch request");
    self.ensure_running()?;
    let state = &mut *self.state;
    let context = state.registry.context_for_host(&request.target)?;

    match context
      .process_stitch(request, state.counters.stitch_count, is_deferred)
      .await
    {
      Ok(Outcome::Completed(count)) => {
        state.counters.stitch_count = state.counters.stitch_count.max(count);
        Ok(Outcome::Completed(state.counters.stitch_count))
      }
      Ok(Outcome::Deferred) => {
        info!("stitch request deferred");
        state.deferred.push(DeferredRequest::Stitch(request.clone()));
        Ok(Outcome::Deferred)
      }
      Err(e) => Err(OrchestratorError::backend(context.site(), e)),
    }
  }

  /// Push a script to the host named by `request.target` through the
  /// metadata sink. Scripts are never deferred.
  #[instrument(skip(self, request), fields(workflow_id = %self.workflow_id, target = %request.target))]
  pub async fn process_script(
    &mut self,
    request: &ScriptRequest,
    is_deferred: bool,
  ) -> Result<(), OrchestratorError> {
    debug!(is_deferred, name = %request.name, "processing script request");
    self.ensure_running()?;
    let context = self.state.registry.context_for_host(&request.target)?;
    let host = context.metadata_host_name(&request.target);

    let Some(sink) = self.env.metadata() else {
      debug!(host = %host, "no metadata sink configured, skipping script delivery");
      return Ok(());
    };

    sink
      .create_script_entry(self.workflow_id, &host, &request.name, &request.script)
      .await
      .map_err(|source| OrchestratorError::Metadata {
        host: host.clone(),
        source,
      })?;
    info!(host = %host, name = %request.name, "script delivered");
    Ok(())
  }

  /// Advertise a prefix through the exchange for the site owning
  /// `prefix.source`.
  #[instrument(skip(self, prefix), fields(workflow_id = %self.workflow_id, source = %prefix.source))]
  pub async fn process_sdx_prefix(&mut self, prefix: &SdxPrefix) -> Result<(), OrchestratorError> {
    debug!("processing sdx prefix");
    self.ensure_running()?;
    let context = self.state.registry.context_for_host(&prefix.source)?;

    context
      .process_sdx_prefix(prefix)
      .await
      .map_err(|e| OrchestratorError::backend(context.site(), e))
  }
}

/// Serialized reprovisioning template for every host in `response`.
fn host_entries(
  request: &ComputeRequest,
  response: &ComputeResponse,
) -> Result<Vec<(String, String)>, OrchestratorError> {
  response
    .host_names
    .iter()
    .map(|(host, slice)| -> Result<(String, String), OrchestratorError> {
      let template = request.reprovision_in(slice.as_deref());
      Ok((host.clone(), serde_json::to_string(&template)?))
    })
    .collect()
}

/// Bridge the connecting site into `owner`'s VLAN.
///
/// Returns the updated stitch counter and, when the connecting site had no
/// context yet, the context created for it (to be registered by the caller
/// once the whole compute attempt commits).
async fn companion_stitch(
  env: &WorkflowEnv,
  workflow_id: &str,
  registry: &mut SiteRegistry,
  owner: &str,
  request: &ComputeRequest,
  vlan_id: String,
  stitch_count: u32,
) -> Result<(u32, Option<Box<dyn SiteContext>>), OrchestratorError> {
  let (Some(port_url), Some(tag)) = (&request.stitch_port_url, &request.stitch_tag) else {
    return Ok((stitch_count, None));
  };
  let destination_url = env.stitch_port(owner).ok_or_else(|| {
    OrchestratorError::bad_request(format!("no stitch port configured for site '{owner}'"))
  })?;
  let peer = PeerStitch {
    tag: tag.clone(),
    port_url: port_url.clone(),
    bandwidth: request.stitch_bandwidth.clone(),
    vlan_id,
    destination_url,
  };

  let connecting = env.connecting_site();
  let mut fresh = if registry.contains(connecting) {
    None
  } else {
    Some(env.create_context(connecting, workflow_id)?)
  };
  let context: &mut dyn SiteContext = match fresh.as_mut() {
    Some(context) => &mut **context,
    None => registry
      .get_mut(connecting)
      .ok_or_else(|| OrchestratorError::not_found(format!("site '{connecting}' not found")))?,
  };

  match context.stitch_to_network(&peer, stitch_count).await {
    Ok(count) => {
      info!(connecting_site = %connecting, vlan_id = %peer.vlan_id, "companion stitch established");
      Ok((count, fresh))
    }
    Err(e) => {
      if let Some(mut context) = fresh {
        discard(connecting, context.as_mut()).await;
      }
      Err(OrchestratorError::backend(connecting, e))
    }
  }
}

/// Stop a context that never got registered.
async fn discard(site: &str, context: &mut dyn SiteContext) {
  info!(site = %site, "rolling back new site context");
  if let Err(e) = context.stop().await {
    warn!(site = %site, error = %e, "failed to stop rolled back site context");
  }
}
