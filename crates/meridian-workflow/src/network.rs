//! Establishing and forgetting links between hosts that may live on
//! different sites.
//!
//! Each endpoint is stitched to the exchange at most once, however many
//! links it takes part in. Routes are only installed on the source side;
//! the exchange advertises reachability in both directions. A DELETE only
//! forgets the recorded link: stitches and routes are removed by the site
//! contexts themselves when they are stopped.

use std::collections::BTreeMap;

use meridian_config::{NetworkAction, NetworkRequest};
use meridian_site::{LinkRoute, SiteContext, StitchSetup};
use tracing::{debug, info, instrument};

use crate::{OrchestratorError, WorkflowGuard};

impl WorkflowGuard<'_> {
  #[instrument(
    skip(self, request),
    fields(
      workflow_id = %self.workflow_id,
      source = %request.source,
      destination = %request.destination,
    )
  )]
  pub async fn process_network(
    &mut self,
    request: &NetworkRequest,
    is_deferred: bool,
  ) -> Result<(), OrchestratorError> {
    debug!(action = ?request.action, is_deferred, "processing network request");
    self.ensure_running()?;
    let state = &mut *self.state;

    if state.registry.is_empty() {
      return Err(OrchestratorError::not_found("workflow has no site contexts"));
    }
    if request.source.eq_ignore_ascii_case(&request.destination) {
      return Err(OrchestratorError::bad_request(
        "source and destination nodes must be different",
      ));
    }
    if request.source.contains('+') || request.destination.contains('+') {
      return Err(OrchestratorError::bad_request(
        "source and destination nodes must not contain '+'",
      ));
    }
    if request.action == NetworkAction::Add
      && (request
        .source_subnet
        .eq_ignore_ascii_case(&request.destination_subnet)
        || request.source_ip.eq_ignore_ascii_case(&request.destination_ip))
    {
      return Err(OrchestratorError::bad_request(
        "source and destination subnet/ip must be different",
      ));
    }

    let source_site = state.registry.site_of_host(&request.source).ok_or_else(|| {
      OrchestratorError::not_found(format!("source '{}' not found", request.source))
    })?;
    let destination_site = state
      .registry
      .site_of_host(&request.destination)
      .ok_or_else(|| {
        OrchestratorError::not_found(format!("destination '{}' not found", request.destination))
      })?;

    let key = request.link_key();
    if request.action == NetworkAction::Delete {
      if state.link_requests.remove(&key).is_some() {
        info!(link = %key, "network link forgotten");
      } else {
        debug!(link = %key, "no network link recorded");
      }
      return Ok(());
    }

    let plan = StitchPlan::new(
      request,
      &source_site,
      local_network(state.registry.get(&source_site)),
      &destination_site,
      local_network(state.registry.get(&destination_site)),
    )?;
    let record = serde_json::to_string(request)?;

    if !endpoint_connected(&state.link_requests, &request.source) {
      let setup = StitchSetup {
        host: request.source.clone(),
        ip: request.source_ip.clone(),
        subnet: request.source_subnet.clone(),
        local_subnet: request.source_local_subnet.clone(),
        peer: plan.source_peer.clone(),
        controller: plan.controller.clone(),
      };
      let context = state
        .registry
        .get_mut(&source_site)
        .ok_or_else(|| OrchestratorError::not_found(format!("site '{source_site}' not found")))?;
      context
        .setup_stitching_and_route(&setup)
        .await
        .map_err(|e| OrchestratorError::backend(&source_site, e))?;
      info!(host = %request.source, peer = %setup.peer, "endpoint stitched");
    }

    if !endpoint_connected(&state.link_requests, &request.destination) {
      let setup = StitchSetup {
        host: request.destination.clone(),
        ip: request.destination_ip.clone(),
        subnet: request.destination_subnet.clone(),
        local_subnet: request.dest_local_subnet.clone(),
        peer: plan.destination_peer.clone(),
        controller: plan.controller.clone(),
      };
      let context = state
        .registry
        .get_mut(&destination_site)
        .ok_or_else(|| {
          OrchestratorError::not_found(format!("site '{destination_site}' not found"))
        })?;
      context
        .setup_stitching_and_route(&setup)
        .await
        .map_err(|e| OrchestratorError::backend(&destination_site, e))?;
      info!(host = %request.destination, peer = %setup.peer, "endpoint stitched");
    }

    let context = state
      .registry
      .get_mut(&source_site)
      .ok_or_else(|| OrchestratorError::not_found(format!("site '{source_site}' not found")))?;
    for route in link_routes(request, &plan) {
      context
        .install_link(&route)
        .await
        .map_err(|e| OrchestratorError::backend(&source_site, e))?;
    }

    state.link_requests.insert(key.clone(), record);
    info!(link = %key, "network link recorded");
    Ok(())
  }
}

/// Identifiers each side uses for its peer, and the exchange controller to
/// go through.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StitchPlan {
  source_peer: String,
  destination_peer: String,
  controller: Option<String>,
}

impl StitchPlan {
  /// A site behind a site-local network addresses its peer by the peer
  /// site's short name, and needs the exchange controller address.
  fn new(
    request: &NetworkRequest,
    source_site: &str,
    source_local: bool,
    destination_site: &str,
    destination_local: bool,
  ) -> Result<Self, OrchestratorError> {
    let mut plan = Self {
      source_peer: request.destination.clone(),
      destination_peer: request.source.clone(),
      controller: None,
    };
    if source_local {
      plan.source_peer = short_name(destination_site).to_string();
    }
    if destination_local {
      plan.destination_peer = short_name(source_site).to_string();
    }
    if source_local || destination_local {
      let controller = request.sdx_controller_ip.clone().ok_or_else(|| {
        OrchestratorError::bad_request(
          "an exchange controller address is required to link a site-local network",
        )
      })?;
      plan.controller = Some(controller);
    }
    Ok(plan)
  }
}

fn local_network(context: Option<&dyn SiteContext>) -> bool {
  context.is_some_and(|c| c.requires_local_endpoint_substitution())
}

/// The part of a site key after its last `:` (`Chameleon:CHI@UC` is
/// `CHI@UC`).
fn short_name(site: &str) -> &str {
  site.rsplit(':').next().unwrap_or(site)
}

/// True when `host` is either side of an already recorded link.
fn endpoint_connected(links: &BTreeMap<String, String>, host: &str) -> bool {
  links.keys().any(|key| key.split('+').any(|side| side == host))
}

/// Routes installed on the source: primary to primary, plus one for each
/// local subnet that is present.
fn link_routes(request: &NetworkRequest, plan: &StitchPlan) -> Vec<LinkRoute> {
  let route = |from: &str, to: &str| LinkRoute {
    host: request.source.clone(),
    from_subnet: from.to_string(),
    to_subnet: to.to_string(),
    link_speed: request.link_speed.clone(),
    peer_ip: request.destination_ip.clone(),
    controller: plan.controller.clone(),
  };

  let mut routes = vec![route(&request.source_subnet, &request.destination_subnet)];
  if let Some(local) = &request.source_local_subnet {
    routes.push(route(local, &request.destination_subnet));
  }
  if let Some(local) = &request.dest_local_subnet {
    routes.push(route(&request.source_subnet, local));
  }
  routes
}
