//! Converting a workflow to its persisted snapshot and back.

use std::sync::Arc;

use meridian_site::WorkflowSnapshot;
use tracing::{info, warn};

use crate::workflow::{Counters, WorkflowState};
use crate::{Workflow, WorkflowEnv, WorkflowGuard};

impl WorkflowGuard<'_> {
  /// Snapshot of everything needed to reconstruct this workflow. Deferred
  /// requests are not part of it.
  pub fn convert(&self) -> WorkflowSnapshot {
    let state = &*self.state;
    WorkflowSnapshot {
      workflow_id: self.workflow_id.to_string(),
      node_count: state.counters.node_count,
      storage_count: state.counters.storage_count,
      stitch_count: state.counters.stitch_count,
      sites: state
        .registry
        .iter()
        .map(|(_, context)| context.to_record())
        .collect(),
      host_requests: state.host_requests.clone(),
      link_requests: state.link_requests.clone(),
    }
  }
}

impl Workflow {
  /// Rebuild a workflow from a snapshot.
  ///
  /// Each site record gets a fresh context from the factory, which then
  /// restores itself from the record. A record that cannot be restored is
  /// logged and skipped; the rest of the workflow still loads.
  pub async fn restore(snapshot: WorkflowSnapshot, env: Arc<WorkflowEnv>) -> Self {
    let mut state = WorkflowState {
      counters: Counters {
        node_count: snapshot.node_count,
        storage_count: snapshot.storage_count,
        stitch_count: snapshot.stitch_count,
      },
      host_requests: snapshot.host_requests,
      link_requests: snapshot.link_requests,
      ..Default::default()
    };

    for record in &snapshot.sites {
      let mut context = match env.create_context(&record.site, &snapshot.workflow_id) {
        Ok(context) => context,
        Err(e) => {
          warn!(
            workflow_id = %snapshot.workflow_id,
            site = %record.site,
            error = %e,
            "skipping site record"
          );
          continue;
        }
      };
      if context.kind() != record.kind {
        warn!(
          workflow_id = %snapshot.workflow_id,
          site = %record.site,
          expected = %record.kind,
          actual = %context.kind(),
          "skipping site record of unexpected type"
        );
        continue;
      }
      if let Err(e) = context.restore(record).await {
        warn!(
          workflow_id = %snapshot.workflow_id,
          site = %record.site,
          error = %e,
          "failed to restore site context"
        );
        continue;
      }
      if state.registry.insert(record.site.clone(), context).is_err() {
        warn!(
          workflow_id = %snapshot.workflow_id,
          site = %record.site,
          "duplicate site record ignored"
        );
      }
    }

    info!(
      workflow_id = %snapshot.workflow_id,
      sites = state.registry.len(),
      "workflow restored"
    );
    Self::with_state(snapshot.workflow_id, env, state)
  }
}
