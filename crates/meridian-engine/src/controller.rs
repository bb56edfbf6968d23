//! Owner of every live workflow.
//!
//! The controller hands requests to the right [`Workflow`] under its lock
//! and persists the workflow's snapshot after every mutation that changed
//! (or may have changed) its state.

use std::collections::HashMap;
use std::sync::Arc;

use meridian_config::{
  ComputeRequest, NetworkRequest, ScriptRequest, SdxPrefix, StitchRequest, StorageRequest,
};
use meridian_store::Store;
use meridian_workflow::{
  ComputeResponse, Outcome, ReconcileReport, Workflow, WorkflowEnv, WorkflowGuard,
};
use tokio::sync::RwLock;
use tracing::{error, info, instrument};

use crate::ControllerError;

pub struct Controller {
  env: Arc<WorkflowEnv>,
  store: Arc<dyn Store>,
  workflows: RwLock<HashMap<String, Arc<Workflow>>>,
}

impl Controller {
  pub fn new(env: Arc<WorkflowEnv>, store: Arc<dyn Store>) -> Self {
    Self {
      env,
      store,
      workflows: RwLock::new(HashMap::new()),
    }
  }

  /// Restore every persisted workflow. Returns how many were loaded.
  pub async fn recover(&self) -> Result<usize, ControllerError> {
    let stored = self.store.list_workflows().await?;
    let mut workflows = self.workflows.write().await;

    for record in stored {
      let snapshot = record.into_snapshot();
      let workflow = Workflow::restore(snapshot, Arc::clone(&self.env)).await;
      workflows.insert(workflow.id().to_string(), Arc::new(workflow));
    }

    info!(workflows = workflows.len(), "workflows recovered");
    Ok(workflows.len())
  }

  /// Create an empty workflow under a fresh id.
  pub async fn create_workflow(&self) -> Result<String, ControllerError> {
    let workflow_id = uuid::Uuid::new_v4().to_string();
    let workflow = Arc::new(Workflow::new(workflow_id.clone(), Arc::clone(&self.env)));

    self.persist(&workflow.lock().await).await?;
    self
      .workflows
      .write()
      .await
      .insert(workflow_id.clone(), workflow);

    info!(workflow_id = %workflow_id, "workflow created");
    Ok(workflow_id)
  }

  pub async fn workflow(&self, workflow_id: &str) -> Result<Arc<Workflow>, ControllerError> {
    self
      .workflows
      .read()
      .await
      .get(workflow_id)
      .cloned()
      .ok_or_else(|| ControllerError::WorkflowNotFound(workflow_id.to_string()))
  }

  /// Ids of every live workflow, sorted.
  pub async fn list(&self) -> Vec<String> {
    let mut ids: Vec<String> = self.workflows.read().await.keys().cloned().collect();
    ids.sort();
    ids
  }

  pub async fn status(&self, workflow_id: &str) -> Result<serde_json::Value, ControllerError> {
    Ok(self.workflow(workflow_id).await?.status().await)
  }

  /// Stop a workflow and forget it.
  ///
  /// The snapshot is removed even when stopping one of the sites fails;
  /// that failure is still reported.
  #[instrument(skip(self))]
  pub async fn delete_workflow(&self, workflow_id: &str) -> Result<(), ControllerError> {
    let workflow = self
      .workflows
      .write()
      .await
      .remove(workflow_id)
      .ok_or_else(|| ControllerError::WorkflowNotFound(workflow_id.to_string()))?;

    // Requests that fetched the workflow before its removal see it stopped
    // once they get the lock, and neither process nor persist anything.
    let mut guard = workflow.lock().await;
    let stopped = guard.stop().await;
    self.store.delete_workflow(workflow_id).await?;
    drop(guard);
    stopped?;

    info!("workflow deleted");
    Ok(())
  }

  pub async fn compute(
    &self,
    workflow_id: &str,
    request: &ComputeRequest,
  ) -> Result<Outcome<ComputeResponse>, ControllerError> {
    let workflow = self.workflow(workflow_id).await?;
    let mut guard = workflow.lock().await;
    let outcome = guard.process_compute(request, false).await?;
    self.persist(&guard).await?;
    Ok(outcome)
  }

  pub async fn storage(
    &self,
    workflow_id: &str,
    request: &StorageRequest,
  ) -> Result<Outcome<u32>, ControllerError> {
    let workflow = self.workflow(workflow_id).await?;
    let mut guard = workflow.lock().await;
    let outcome = guard.process_storage(request, false).await?;
    self.persist(&guard).await?;
    Ok(outcome)
  }

  pub async fn stitch(
    &self,
    workflow_id: &str,
    request: &StitchRequest,
  ) -> Result<Outcome<u32>, ControllerError> {
    let workflow = self.workflow(workflow_id).await?;
    let mut guard = workflow.lock().await;
    let outcome = guard.process_stitch(request, false).await?;
    self.persist(&guard).await?;
    Ok(outcome)
  }

  pub async fn network(
    &self,
    workflow_id: &str,
    request: &NetworkRequest,
  ) -> Result<(), ControllerError> {
    let workflow = self.workflow(workflow_id).await?;
    let mut guard = workflow.lock().await;
    guard.process_network(request, false).await?;
    self.persist(&guard).await
  }

  pub async fn script(
    &self,
    workflow_id: &str,
    request: &ScriptRequest,
  ) -> Result<(), ControllerError> {
    let workflow = self.workflow(workflow_id).await?;
    let mut guard = workflow.lock().await;
    guard.process_script(request, false).await?;
    self.persist(&guard).await
  }

  pub async fn sdx_prefix(
    &self,
    workflow_id: &str,
    prefix: &SdxPrefix,
  ) -> Result<(), ControllerError> {
    let workflow = self.workflow(workflow_id).await?;
    let mut guard = workflow.lock().await;
    guard.process_sdx_prefix(prefix).await?;
    self.persist(&guard).await
  }

  /// Request that would add another node next to `host`.
  pub async fn reprovision_request(
    &self,
    workflow_id: &str,
    host: &str,
  ) -> Result<ComputeRequest, ControllerError> {
    let workflow = self.workflow(workflow_id).await?;
    let guard = workflow.lock().await;
    Ok(guard.reprovision_request(host)?)
  }

  /// Run one reconciliation tick on every workflow, persisting each.
  ///
  /// A workflow whose snapshot cannot be saved is logged; the others are
  /// still reconciled.
  pub async fn reconcile_all(&self) -> HashMap<String, ReconcileReport> {
    let workflows: Vec<Arc<Workflow>> = self.workflows.read().await.values().cloned().collect();
    let mut reports = HashMap::with_capacity(workflows.len());

    for workflow in workflows {
      let mut guard = workflow.lock().await;
      if guard.is_stopped() {
        continue;
      }
      let report = guard.reconcile().await;
      if let Err(e) = self.persist(&guard).await {
        error!(
          workflow_id = %workflow.id(),
          error = %e,
          "failed to persist reconciled workflow"
        );
      }
      drop(guard);
      reports.insert(workflow.id().to_string(), report);
    }

    reports
  }

  /// Save the workflow's snapshot. A stopped workflow has been deleted and
  /// is never written back.
  async fn persist(&self, guard: &WorkflowGuard<'_>) -> Result<(), ControllerError> {
    if guard.is_stopped() {
      return Ok(());
    }
    self.store.save_workflow(&guard.convert()).await?;
    Ok(())
  }
}
