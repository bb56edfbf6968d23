use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use meridian_site::WorkflowSnapshot;
use tokio::sync::RwLock;

use crate::{Error, Store, StoredWorkflow};

/// Process-local store, for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
  workflows: RwLock<HashMap<String, StoredWorkflow>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn save_workflow(&self, snapshot: &WorkflowSnapshot) -> Result<(), Error> {
    let row = StoredWorkflow::from_snapshot(snapshot, Utc::now());
    self
      .workflows
      .write()
      .await
      .insert(row.workflow_id.clone(), row);
    Ok(())
  }

  async fn load_workflow(&self, workflow_id: &str) -> Result<WorkflowSnapshot, Error> {
    self
      .workflows
      .read()
      .await
      .get(workflow_id)
      .cloned()
      .map(StoredWorkflow::into_snapshot)
      .ok_or_else(|| Error::NotFound(format!("workflow {workflow_id}")))
  }

  async fn list_workflows(&self) -> Result<Vec<StoredWorkflow>, Error> {
    let mut rows: Vec<_> = self.workflows.read().await.values().cloned().collect();
    rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(rows)
  }

  async fn delete_workflow(&self, workflow_id: &str) -> Result<(), Error> {
    self.workflows.write().await.remove(workflow_id);
    Ok(())
  }
}
