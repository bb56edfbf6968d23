use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use meridian_site::{SiteRecord, WorkflowSnapshot};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// A workflow snapshot as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StoredWorkflow {
  pub workflow_id: String,
  pub node_count: u32,
  pub storage_count: u32,
  pub stitch_count: u32,
  pub sites: Json<Vec<SiteRecord>>,
  pub host_requests: Json<BTreeMap<String, String>>,
  pub link_requests: Json<BTreeMap<String, String>>,
  pub updated_at: DateTime<Utc>,
}

impl StoredWorkflow {
  pub fn from_snapshot(snapshot: &WorkflowSnapshot, updated_at: DateTime<Utc>) -> Self {
    Self {
      workflow_id: snapshot.workflow_id.clone(),
      node_count: snapshot.node_count,
      storage_count: snapshot.storage_count,
      stitch_count: snapshot.stitch_count,
      sites: Json(snapshot.sites.clone()),
      host_requests: Json(snapshot.host_requests.clone()),
      link_requests: Json(snapshot.link_requests.clone()),
      updated_at,
    }
  }

  pub fn into_snapshot(self) -> WorkflowSnapshot {
    WorkflowSnapshot {
      workflow_id: self.workflow_id,
      node_count: self.node_count,
      storage_count: self.storage_count,
      stitch_count: self.stitch_count,
      sites: self.sites.0,
      host_requests: self.host_requests.0,
      link_requests: self.link_requests.0,
    }
  }
}
