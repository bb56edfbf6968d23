use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Persisted form of one site context.
///
/// `kind`, `site` and `slices` are common to every backend; anything else a
/// backend needs to rebuild itself travels in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
  #[serde(rename = "type")]
  pub kind: String,
  pub site: String,
  #[serde(default)]
  pub slices: Vec<String>,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SiteRecord {
  pub fn new(kind: impl Into<String>, site: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      site: site.into(),
      slices: Vec::new(),
      extra: serde_json::Map::new(),
    }
  }
}

/// Everything needed to reconstruct a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
  pub workflow_id: String,
  pub node_count: u32,
  pub storage_count: u32,
  pub stitch_count: u32,
  #[serde(default)]
  pub sites: Vec<SiteRecord>,
  /// Host name to the serialized compute request that produced it.
  #[serde(default)]
  pub host_requests: BTreeMap<String, String>,
  /// Link key (`source+destination`) to the serialized network request.
  #[serde(default)]
  pub link_requests: BTreeMap<String, String>,
}

impl WorkflowSnapshot {
  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }

  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record_flattens_backend_fields() {
    let mut record = SiteRecord::new("Chameleon", "Chameleon:CHI@UC");
    record.slices.push("slice-1".into());
    record
      .extra
      .insert("network_id".into(), serde_json::json!("net-42"));

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["type"], "Chameleon");
    assert_eq!(json["network_id"], "net-42");

    let back: SiteRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
  }

  #[test]
  fn test_snapshot_tolerates_missing_maps() {
    let snapshot = WorkflowSnapshot::from_json(
      r#"{"workflow_id": "wf", "node_count": 2, "storage_count": 0, "stitch_count": 1}"#,
    )
    .unwrap();

    assert_eq!(snapshot.node_count, 2);
    assert!(snapshot.sites.is_empty());
    assert!(snapshot.link_requests.is_empty());
  }
}
