use serde::{Deserialize, Serialize};

/// Request to attach a storage volume to a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRequest {
  pub target: String,
  pub size: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mount_point: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub action: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lease_start: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lease_end: Option<String>,
}

/// Request to stitch a host's network to an external port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchRequest {
  pub target: String,
  pub port: String,
  pub tag: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bandwidth: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stitch_ip: Option<String>,
}

/// A named script pushed to a host through the metadata channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRequest {
  pub target: String,
  pub name: String,
  pub script: String,
}
