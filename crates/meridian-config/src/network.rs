use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkAction {
  Add,
  Delete,
}

/// Request to link (or unlink) two hosts, possibly living on different sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequest {
  pub action: NetworkAction,
  pub source: String,
  pub source_ip: String,
  pub source_subnet: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_local_subnet: Option<String>,
  pub destination: String,
  pub destination_ip: String,
  pub destination_subnet: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dest_local_subnet: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub link_speed: Option<String>,
  /// Address of the exchange controller, required when either side sits
  /// behind a site-local network.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sdx_controller_ip: Option<String>,
}

impl NetworkRequest {
  /// Key under which the link between `source` and `destination` is recorded.
  pub fn link_key(&self) -> String {
    format!("{}+{}", self.source, self.destination)
  }
}

/// Prefix advertisement pushed through the exchange on behalf of a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdxPrefix {
  pub source: String,
  pub gateway_ip: String,
  pub source_subnet: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dest_subnet: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bandwidth: Option<String>,
}
