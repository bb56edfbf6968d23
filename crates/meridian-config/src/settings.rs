use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
  #[error("failed to parse settings: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("invalid settings: {message}")]
  Invalid { message: String },
}

/// Bounded retry policy for tearing down a site's network components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeardownSettings {
  #[serde(default = "default_max_rounds")]
  pub max_rounds: u32,
  #[serde(default = "default_delay_ms")]
  pub delay_ms: u64,
}

fn default_max_rounds() -> u32 {
  5
}

fn default_delay_ms() -> u64 {
  1000
}

impl Default for TeardownSettings {
  fn default() -> Self {
    Self {
      max_rounds: default_max_rounds(),
      delay_ms: default_delay_ms(),
    }
  }
}

impl TeardownSettings {
  pub fn delay(&self) -> Duration {
    Duration::from_millis(self.delay_ms)
  }
}

/// Values the orchestrator is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
  /// Site key of the backend used as the connecting layer for companion
  /// stitches.
  #[serde(default = "default_connecting_site")]
  pub connecting_site: String,

  /// Destination stitch-port URL per region.
  #[serde(default)]
  pub stitch_ports: HashMap<String, String>,

  /// Used when a site's region has no entry in `stitch_ports`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_stitch_port: Option<String>,

  #[serde(default)]
  pub teardown: TeardownSettings,

  #[serde(default = "default_reconcile_interval_secs")]
  pub reconcile_interval_secs: u64,
}

fn default_connecting_site() -> String {
  "Exogeni".to_string()
}

fn default_reconcile_interval_secs() -> u64 {
  60
}

impl Default for OrchestratorSettings {
  fn default() -> Self {
    Self {
      connecting_site: default_connecting_site(),
      stitch_ports: HashMap::new(),
      default_stitch_port: None,
      teardown: TeardownSettings::default(),
      reconcile_interval_secs: default_reconcile_interval_secs(),
    }
  }
}

impl OrchestratorSettings {
  /// Parse and validate a JSON settings document.
  pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
    let settings: Self = serde_json::from_str(json)?;
    settings.validate()?;
    Ok(settings)
  }

  pub fn validate(&self) -> Result<(), SettingsError> {
    if self.connecting_site.trim().is_empty() {
      return Err(SettingsError::Invalid {
        message: "connecting_site must not be empty".to_string(),
      });
    }
    if self.teardown.max_rounds == 0 {
      return Err(SettingsError::Invalid {
        message: "teardown.max_rounds must be at least 1".to_string(),
      });
    }
    if self.reconcile_interval_secs == 0 {
      return Err(SettingsError::Invalid {
        message: "reconcile_interval_secs must be at least 1".to_string(),
      });
    }
    Ok(())
  }

  pub fn reconcile_interval(&self) -> Duration {
    Duration::from_secs(self.reconcile_interval_secs)
  }

  /// Destination stitch port for a site key.
  ///
  /// The region is the part of the key after the last `@`, or after the
  /// last `:` when there is no `@` (`Chameleon:CHI@UC` is in region `UC`).
  pub fn stitch_port_for(&self, site: &str) -> Option<&str> {
    self
      .stitch_ports
      .get(region_of(site))
      .or(self.default_stitch_port.as_ref())
      .map(String::as_str)
  }
}

fn region_of(site: &str) -> &str {
  match site.rfind('@') {
    Some(at) => &site[at + 1..],
    None => site.rsplit(':').next().unwrap_or(site),
  }
}
