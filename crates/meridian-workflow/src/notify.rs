//! Outbound collaborators: the notification sink that receives aggregate
//! status, and the metadata sink that delivers scripts to hosts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Aggregate status published for a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  pub workflow_id: String,
  pub payload: serde_json::Value,
}

/// Receives status notifications produced during reconciliation.
///
/// Delivery is best-effort: when the sink reports itself disconnected the
/// notification is logged and dropped.
pub trait NotificationSink: Send + Sync {
  fn is_connected(&self) -> bool;

  fn push(&self, workflow_id: &str, payload: &serde_json::Value);
}

/// A sink that is never connected.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
  fn is_connected(&self) -> bool {
    false
  }

  fn push(&self, _workflow_id: &str, _payload: &serde_json::Value) {}
}

/// A sink that forwards notifications to an unbounded channel. It stays
/// connected for as long as the receiver is alive.
#[derive(Debug, Clone)]
pub struct ChannelSink {
  sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
  pub fn new(sender: mpsc::UnboundedSender<Notification>) -> Self {
    Self { sender }
  }
}

impl NotificationSink for ChannelSink {
  fn is_connected(&self) -> bool {
    !self.sender.is_closed()
  }

  fn push(&self, workflow_id: &str, payload: &serde_json::Value) {
    // Receiver may have been dropped since is_connected was checked.
    let _ = self.sender.send(Notification {
      workflow_id: workflow_id.to_string(),
      payload: payload.clone(),
    });
  }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct SinkError {
  pub message: String,
}

impl SinkError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Delivers named scripts to hosts through the metadata service.
#[async_trait]
pub trait MetadataSink: Send + Sync {
  async fn create_script_entry(
    &self,
    workflow_id: &str,
    host: &str,
    name: &str,
    script: &str,
  ) -> Result<(), SinkError>;
}
