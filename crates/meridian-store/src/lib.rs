//! Meridian Store
//!
//! This crate provides the storage trait and implementations for workflow
//! snapshots. A snapshot is everything needed to reconstruct a workflow
//! after a restart: its counters, the persisted record of every site
//! context, and the host and link request maps.
//!
//! The [`Store`] trait defines operations for:
//! - Saving (inserting or replacing) a workflow snapshot
//! - Loading one snapshot or listing all of them
//! - Deleting a workflow once it has been stopped

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::StoredWorkflow;

use async_trait::async_trait;
use meridian_site::WorkflowSnapshot;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage trait for workflow snapshots.
#[async_trait]
pub trait Store: Send + Sync {
  /// Insert or replace the snapshot for `snapshot.workflow_id`.
  async fn save_workflow(&self, snapshot: &WorkflowSnapshot) -> Result<(), Error>;

  /// Get a workflow snapshot by ID.
  async fn load_workflow(&self, workflow_id: &str) -> Result<WorkflowSnapshot, Error>;

  /// List every stored workflow, most recently updated first.
  async fn list_workflows(&self) -> Result<Vec<StoredWorkflow>, Error>;

  /// Delete a workflow. Deleting an unknown ID is not an error.
  async fn delete_workflow(&self, workflow_id: &str) -> Result<(), Error>;
}
