use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use meridian_site::WorkflowSnapshot;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use crate::{Error, Store, StoredWorkflow};

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) a database file and run migrations.
  pub async fn open(path: &Path) -> Result<Self, Error> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// A migrated store backed by a private in-memory database.
  pub async fn in_memory() -> Result<Self, Error> {
    // Every connection to `sqlite::memory:` is a separate database.
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn save_workflow(&self, snapshot: &WorkflowSnapshot) -> Result<(), Error> {
    let row = StoredWorkflow::from_snapshot(snapshot, Utc::now());
    debug!(workflow_id = %row.workflow_id, "saving workflow snapshot");

    sqlx::query(
      r#"
            INSERT INTO workflows (workflow_id, node_count, storage_count, stitch_count, sites, host_requests, link_requests, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(workflow_id) DO UPDATE SET
                node_count = excluded.node_count,
                storage_count = excluded.storage_count,
                stitch_count = excluded.stitch_count,
                sites = excluded.sites,
                host_requests = excluded.host_requests,
                link_requests = excluded.link_requests,
                updated_at = excluded.updated_at
            "#,
    )
    .bind(&row.workflow_id)
    .bind(row.node_count)
    .bind(row.storage_count)
    .bind(row.stitch_count)
    .bind(&row.sites)
    .bind(&row.host_requests)
    .bind(&row.link_requests)
    .bind(row.updated_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn load_workflow(&self, workflow_id: &str) -> Result<WorkflowSnapshot, Error> {
    let row: Option<StoredWorkflow> = sqlx::query_as(
      r#"
            SELECT workflow_id, node_count, storage_count, stitch_count, sites, host_requests, link_requests, updated_at
            FROM workflows
            WHERE workflow_id = ?
            "#,
    )
    .bind(workflow_id)
    .fetch_optional(&self.pool)
    .await?;

    row
      .map(StoredWorkflow::into_snapshot)
      .ok_or_else(|| Error::NotFound(format!("workflow {workflow_id}")))
  }

  async fn list_workflows(&self) -> Result<Vec<StoredWorkflow>, Error> {
    let rows = sqlx::query_as(
      r#"
            SELECT workflow_id, node_count, storage_count, stitch_count, sites, host_requests, link_requests, updated_at
            FROM workflows
            ORDER BY updated_at DESC
            "#,
    )
    .fetch_all(&self.pool)
    .await?;

    Ok(rows)
  }

  async fn delete_workflow(&self, workflow_id: &str) -> Result<(), Error> {
    sqlx::query("DELETE FROM workflows WHERE workflow_id = ?")
      .bind(workflow_id)
      .execute(&self.pool)
      .await?;

    Ok(())
  }
}
