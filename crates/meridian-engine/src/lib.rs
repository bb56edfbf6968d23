//! Meridian Engine
//!
//! This crate provides the [`Controller`], which owns every live workflow
//! and keeps the snapshot store in step with them, and the
//! [`ReconcileRunner`] that drives periodic reconciliation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ReconcileRunner                         │
//! │  - start(cancel) ticks every reconcile interval             │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Controller                            │
//! │  - create / list / status / delete workflows                │
//! │  - request entry points, persist after each mutation        │
//! │  - recover() restores persisted workflows at start-up       │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                 ┌─────────────┴─────────────┐
//!                 ▼                           ▼
//! ┌───────────────────────────┐ ┌───────────────────────────────┐
//! │        Workflow           │ │            Store              │
//! │  (meridian-workflow)      │ │  (meridian-store snapshots)   │
//! └───────────────────────────┘ └───────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let env = Arc::new(WorkflowEnv::from_settings(factory, &settings));
//! let store = Arc::new(SqliteStore::open(&path).await?);
//! let controller = Arc::new(Controller::new(env, store));
//! controller.recover().await?;
//!
//! let cancel = CancellationToken::new();
//! let runner = ReconcileRunner::new(controller.clone(), settings.reconcile_interval());
//! tokio::spawn(runner.start(cancel.clone()));
//! ```

mod controller;
mod error;
mod runner;

pub use controller::Controller;
pub use error::ControllerError;
pub use runner::ReconcileRunner;
