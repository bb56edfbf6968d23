//! Meridian Workflow
//!
//! The orchestration core. A [`Workflow`] is a long-lived unit of
//! orchestration state that clients mutate one request at a time: compute
//! here, storage there, a network link between two hosts that may live on
//! different clouds.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Workflow                            │
//! │  - lock() → WorkflowGuard (one mutation at a time)          │
//! │  - reconcile() takes the lock itself                        │
//! │  - restore(snapshot, env)                                   │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowGuard                          │
//! │  - process_compute / storage / stitch / script / sdx        │
//! │  - process_network (stitching protocol)                     │
//! │  - reconcile, convert, stop                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │             SiteRegistry + DeferredQueue                    │
//! │  - one SiteContext per site key                             │
//! │  - requests waiting for the next reconciliation tick        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Collaborators (site factory, notification sink, metadata sink, stitch
//! port resolver) are injected through [`WorkflowEnv`].
//!
//! # Usage
//!
//! ```ignore
//! let env = Arc::new(WorkflowEnv::from_settings(factory, &settings));
//! let workflow = Workflow::new("wf-1", env);
//!
//! let mut guard = workflow.lock().await;
//! match guard.process_compute(&request, false).await? {
//!     Outcome::Completed(response) => println!("{:?}", response.host_names),
//!     Outcome::Deferred => println!("accepted, will retry"),
//! }
//! ```

mod deferred;
mod env;
mod error;
mod network;
mod notify;
mod reconcile;
mod registry;
mod requests;
mod snapshot;
mod workflow;

pub use deferred::{DeferredQueue, DeferredRequest};
pub use env::{StitchPortResolver, WorkflowEnv};
pub use error::OrchestratorError;
pub use notify::{ChannelSink, MetadataSink, NoopSink, Notification, NotificationSink, SinkError};
pub use reconcile::ReconcileReport;
pub use registry::SiteRegistry;
pub use workflow::{Counters, Workflow, WorkflowGuard};

pub use meridian_site::{ComputeResponse, Outcome, WorkflowSnapshot};
