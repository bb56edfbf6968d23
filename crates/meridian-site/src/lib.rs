//! Meridian Site
//!
//! The contract between the workflow orchestrator and the per-backend
//! adapters that actually talk to a cloud. The orchestrator only ever sees
//! a [`SiteContext`]; adapters for each backend family implement it and a
//! [`SiteContextFactory`] builds them on demand.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   SiteContextFactory                        │
//! │  - create(site, workflow_id) → Box<dyn SiteContext>         │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SiteContext                            │
//! │  - compute / storage / stitch provisioning                  │
//! │  - stitching + route installation for network links         │
//! │  - periodic refresh, status, stop                           │
//! │  - to_record / restore for persistence                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Provisioning calls answer with an [`Outcome`]: either the work completed
//! or the backend cannot satisfy it yet and the request should be retried
//! later. Failures are reported through [`SiteError`].

mod context;
mod error;
mod factory;
mod snapshot;
mod teardown;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use context::{
  ComputeCounters, ComputeResponse, LinkRoute, Outcome, PeerStitch, SiteContext, StitchSetup,
};
pub use error::SiteError;
pub use factory::SiteContextFactory;
pub use snapshot::{SiteRecord, WorkflowSnapshot};
pub use teardown::{NetworkResources, NetworkTeardown, TeardownPolicy, teardown_network};
