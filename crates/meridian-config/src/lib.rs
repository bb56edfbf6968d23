//! Meridian Config
//!
//! This crate contains the serializable request types a client sends to a
//! workflow, plus the settings document the orchestrator is constructed from.
//!
//! Requests are plain value objects. The orchestrator reads them but never
//! mutates them; when a request has to be remembered (for reprovisioning or
//! for link bookkeeping) it is serialized as-is, so every optional field that
//! was present survives a round trip.
//!
//! Settings can be loaded from:
//! - JSON files (via CLI with `meridian config check settings.json`)
//! - Inline JSON strings (tests, embedded deployments)

mod compute;
mod network;
mod resource;
mod settings;

pub use compute::{ComputeRequest, SlicePolicy};
pub use network::{NetworkAction, NetworkRequest, SdxPrefix};
pub use resource::{ScriptRequest, StitchRequest, StorageRequest};
pub use settings::{OrchestratorSettings, SettingsError, TeardownSettings};
