use crate::{SiteContext, SiteError};

/// Builds site contexts for a workflow.
///
/// Injected into the orchestrator at construction; the orchestrator calls it
/// when a request names a site it has no context for yet, and when a
/// persisted workflow is reconstructed.
pub trait SiteContextFactory: Send + Sync {
  /// Create an empty context for `site`, owned by `workflow_id`.
  ///
  /// Returns [`SiteError::UnknownSite`] when no backend family handles the
  /// site key.
  fn create(&self, site: &str, workflow_id: &str) -> Result<Box<dyn SiteContext>, SiteError>;
}
