use std::sync::Arc;

use meridian_config::OrchestratorSettings;
use meridian_site::{SiteContext, SiteContextFactory};

use crate::OrchestratorError;
use crate::notify::{MetadataSink, NoopSink, NotificationSink};

/// Maps a site key to the destination stitch-port URL of its region.
pub trait StitchPortResolver: Send + Sync {
  fn resolve(&self, site: &str) -> Option<String>;
}

impl StitchPortResolver for OrchestratorSettings {
  fn resolve(&self, site: &str) -> Option<String> {
    self.stitch_port_for(site).map(str::to_string)
  }
}

/// Collaborators and settings shared by every workflow of an orchestrator.
pub struct WorkflowEnv {
  factory: Arc<dyn SiteContextFactory>,
  notifier: Arc<dyn NotificationSink>,
  metadata: Option<Arc<dyn MetadataSink>>,
  stitch_ports: Arc<dyn StitchPortResolver>,
  connecting_site: String,
}

impl WorkflowEnv {
  /// An environment with default settings, a disconnected notifier and no
  /// metadata sink.
  pub fn new(factory: Arc<dyn SiteContextFactory>) -> Self {
    Self::from_settings(factory, &OrchestratorSettings::default())
  }

  pub fn from_settings(
    factory: Arc<dyn SiteContextFactory>,
    settings: &OrchestratorSettings,
  ) -> Self {
    Self {
      factory,
      notifier: Arc::new(NoopSink),
      metadata: None,
      stitch_ports: Arc::new(settings.clone()),
      connecting_site: settings.connecting_site.clone(),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn with_metadata_sink(mut self, metadata: Arc<dyn MetadataSink>) -> Self {
    self.metadata = Some(metadata);
    self
  }

  pub fn with_stitch_ports(mut self, stitch_ports: Arc<dyn StitchPortResolver>) -> Self {
    self.stitch_ports = stitch_ports;
    self
  }

  pub fn with_connecting_site(mut self, site: impl Into<String>) -> Self {
    self.connecting_site = site.into();
    self
  }

  pub fn connecting_site(&self) -> &str {
    &self.connecting_site
  }

  pub(crate) fn notifier(&self) -> &dyn NotificationSink {
    self.notifier.as_ref()
  }

  pub(crate) fn metadata(&self) -> Option<&dyn MetadataSink> {
    self.metadata.as_deref()
  }

  pub(crate) fn stitch_port(&self, site: &str) -> Option<String> {
    self.stitch_ports.resolve(site)
  }

  pub(crate) fn create_context(
    &self,
    site: &str,
    workflow_id: &str,
  ) -> Result<Box<dyn SiteContext>, OrchestratorError> {
    self
      .factory
      .create(site, workflow_id)
      .map_err(|e| OrchestratorError::backend(site, e))
  }
}
