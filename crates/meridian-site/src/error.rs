use thiserror::Error;

/// Errors raised by a site context or its factory.
#[derive(Debug, Error)]
pub enum SiteError {
  #[error("unknown site '{site}'")]
  UnknownSite { site: String },

  #[error("provisioning on '{site}' failed: {message}")]
  Provision { site: String, message: String },

  #[error("'{operation}' is not supported by site '{site}'")]
  Unsupported { site: String, operation: String },

  #[error("invalid record for site '{site}': {message}")]
  Snapshot { site: String, message: String },

  #[error("teardown on '{site}' failed: {message}")]
  Teardown { site: String, message: String },
}

impl SiteError {
  pub fn unknown_site(site: impl Into<String>) -> Self {
    Self::UnknownSite { site: site.into() }
  }

  pub fn provision(site: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Provision {
      site: site.into(),
      message: message.into(),
    }
  }

  pub fn unsupported(site: impl Into<String>, operation: impl Into<String>) -> Self {
    Self::Unsupported {
      site: site.into(),
      operation: operation.into(),
    }
  }

  pub fn snapshot(site: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Snapshot {
      site: site.into(),
      message: message.into(),
    }
  }

  pub fn teardown(site: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Teardown {
      site: site.into(),
      message: message.into(),
    }
  }
}
