use meridian_site::SiteError;
use thiserror::Error;

use crate::notify::SinkError;

/// Errors surfaced by the orchestrator's entry points.
///
/// A request the backend cannot satisfy yet is not an error; it is reported
/// as [`meridian_site::Outcome::Deferred`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
  /// Malformed or self-contradictory request.
  #[error("bad request: {message}")]
  BadRequest { message: String },

  /// Target host, slice or site is absent.
  #[error("not found: {message}")]
  NotFound { message: String },

  /// The backend operation itself failed.
  #[error("site '{site}' failed: {source}")]
  Backend {
    site: String,
    #[source]
    source: SiteError,
  },

  #[error("script delivery to '{host}' failed: {source}")]
  Metadata {
    host: String,
    #[source]
    source: SinkError,
  },

  #[error("failed to serialize request: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
  pub fn bad_request(message: impl Into<String>) -> Self {
    Self::BadRequest {
      message: message.into(),
    }
  }

  pub fn not_found(message: impl Into<String>) -> Self {
    Self::NotFound {
      message: message.into(),
    }
  }

  /// Wrap a site failure. A site key no backend handles is the caller's
  /// mistake and maps to `BadRequest`.
  pub fn backend(site: impl Into<String>, source: SiteError) -> Self {
    match source {
      SiteError::UnknownSite { site } => Self::bad_request(format!("unknown site '{site}'")),
      source => Self::Backend {
        site: site.into(),
        source,
      },
    }
  }

  /// HTTP-equivalent status for outer surfaces.
  pub fn status_code(&self) -> u16 {
    match self {
      Self::BadRequest { .. } => 400,
      Self::NotFound { .. } => 404,
      Self::Backend { .. } | Self::Metadata { .. } | Self::Serialization(_) => 500,
    }
  }
}
