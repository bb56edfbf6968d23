use meridian_workflow::OrchestratorError;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
  #[error("workflow '{0}' not found")]
  WorkflowNotFound(String),

  #[error(transparent)]
  Orchestrator(#[from] OrchestratorError),

  #[error("store error: {0}")]
  Store(#[from] meridian_store::Error),
}

impl ControllerError {
  /// HTTP-style status code for outer surfaces.
  pub fn status_code(&self) -> u16 {
    match self {
      Self::WorkflowNotFound(_) => 404,
      Self::Orchestrator(e) => e.status_code(),
      Self::Store(meridian_store::Error::NotFound(_)) => 404,
      Self::Store(_) => 500,
    }
  }
}
