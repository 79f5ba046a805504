use thiserror::Error;

use crate::collaborators::CollaboratorError;

/// Errors that can occur while executing a single node.
///
/// These are unexpected failures; an executor that fails for a business
/// reason (rejected request, non-2xx response) returns a failed
/// [`Outcome`](crate::Outcome) instead.
#[derive(Debug, Error)]
pub enum ExecutorError {
  /// The node's configuration cannot be acted on.
  #[error("node misconfigured: {0}")]
  Configuration(String),

  /// An external collaborator failed.
  #[error("collaborator error: {0}")]
  Collaborator(#[from] CollaboratorError),

  /// A storage operation failed.
  #[error(transparent)]
  Store(#[from] trellis_store::Error),
}
