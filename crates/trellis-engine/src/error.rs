use thiserror::Error;

/// Errors surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
  /// No active workflow definition with the given name or id.
  #[error("workflow not found: {0}")]
  WorkflowNotFound(String),

  /// The stored definition cannot be executed.
  #[error("invalid workflow definition: {0}")]
  Definition(#[from] trellis_workflow::WorkflowError),

  /// The run state does not match what was asked of it, e.g. resuming a
  /// node that is not waiting for input.
  #[error("invalid state: {0}")]
  InvalidState(String),

  /// A required form field was missing from a submission.
  #[error("missing required field '{field}' for node '{node_id}'")]
  MissingField { node_id: String, field: String },

  /// No executor is registered for a node kind.
  #[error("no executor registered for node type '{0}'")]
  UnsupportedNodeType(String),

  /// A node executor failed unexpectedly.
  #[error(transparent)]
  Executor(#[from] trellis_executor::ExecutorError),

  /// A storage operation failed.
  #[error(transparent)]
  Store(#[from] trellis_store::Error),
}
