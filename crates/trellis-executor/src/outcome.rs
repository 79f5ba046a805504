use serde_json::Value;

/// How a node execution attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
  /// The node finished; the run advances to its successor.
  Completed,
  /// The node is suspended until a user supplies input; the run parks here.
  WaitingUserInput,
  /// The node failed for a business reason; the run fails.
  Failed,
}

/// Result of executing one node.
#[derive(Debug, Clone)]
pub struct Outcome {
  pub status: OutcomeStatus,
  /// Data to merge into the node instance's input blob, if any.
  pub data: Option<Value>,
  /// The node's output, stored as the node instance result.
  pub result: Value,
  /// Failure message when `status` is [`OutcomeStatus::Failed`].
  pub error: Option<String>,
}

impl Outcome {
  pub fn completed(result: Value) -> Self {
    Self {
      status: OutcomeStatus::Completed,
      data: None,
      result,
      error: None,
    }
  }

  pub fn waiting(result: Value) -> Self {
    Self {
      status: OutcomeStatus::WaitingUserInput,
      data: None,
      result,
      error: None,
    }
  }

  pub fn failed(message: impl Into<String>, result: Value) -> Self {
    Self {
      status: OutcomeStatus::Failed,
      data: None,
      result,
      error: Some(message.into()),
    }
  }

  /// Attach data to merge into the node's input blob.
  pub fn with_data(mut self, data: Value) -> Self {
    self.data = Some(data);
    self
  }
}
