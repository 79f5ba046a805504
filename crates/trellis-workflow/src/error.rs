use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("workflow '{0}' has no nodes")]
  NoNodes(String),

  #[error("workflow '{0}' has no start node")]
  NoStartNode(String),

  #[error("workflow '{workflow}' has multiple start nodes: {first} and {second}")]
  MultipleStartNodes {
    workflow: String,
    first: String,
    second: String,
  },

  #[error("duplicate node id '{0}'")]
  DuplicateNodeId(String),

  #[error("connection references unknown node: from={from}, to={to}")]
  InvalidConnection { from: String, to: String },

  #[error("node '{0}' has more than one outgoing connection; branching is not supported")]
  MultipleSuccessors(String),
}
