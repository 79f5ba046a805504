use serde_json::Value;

/// The addressable output of one node instance.
#[derive(Debug, Clone)]
pub struct NodeOutput {
  /// Identifiers this node answers to: the config `logicalId` when present,
  /// always followed by the graph-local `node_id`.
  pub ids: Vec<String>,
  /// The node's input data.
  pub data: Value,
  /// The node's output result.
  pub result: Value,
}

/// Snapshot of a run's node outputs, assembled by the engine before a node
/// executes.
#[derive(Debug, Clone, Default)]
pub struct NodeOutputs {
  entries: Vec<NodeOutput>,
}

impl NodeOutputs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, output: NodeOutput) {
    self.entries.push(output);
  }

  /// Find the first node answering to `id`.
  pub fn find(&self, id: &str) -> Option<&NodeOutput> {
    self.entries.iter().find(|e| e.ids.iter().any(|i| i == id))
  }

  pub fn iter(&self) -> impl Iterator<Item = &NodeOutput> {
    self.entries.iter()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
