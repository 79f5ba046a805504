use std::collections::HashMap;

use trellis_config::{NodeDef, WorkflowDef};

use crate::error::WorkflowError;

/// A validated workflow ready for execution.
///
/// Wraps a [`WorkflowDef`] with the indexes the engine needs: nodes by id,
/// the start node, and the single successor of each node.
#[derive(Debug, Clone)]
pub struct Workflow {
  def: WorkflowDef,
  node_index: HashMap<String, usize>,
  successors: HashMap<String, String>,
  start_node_id: String,
}

impl Workflow {
  /// Validate a definition and build the execution indexes.
  pub fn load(def: WorkflowDef) -> Result<Self, WorkflowError> {
    if def.nodes.is_empty() {
      return Err(WorkflowError::NoNodes(def.name.clone()));
    }

    let mut node_index = HashMap::with_capacity(def.nodes.len());
    for (i, node) in def.nodes.iter().enumerate() {
      if node_index.insert(node.node_id.clone(), i).is_some() {
        return Err(WorkflowError::DuplicateNodeId(node.node_id.clone()));
      }
    }

    let mut start_node_id: Option<&str> = None;
    for node in &def.nodes {
      if node.is_start_node {
        if let Some(first) = start_node_id {
          return Err(WorkflowError::MultipleStartNodes {
            workflow: def.name.clone(),
            first: first.to_string(),
            second: node.node_id.clone(),
          });
        }
        start_node_id = Some(&node.node_id);
      }
    }
    let start_node_id = start_node_id
      .ok_or_else(|| WorkflowError::NoStartNode(def.name.clone()))?
      .to_string();

    // Single-successor model: a second outgoing connection is a definition
    // error, not something execution silently ignores.
    let mut successors = HashMap::new();
    for conn in &def.connections {
      if !node_index.contains_key(&conn.from_node_id) || !node_index.contains_key(&conn.to_node_id)
      {
        return Err(WorkflowError::InvalidConnection {
          from: conn.from_node_id.clone(),
          to: conn.to_node_id.clone(),
        });
      }
      if successors
        .insert(conn.from_node_id.clone(), conn.to_node_id.clone())
        .is_some()
      {
        return Err(WorkflowError::MultipleSuccessors(conn.from_node_id.clone()));
      }
    }

    Ok(Self {
      def,
      node_index,
      successors,
      start_node_id,
    })
  }

  pub fn def(&self) -> &WorkflowDef {
    &self.def
  }

  pub fn workflow_id(&self) -> &str {
    &self.def.workflow_id
  }

  pub fn name(&self) -> &str {
    &self.def.name
  }

  /// The node flagged `isStartNode`.
  pub fn start_node(&self) -> &NodeDef {
    // start_node_id was resolved against node_index during load
    &self.def.nodes[self.node_index[&self.start_node_id]]
  }

  /// Look up a node by its graph-local id.
  pub fn node(&self, node_id: &str) -> Option<&NodeDef> {
    self.node_index.get(node_id).map(|i| &self.def.nodes[*i])
  }

  /// The single downstream node, if any. `None` marks a terminal node.
  pub fn successor(&self, node_id: &str) -> Option<&NodeDef> {
    let next_id = self.successors.get(node_id)?;
    self.node(next_id)
  }

  /// Find a node by logical id, falling back to the graph-local node id.
  pub fn node_by_logical_id(&self, logical_id: &str) -> Option<&NodeDef> {
    self
      .def
      .nodes
      .iter()
      .find(|n| n.logical_id.as_deref() == Some(logical_id))
      .or_else(|| self.node(logical_id))
  }
}
