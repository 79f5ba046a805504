use serde::{Deserialize, Serialize};

/// A directed edge between two nodes of a workflow graph.
///
/// Ports are layout metadata from the builder UI; execution only follows
/// `from_node_id` -> `to_node_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDef {
  pub from_node_id: String,
  pub to_node_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from_port: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub to_port: Option<String>,
}
