use serde::{Deserialize, Serialize};

use crate::connection::ConnectionDef;
use crate::node::NodeDef;

/// A complete, versioned workflow definition.
///
/// Definitions are immutable per version and read-only to the engine; the
/// builder UI owns creation and editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDef {
  pub workflow_id: String,
  pub name: String,
  #[serde(default = "default_version")]
  pub version: i64,
  /// Owning tenant.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub company_id: Option<String>,
  #[serde(default = "default_active")]
  pub active: bool,
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub connections: Vec<ConnectionDef>,
}

fn default_version() -> i64 {
  1
}

fn default_active() -> bool {
  true
}
