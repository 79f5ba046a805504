use serde_json::Value;
use trellis_config::NodeDef;
use trellis_store::{LogLevel, NodeInstance, Store, WorkflowInstance};
use trellis_template::{NodeOutputs, render_placeholders};

use crate::collaborators::Collaborators;

/// Everything an executor may look at while running one node.
///
/// Assembled by the engine per execution attempt. `data` is the merged input
/// the node sees: the run's accumulated data blob, the previous node's
/// result, and the engine's bookkeeping keys.
pub struct ExecutionContext<'a> {
  pub store: &'a dyn Store,
  pub instance: &'a WorkflowInstance,
  pub node: &'a NodeInstance,
  pub node_def: &'a NodeDef,
  pub data: &'a Value,
  pub outputs: &'a NodeOutputs,
  pub collaborators: &'a Collaborators,
}

impl ExecutionContext<'_> {
  /// Resolve `{{logicalId.path}}` tokens against the run's node outputs.
  pub fn render(&self, template: &str) -> String {
    render_placeholders(template, self.outputs)
  }

  /// Resolve placeholder tokens in every string of a JSON value.
  pub fn render_json(&self, value: &Value) -> Value {
    match value {
      Value::String(s) => Value::String(self.render(s)),
      Value::Array(items) => Value::Array(items.iter().map(|v| self.render_json(v)).collect()),
      Value::Object(map) => Value::Object(
        map
          .iter()
          .map(|(k, v)| (k.clone(), self.render_json(v)))
          .collect(),
      ),
      other => other.clone(),
    }
  }

  /// Append an execution log entry attributed to this node instance.
  pub async fn log(
    &self,
    level: LogLevel,
    message: &str,
    data: &Value,
  ) -> Result<(), trellis_store::Error> {
    self
      .store
      .append_log(
        &self.instance.instance_id,
        Some(&self.node.node_instance_id),
        level,
        message,
        data,
      )
      .await
  }

  /// The user a task for this node should be assigned to, falling back to
  /// the run's assignee and then its creator.
  pub fn assignee_or_default(&self, configured: Option<&str>) -> Option<String> {
    configured
      .map(str::to_string)
      .or_else(|| self.instance.assigned_to.clone())
      .or_else(|| self.instance.created_by.clone())
  }
}
