use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use trellis_config::WorkflowDef;

/// Status of a workflow run.
///
/// `Paused` and `Cancelled` exist for external management tooling; the engine
/// never transitions into or out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum InstanceStatus {
  Active,
  Paused,
  Completed,
  Failed,
  Cancelled,
}

impl InstanceStatus {
  /// Terminal states admit no further node instances.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      InstanceStatus::Completed | InstanceStatus::Failed | InstanceStatus::Cancelled
    )
  }
}

/// Status of one node execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NodeStatus {
  Pending,
  InProgress,
  WaitingUserInput,
  Completed,
  Failed,
}

impl NodeStatus {
  /// A live node instance is one that has not yet reached a terminal state.
  /// `WaitingUserInput` is live: it is the durable suspension point.
  pub fn is_live(&self) -> bool {
    matches!(
      self,
      NodeStatus::Pending | NodeStatus::InProgress | NodeStatus::WaitingUserInput
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApprovalStatus {
  Pending,
  Approved,
  Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LogLevel {
  Info,
  Warn,
  Error,
}

/// A stored workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowRecord {
  pub workflow_id: String,
  pub name: String,
  pub version: i64,
  pub company_id: Option<String>,
  pub active: bool,
  pub definition: Json<WorkflowDef>,
  pub created_at: DateTime<Utc>,
}

/// One run of a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowInstance {
  pub instance_id: String,
  pub workflow_id: String,
  pub name: String,
  pub status: InstanceStatus,
  /// Node currently executing or awaiting input; null once terminal.
  pub current_node_id: Option<String>,
  /// Accumulated data blob, merged across node outputs (last write wins).
  pub data: Json<serde_json::Value>,
  pub assigned_to: Option<String>,
  pub created_by: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

/// One execution attempt of a single node within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NodeInstance {
  pub node_instance_id: String,
  pub instance_id: String,
  /// Graph-local node id, denormalized from the definition.
  pub node_id: String,
  /// Node kind tag, denormalized from the definition.
  pub node_type: String,
  pub assigned_to: Option<String>,
  pub status: NodeStatus,
  /// This node's input.
  pub data: Json<serde_json::Value>,
  /// This node's output, consumed by the next node and the resolver.
  pub result: Json<serde_json::Value>,
  pub error_message: Option<String>,
  pub created_at: DateTime<Utc>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
}

/// Append-only audit record. The engine writes these and never reads them
/// back to drive control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionLogEntry {
  pub id: i64,
  pub instance_id: String,
  pub node_instance_id: Option<String>,
  pub level: LogLevel,
  pub message: String,
  pub data: Json<serde_json::Value>,
  pub created_at: DateTime<Utc>,
}

/// Approval record for approval/crmApproval nodes; resolved exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Approval {
  pub approval_id: String,
  pub instance_id: String,
  pub node_instance_id: String,
  pub approver_id: Option<String>,
  pub approver_email: Option<String>,
  pub node_type: String,
  pub status: ApprovalStatus,
  pub comments: Option<String>,
  pub decided_by: Option<String>,
  pub created_at: DateTime<Utc>,
  pub decided_at: Option<DateTime<Utc>>,
}
