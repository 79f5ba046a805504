//! Trellis Store
//!
//! This crate provides the storage trait and SQLite implementation for
//! workflow definitions and run state. It is the only shared mutable state
//! of the engine.
//!
//! The [`Store`] trait defines operations for:
//! - Registering and loading workflow definitions (kept as JSON blobs)
//! - Creating and updating workflow instances and node instances
//! - Appending to the execution log
//! - Creating and resolving approvals

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::{
  Approval, ApprovalStatus, ExecutionLogEntry, InstanceStatus, LogLevel, NodeInstance, NodeStatus,
  WorkflowInstance, WorkflowRecord,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// Storage trait for workflow definitions and run state.
#[async_trait]
pub trait Store: Send + Sync {
  /// Register a workflow definition.
  async fn create_workflow(&self, record: &WorkflowRecord) -> Result<(), Error>;

  /// Get a workflow definition by id.
  async fn get_workflow(&self, workflow_id: &str) -> Result<WorkflowRecord, Error>;

  /// Find the newest active workflow definition with the given name.
  async fn find_workflow_by_name(&self, name: &str) -> Result<Option<WorkflowRecord>, Error>;

  /// Create a new workflow instance.
  async fn create_instance(&self, instance: &WorkflowInstance) -> Result<(), Error>;

  /// Get a workflow instance by id.
  async fn get_instance(&self, instance_id: &str) -> Result<WorkflowInstance, Error>;

  /// Update a workflow instance's status, node pointer, and data blob.
  ///
  /// `current_node_id` is written as given, including `None` to clear the
  /// pointer once the run is terminal.
  async fn update_instance(
    &self,
    instance_id: &str,
    status: InstanceStatus,
    current_node_id: Option<&str>,
    data: &serde_json::Value,
    completed_at: Option<DateTime<Utc>>,
  ) -> Result<(), Error>;

  /// List instances of a workflow, newest first.
  async fn list_instances(&self, workflow_id: &str) -> Result<Vec<WorkflowInstance>, Error>;

  /// Create a new node instance.
  async fn create_node_instance(&self, node: &NodeInstance) -> Result<(), Error>;

  /// Get a node instance by id.
  async fn get_node_instance(&self, node_instance_id: &str) -> Result<NodeInstance, Error>;

  /// Find the node instance for a given (run, graph node) pair, if one was
  /// ever created. Used as the idempotency guard before advancing.
  async fn find_node_instance(
    &self,
    instance_id: &str,
    node_id: &str,
  ) -> Result<Option<NodeInstance>, Error>;

  /// List all node instances of a run in creation order.
  async fn list_node_instances(&self, instance_id: &str) -> Result<Vec<NodeInstance>, Error>;

  /// List the non-terminal node instances of a run.
  async fn live_node_instances(&self, instance_id: &str) -> Result<Vec<NodeInstance>, Error>;

  /// Update a node instance. `data`, `result`, and `error_message` are only
  /// written when given; `started_at`/`completed_at` are stamped from the
  /// status transition.
  async fn update_node_instance(
    &self,
    node_instance_id: &str,
    status: NodeStatus,
    data: Option<&serde_json::Value>,
    result: Option<&serde_json::Value>,
    error_message: Option<&str>,
  ) -> Result<(), Error>;

  /// Append an execution log entry.
  async fn append_log(
    &self,
    instance_id: &str,
    node_instance_id: Option<&str>,
    level: LogLevel,
    message: &str,
    data: &serde_json::Value,
  ) -> Result<(), Error>;

  /// List a run's execution log in append order.
  async fn list_logs(&self, instance_id: &str) -> Result<Vec<ExecutionLogEntry>, Error>;

  /// Create an approval record.
  async fn create_approval(&self, approval: &Approval) -> Result<(), Error>;

  /// Get an approval by id.
  async fn get_approval(&self, approval_id: &str) -> Result<Approval, Error>;

  /// Record an approval decision and stamp `decided_at`.
  async fn decide_approval(
    &self,
    approval_id: &str,
    status: ApprovalStatus,
    comments: Option<&str>,
    decided_by: Option<&str>,
  ) -> Result<(), Error>;
}
