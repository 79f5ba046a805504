use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::types::{
  Approval, ApprovalStatus, ExecutionLogEntry, InstanceStatus, LogLevel, NodeInstance, NodeStatus,
  WorkflowInstance, WorkflowRecord,
};
use crate::{Error, Store};

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn create_workflow(&self, record: &WorkflowRecord) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO workflows (workflow_id, name, version, company_id, active, definition, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&record.workflow_id)
    .bind(&record.name)
    .bind(record.version)
    .bind(&record.company_id)
    .bind(record.active)
    .bind(&record.definition)
    .bind(record.created_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<WorkflowRecord, Error> {
    sqlx::query_as(
      r#"
            SELECT workflow_id, name, version, company_id, active, definition, created_at
            FROM workflows
            WHERE workflow_id = ?
            "#,
    )
    .bind(workflow_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("workflow {}", workflow_id)))
  }

  async fn find_workflow_by_name(&self, name: &str) -> Result<Option<WorkflowRecord>, Error> {
    let record = sqlx::query_as(
      r#"
            SELECT workflow_id, name, version, company_id, active, definition, created_at
            FROM workflows
            WHERE name = ? AND active = 1
            ORDER BY version DESC
            LIMIT 1
            "#,
    )
    .bind(name)
    .fetch_optional(&self.pool)
    .await?;

    Ok(record)
  }

  async fn create_instance(&self, instance: &WorkflowInstance) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO workflow_instances
              (instance_id, workflow_id, name, status, current_node_id, data,
               assigned_to, created_by, created_at, updated_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&instance.instance_id)
    .bind(&instance.workflow_id)
    .bind(&instance.name)
    .bind(instance.status)
    .bind(&instance.current_node_id)
    .bind(&instance.data)
    .bind(&instance.assigned_to)
    .bind(&instance.created_by)
    .bind(instance.created_at)
    .bind(instance.updated_at)
    .bind(instance.completed_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_instance(&self, instance_id: &str) -> Result<WorkflowInstance, Error> {
    sqlx::query_as(
      r#"
            SELECT instance_id, workflow_id, name, status, current_node_id, data,
                   assigned_to, created_by, created_at, updated_at, completed_at
            FROM workflow_instances
            WHERE instance_id = ?
            "#,
    )
    .bind(instance_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("workflow instance {}", instance_id)))
  }

  async fn update_instance(
    &self,
    instance_id: &str,
    status: InstanceStatus,
    current_node_id: Option<&str>,
    data: &serde_json::Value,
    completed_at: Option<DateTime<Utc>>,
  ) -> Result<(), Error> {
    sqlx::query(
      r#"
            UPDATE workflow_instances
            SET status = ?, current_node_id = ?, data = ?, updated_at = ?,
                completed_at = COALESCE(completed_at, ?)
            WHERE instance_id = ?
            "#,
    )
    .bind(status)
    .bind(current_node_id)
    .bind(Json(data))
    .bind(Utc::now())
    .bind(completed_at)
    .bind(instance_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list_instances(&self, workflow_id: &str) -> Result<Vec<WorkflowInstance>, Error> {
    let instances = sqlx::query_as(
      r#"
            SELECT instance_id, workflow_id, name, status, current_node_id, data,
                   assigned_to, created_by, created_at, updated_at, completed_at
            FROM workflow_instances
            WHERE workflow_id = ?
            ORDER BY created_at DESC
            "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(instances)
  }

  async fn create_node_instance(&self, node: &NodeInstance) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO workflow_node_instances
              (node_instance_id, instance_id, node_id, node_type, assigned_to, status,
               data, result, error_message, created_at, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&node.node_instance_id)
    .bind(&node.instance_id)
    .bind(&node.node_id)
    .bind(&node.node_type)
    .bind(&node.assigned_to)
    .bind(node.status)
    .bind(&node.data)
    .bind(&node.result)
    .bind(&node.error_message)
    .bind(node.created_at)
    .bind(node.started_at)
    .bind(node.completed_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_node_instance(&self, node_instance_id: &str) -> Result<NodeInstance, Error> {
    sqlx::query_as(
      r#"
            SELECT node_instance_id, instance_id, node_id, node_type, assigned_to, status,
                   data, result, error_message, created_at, started_at, completed_at
            FROM workflow_node_instances
            WHERE node_instance_id = ?
            "#,
    )
    .bind(node_instance_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("node instance {}", node_instance_id)))
  }

  async fn find_node_instance(
    &self,
    instance_id: &str,
    node_id: &str,
  ) -> Result<Option<NodeInstance>, Error> {
    let node = sqlx::query_as(
      r#"
            SELECT node_instance_id, instance_id, node_id, node_type, assigned_to, status,
                   data, result, error_message, created_at, started_at, completed_at
            FROM workflow_node_instances
            WHERE instance_id = ? AND node_id = ?
            "#,
    )
    .bind(instance_id)
    .bind(node_id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(node)
  }

  async fn list_node_instances(&self, instance_id: &str) -> Result<Vec<NodeInstance>, Error> {
    let nodes = sqlx::query_as(
      r#"
            SELECT node_instance_id, instance_id, node_id, node_type, assigned_to, status,
                   data, result, error_message, created_at, started_at, completed_at
            FROM workflow_node_instances
            WHERE instance_id = ?
            ORDER BY created_at
            "#,
    )
    .bind(instance_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(nodes)
  }

  async fn live_node_instances(&self, instance_id: &str) -> Result<Vec<NodeInstance>, Error> {
    let nodes = sqlx::query_as(
      r#"
            SELECT node_instance_id, instance_id, node_id, node_type, assigned_to, status,
                   data, result, error_message, created_at, started_at, completed_at
            FROM workflow_node_instances
            WHERE instance_id = ? AND status IN ('pending', 'in_progress', 'waiting_user_input')
            ORDER BY created_at
            "#,
    )
    .bind(instance_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(nodes)
  }

  async fn update_node_instance(
    &self,
    node_instance_id: &str,
    status: NodeStatus,
    data: Option<&serde_json::Value>,
    result: Option<&serde_json::Value>,
    error_message: Option<&str>,
  ) -> Result<(), Error> {
    let now = Utc::now();
    let started_at = matches!(status, NodeStatus::InProgress).then_some(now);
    let completed_at =
      matches!(status, NodeStatus::Completed | NodeStatus::Failed).then_some(now);

    sqlx::query(
      r#"
            UPDATE workflow_node_instances
            SET status = ?,
                data = COALESCE(?, data),
                result = COALESCE(?, result),
                error_message = COALESCE(?, error_message),
                started_at = COALESCE(started_at, ?),
                completed_at = COALESCE(completed_at, ?)
            WHERE node_instance_id = ?
            "#,
    )
    .bind(status)
    .bind(data.map(Json))
    .bind(result.map(Json))
    .bind(error_message)
    .bind(started_at)
    .bind(completed_at)
    .bind(node_instance_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn append_log(
    &self,
    instance_id: &str,
    node_instance_id: Option<&str>,
    level: LogLevel,
    message: &str,
    data: &serde_json::Value,
  ) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO workflow_execution_logs
              (instance_id, node_instance_id, level, message, data, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(instance_id)
    .bind(node_instance_id)
    .bind(level)
    .bind(message)
    .bind(Json(data))
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list_logs(&self, instance_id: &str) -> Result<Vec<ExecutionLogEntry>, Error> {
    let entries = sqlx::query_as(
      r#"
            SELECT id, instance_id, node_instance_id, level, message, data, created_at
            FROM workflow_execution_logs
            WHERE instance_id = ?
            ORDER BY id
            "#,
    )
    .bind(instance_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(entries)
  }

  async fn create_approval(&self, approval: &Approval) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO workflow_approvals
              (approval_id, instance_id, node_instance_id, approver_id, approver_email,
               node_type, status, comments, decided_by, created_at, decided_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&approval.approval_id)
    .bind(&approval.instance_id)
    .bind(&approval.node_instance_id)
    .bind(&approval.approver_id)
    .bind(&approval.approver_email)
    .bind(&approval.node_type)
    .bind(approval.status)
    .bind(&approval.comments)
    .bind(&approval.decided_by)
    .bind(approval.created_at)
    .bind(approval.decided_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_approval(&self, approval_id: &str) -> Result<Approval, Error> {
    sqlx::query_as(
      r#"
            SELECT approval_id, instance_id, node_instance_id, approver_id, approver_email,
                   node_type, status, comments, decided_by, created_at, decided_at
            FROM workflow_approvals
            WHERE approval_id = ?
            "#,
    )
    .bind(approval_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("approval {}", approval_id)))
  }

  async fn decide_approval(
    &self,
    approval_id: &str,
    status: ApprovalStatus,
    comments: Option<&str>,
    decided_by: Option<&str>,
  ) -> Result<(), Error> {
    sqlx::query(
      r#"
            UPDATE workflow_approvals
            SET status = ?, comments = ?, decided_by = ?, decided_at = ?
            WHERE approval_id = ?
            "#,
    )
    .bind(status)
    .bind(comments)
    .bind(decided_by)
    .bind(Utc::now())
    .bind(approval_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use trellis_config::{NodeConfig, NodeDef, Position, TriggerConfig, WorkflowDef};

  async fn test_store() -> SqliteStore {
    let pool = SqlitePool::connect("sqlite::memory:")
      .await
      .expect("in-memory pool");
    let store = SqliteStore::new(pool);
    store.migrate().await.expect("migrations");
    store
  }

  fn test_definition() -> WorkflowDef {
    WorkflowDef {
      workflow_id: "wf-1".to_string(),
      name: "onboarding".to_string(),
      version: 1,
      company_id: Some("acme".to_string()),
      active: true,
      nodes: vec![NodeDef {
        node_id: "start".to_string(),
        label: None,
        description: None,
        logical_id: None,
        is_start_node: true,
        position: Position::default(),
        config: NodeConfig::Trigger(TriggerConfig::default()),
      }],
      connections: vec![],
    }
  }

  // Instance rows carry a foreign key to workflows, which sqlite enforces.
  async fn seed_workflow(store: &SqliteStore) {
    store
      .create_workflow(&WorkflowRecord {
        workflow_id: "wf-1".to_string(),
        name: "onboarding".to_string(),
        version: 1,
        company_id: Some("acme".to_string()),
        active: true,
        definition: Json(test_definition()),
        created_at: Utc::now(),
      })
      .await
      .expect("seed workflow");
  }

  fn test_instance(instance_id: &str) -> WorkflowInstance {
    let now = Utc::now();
    WorkflowInstance {
      instance_id: instance_id.to_string(),
      workflow_id: "wf-1".to_string(),
      name: "onboarding_1".to_string(),
      status: InstanceStatus::Active,
      current_node_id: None,
      data: Json(json!({"company_id": 7})),
      assigned_to: None,
      created_by: Some("user-3".to_string()),
      created_at: now,
      updated_at: now,
      completed_at: None,
    }
  }

  fn test_node_instance(node_instance_id: &str, instance_id: &str, node_id: &str) -> NodeInstance {
    NodeInstance {
      node_instance_id: node_instance_id.to_string(),
      instance_id: instance_id.to_string(),
      node_id: node_id.to_string(),
      node_type: "triggerNode".to_string(),
      assigned_to: None,
      status: NodeStatus::Pending,
      data: Json(json!({})),
      result: Json(json!({})),
      error_message: None,
      created_at: Utc::now(),
      started_at: None,
      completed_at: None,
    }
  }

  #[tokio::test]
  async fn workflow_round_trip_by_name() {
    let store = test_store().await;
    let record = WorkflowRecord {
      workflow_id: "wf-1".to_string(),
      name: "onboarding".to_string(),
      version: 1,
      company_id: Some("acme".to_string()),
      active: true,
      definition: Json(test_definition()),
      created_at: Utc::now(),
    };
    store.create_workflow(&record).await.unwrap();

    let found = store.find_workflow_by_name("onboarding").await.unwrap();
    assert_eq!(found.as_ref().map(|r| r.workflow_id.as_str()), Some("wf-1"));
    assert_eq!(found.unwrap().definition.0, test_definition());

    assert!(store.find_workflow_by_name("missing").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn instance_update_preserves_completed_at() {
    let store = test_store().await;
    seed_workflow(&store).await;
    store.create_instance(&test_instance("inst-1")).await.unwrap();

    let done = Utc::now();
    store
      .update_instance(
        "inst-1",
        InstanceStatus::Completed,
        None,
        &json!({"final": true}),
        Some(done),
      )
      .await
      .unwrap();

    let instance = store.get_instance("inst-1").await.unwrap();
    assert_eq!(instance.status, InstanceStatus::Completed);
    assert!(instance.current_node_id.is_none());
    assert!(instance.completed_at.is_some());
    assert_eq!(instance.data.0, json!({"final": true}));

    // A later write must not clear the completion stamp.
    store
      .update_instance(
        "inst-1",
        InstanceStatus::Completed,
        None,
        &json!({"final": true}),
        None,
      )
      .await
      .unwrap();
    assert!(store.get_instance("inst-1").await.unwrap().completed_at.is_some());
  }

  #[tokio::test]
  async fn node_instance_stamps_follow_status() {
    let store = test_store().await;
    seed_workflow(&store).await;
    store.create_instance(&test_instance("inst-1")).await.unwrap();
    store
      .create_node_instance(&test_node_instance("ni-1", "inst-1", "start"))
      .await
      .unwrap();

    store
      .update_node_instance("ni-1", NodeStatus::InProgress, Some(&json!({"in": 1})), None, None)
      .await
      .unwrap();
    let node = store.get_node_instance("ni-1").await.unwrap();
    assert!(node.started_at.is_some());
    assert!(node.completed_at.is_none());

    store
      .update_node_instance("ni-1", NodeStatus::Completed, None, Some(&json!({"out": 2})), None)
      .await
      .unwrap();
    let node = store.get_node_instance("ni-1").await.unwrap();
    assert_eq!(node.status, NodeStatus::Completed);
    assert!(node.completed_at.is_some());
    // Partial update kept the earlier data write.
    assert_eq!(node.data.0, json!({"in": 1}));
    assert_eq!(node.result.0, json!({"out": 2}));
  }

  #[tokio::test]
  async fn live_node_query_excludes_terminal_states() {
    let store = test_store().await;
    seed_workflow(&store).await;
    store.create_instance(&test_instance("inst-1")).await.unwrap();
    store
      .create_node_instance(&test_node_instance("ni-1", "inst-1", "a"))
      .await
      .unwrap();
    store
      .create_node_instance(&test_node_instance("ni-2", "inst-1", "b"))
      .await
      .unwrap();

    store
      .update_node_instance("ni-1", NodeStatus::Completed, None, None, None)
      .await
      .unwrap();
    store
      .update_node_instance("ni-2", NodeStatus::WaitingUserInput, None, None, None)
      .await
      .unwrap();

    let live = store.live_node_instances("inst-1").await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].node_instance_id, "ni-2");
  }

  #[tokio::test]
  async fn approval_decision_round_trip() {
    let store = test_store().await;
    let approval = Approval {
      approval_id: "ap-1".to_string(),
      instance_id: "inst-1".to_string(),
      node_instance_id: "ni-1".to_string(),
      approver_id: Some("user-9".to_string()),
      approver_email: None,
      node_type: "approvalNode".to_string(),
      status: ApprovalStatus::Pending,
      comments: None,
      decided_by: None,
      created_at: Utc::now(),
      decided_at: None,
    };
    store.create_approval(&approval).await.unwrap();

    store
      .decide_approval("ap-1", ApprovalStatus::Approved, Some("ok"), Some("user-9"))
      .await
      .unwrap();

    let decided = store.get_approval("ap-1").await.unwrap();
    assert_eq!(decided.status, ApprovalStatus::Approved);
    assert_eq!(decided.comments.as_deref(), Some("ok"));
    assert!(decided.decided_at.is_some());
  }

  #[tokio::test]
  async fn execution_log_appends_in_order() {
    let store = test_store().await;
    store
      .append_log("inst-1", None, LogLevel::Info, "started", &json!({}))
      .await
      .unwrap();
    store
      .append_log("inst-1", Some("ni-1"), LogLevel::Error, "boom", &json!({"e": 1}))
      .await
      .unwrap();

    let logs = store.list_logs("inst-1").await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].message, "started");
    assert_eq!(logs[1].level, LogLevel::Error);
    assert_eq!(logs[1].node_instance_id.as_deref(), Some("ni-1"));
  }
}
