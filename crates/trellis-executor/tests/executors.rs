use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::types::Json;
use trellis_config::{
  ApprovalConfig, FormConfig, FormField, HttpCallConfig, NodeConfig, NodeDef, NodeKind,
  NotificationConfig, Position, PromptConfig, TriggerConfig, UpdateConfig, UpdateOperation,
  WorkflowDef,
};
use trellis_executor::collaborators::{CollaboratorError, PushChannel};
use trellis_executor::{Collaborators, ExecutionContext, ExecutorRegistry, OutcomeStatus};
use trellis_store::{
  InstanceStatus, NodeInstance, NodeStatus, SqliteStore, Store, WorkflowInstance, WorkflowRecord,
};
use trellis_template::{NodeOutput, NodeOutputs};

async fn store() -> SqliteStore {
  let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
  let store = SqliteStore::new(pool);
  store.migrate().await.unwrap();

  // Instances in these tests reference workflow "wf-1".
  let def = WorkflowDef {
    workflow_id: "wf-1".to_string(),
    name: "onboarding".to_string(),
    version: 1,
    company_id: None,
    active: true,
    nodes: vec![NodeDef {
      node_id: "n1".to_string(),
      label: None,
      description: None,
      logical_id: None,
      is_start_node: true,
      position: Position::default(),
      config: NodeConfig::Trigger(TriggerConfig::default()),
    }],
    connections: vec![],
  };
  store
    .create_workflow(&WorkflowRecord {
      workflow_id: "wf-1".to_string(),
      name: "onboarding".to_string(),
      version: 1,
      company_id: None,
      active: true,
      definition: Json(def),
      created_at: Utc::now(),
    })
    .await
    .unwrap();
  store
}

fn instance(created_by: Option<&str>) -> WorkflowInstance {
  let now = Utc::now();
  WorkflowInstance {
    instance_id: "inst-1".to_string(),
    workflow_id: "wf-1".to_string(),
    name: "onboarding_1".to_string(),
    status: InstanceStatus::Active,
    current_node_id: Some("n1".to_string()),
    data: Json(json!({})),
    assigned_to: None,
    created_by: created_by.map(str::to_string),
    created_at: now,
    updated_at: now,
    completed_at: None,
  }
}

fn node_instance(kind: NodeKind) -> NodeInstance {
  NodeInstance {
    node_instance_id: "ni-1".to_string(),
    instance_id: "inst-1".to_string(),
    node_id: "n1".to_string(),
    node_type: kind.as_str().to_string(),
    assigned_to: None,
    status: NodeStatus::InProgress,
    data: Json(json!({})),
    result: Json(json!({})),
    error_message: None,
    created_at: Utc::now(),
    started_at: Some(Utc::now()),
    completed_at: None,
  }
}

fn node_def(config: NodeConfig) -> NodeDef {
  NodeDef {
    node_id: "n1".to_string(),
    label: Some("Test node".to_string()),
    description: None,
    logical_id: None,
    is_start_node: false,
    position: Position::default(),
    config,
  }
}

async fn run(
  config: NodeConfig,
  created_by: Option<&str>,
  data: Value,
  outputs: NodeOutputs,
) -> trellis_executor::Outcome {
  let store = store().await;
  let instance = instance(created_by);
  store.create_instance(&instance).await.unwrap();
  let node = node_instance(config.kind());
  store.create_node_instance(&node).await.unwrap();
  let def = node_def(config);
  let collaborators = Collaborators::logging();
  let registry = ExecutorRegistry::standard();
  let executor = registry.get(def.kind()).unwrap();

  let ctx = ExecutionContext {
    store: &store,
    instance: &instance,
    node: &node,
    node_def: &def,
    data: &data,
    outputs: &outputs,
    collaborators: &collaborators,
  };
  executor.execute(&ctx).await.unwrap()
}

#[tokio::test]
async fn trigger_completes_with_payload_echo() {
  let outcome = run(
    NodeConfig::Trigger(Default::default()),
    None,
    json!({"customer": "Acme"}),
    NodeOutputs::new(),
  )
  .await;

  assert_eq!(outcome.status, OutcomeStatus::Completed);
  assert_eq!(outcome.result["triggered"], json!(true));
  assert_eq!(outcome.result["payload"]["customer"], json!("Acme"));
}

#[tokio::test]
async fn form_suspends_and_assigns_to_creator() {
  let outcome = run(
    NodeConfig::Form(FormConfig {
      form_fields: vec![FormField {
        name: "email".to_string(),
        label: None,
        field_type: "text".to_string(),
        required: true,
      }],
      assignee: None,
    }),
    Some("user-7"),
    json!({}),
    NodeOutputs::new(),
  )
  .await;

  assert_eq!(outcome.status, OutcomeStatus::WaitingUserInput);
  assert_eq!(outcome.result["assignee"], json!("user-7"));
}

#[tokio::test]
async fn approval_creates_pending_record_and_suspends() {
  let store = store().await;
  let instance = instance(Some("user-7"));
  store.create_instance(&instance).await.unwrap();
  let node = node_instance(NodeKind::Approval);
  store.create_node_instance(&node).await.unwrap();
  let def = node_def(NodeConfig::Approval(ApprovalConfig {
    approver_id: Some("manager-1".to_string()),
    approver_email: Some("manager@example.com".to_string()),
  }));
  let collaborators = Collaborators::logging();
  let registry = ExecutorRegistry::standard();
  let executor = registry.get(NodeKind::Approval).unwrap();

  let data = json!({});
  let outputs = NodeOutputs::new();
  let ctx = ExecutionContext {
    store: &store,
    instance: &instance,
    node: &node,
    node_def: &def,
    data: &data,
    outputs: &outputs,
    collaborators: &collaborators,
  };
  let outcome = executor.execute(&ctx).await.unwrap();

  assert_eq!(outcome.status, OutcomeStatus::WaitingUserInput);
  let approval_id = outcome.result["approvalId"].as_str().unwrap();
  let approval = store.get_approval(approval_id).await.unwrap();
  assert_eq!(approval.node_instance_id, "ni-1");
  assert_eq!(approval.approver_id.as_deref(), Some("manager-1"));
}

#[tokio::test]
async fn notification_without_recipient_completes_undelivered() {
  let outcome = run(
    NodeConfig::Notification(NotificationConfig {
      title: None,
      message: "hello".to_string(),
      recipient: None,
      send_email: false,
    }),
    None,
    json!({}),
    NodeOutputs::new(),
  )
  .await;

  assert_eq!(outcome.status, OutcomeStatus::Completed);
  assert_eq!(outcome.result["delivered"], json!(false));
}

/// Refuses every delivery, standing in for a push gateway outage.
struct RefusingPush;

#[async_trait]
impl PushChannel for RefusingPush {
  async fn notify(
    &self,
    _recipient: &str,
    _title: &str,
    _message: &str,
  ) -> Result<(), CollaboratorError> {
    Err(CollaboratorError::new("push gateway unreachable"))
  }
}

#[tokio::test]
async fn notification_completes_when_push_channel_is_down() {
  let store = store().await;
  let instance = instance(Some("user-7"));
  store.create_instance(&instance).await.unwrap();
  let node = node_instance(NodeKind::Notification);
  store.create_node_instance(&node).await.unwrap();
  let def = node_def(NodeConfig::Notification(NotificationConfig {
    title: None,
    message: "hello".to_string(),
    recipient: Some("user-1".to_string()),
    send_email: false,
  }));
  let collaborators = Collaborators {
    push: Arc::new(RefusingPush),
    ..Collaborators::logging()
  };
  let registry = ExecutorRegistry::standard();
  let executor = registry.get(NodeKind::Notification).unwrap();

  let data = json!({});
  let outputs = NodeOutputs::new();
  let ctx = ExecutionContext {
    store: &store,
    instance: &instance,
    node: &node,
    node_def: &def,
    data: &data,
    outputs: &outputs,
    collaborators: &collaborators,
  };
  let outcome = executor.execute(&ctx).await.unwrap();

  // Delivery is fire-and-forget; the outage is logged, not fatal.
  assert_eq!(outcome.status, OutcomeStatus::Completed);
  assert_eq!(outcome.result["delivered"], json!(false));
  let logs = store.list_logs("inst-1").await.unwrap();
  assert!(logs.iter().any(|l| l.message == "push delivery failed"));
}

#[tokio::test]
async fn http_transport_failure_fails_the_node_not_the_run_driver() {
  // Nothing listens on this port; the connection is refused outright.
  let outcome = run(
    NodeConfig::Api(HttpCallConfig {
      url: "http://127.0.0.1:9".to_string(),
      method: None,
      headers: Default::default(),
      body: None,
      authentication: None,
      timeout_ms: Some(2_000),
    }),
    None,
    json!({}),
    NodeOutputs::new(),
  )
  .await;

  assert_eq!(outcome.status, OutcomeStatus::Failed);
  assert!(outcome.error.unwrap().contains("127.0.0.1"));
}

#[tokio::test]
async fn notification_renders_placeholders_in_message() {
  let mut outputs = NodeOutputs::new();
  outputs.push(NodeOutput {
    ids: vec!["intake".to_string(), "form_1".to_string()],
    data: json!({"company": "Acme"}),
    result: json!({}),
  });

  let outcome = run(
    NodeConfig::Notification(NotificationConfig {
      title: Some("Welcome {{intake.company}}".to_string()),
      message: "Onboarding for {{intake.company}} started".to_string(),
      recipient: Some("user-1".to_string()),
      send_email: true,
    }),
    None,
    json!({}),
    outputs,
  )
  .await;

  assert_eq!(outcome.status, OutcomeStatus::Completed);
  assert_eq!(outcome.result["title"], json!("Welcome Acme"));
  assert_eq!(outcome.result["message"], json!("Onboarding for Acme started"));
  assert_eq!(outcome.result["emailSent"], json!(true));
}

#[tokio::test]
async fn prompt_fills_variables_and_node_outputs() {
  let mut outputs = NodeOutputs::new();
  outputs.push(NodeOutput {
    ids: vec!["research".to_string()],
    data: json!({}),
    result: json!({"summary": "strong fit"}),
  });

  let mut variables = BTreeMap::new();
  variables.insert("tone".to_string(), json!("friendly"));

  let outcome = run(
    NodeConfig::Prompt(PromptConfig {
      prompt: "Write a {{tone}} note. Context: {{research.summary}}".to_string(),
      variables,
      model: None,
    }),
    None,
    json!({}),
    outputs,
  )
  .await;

  assert_eq!(outcome.status, OutcomeStatus::Completed);
  // The echo model returns the fully rendered prompt.
  assert_eq!(
    outcome.result["response"],
    json!("Write a friendly note. Context: strong fit")
  );
}

#[tokio::test]
async fn update_writes_rendered_fields_through_crm() {
  let mut outputs = NodeOutputs::new();
  outputs.push(NodeOutput {
    ids: vec!["intake".to_string()],
    data: json!({"companyName": "Acme"}),
    result: json!({}),
  });

  let mut fields = BTreeMap::new();
  fields.insert("name".to_string(), json!("{{intake.companyName}}"));

  let outcome = run(
    NodeConfig::CrmUpdate(UpdateConfig {
      record_type: "account".to_string(),
      operation: UpdateOperation::Upsert,
      fields,
      match_field: Some("name".to_string()),
    }),
    None,
    json!({}),
    outputs,
  )
  .await;

  assert_eq!(outcome.status, OutcomeStatus::Completed);
  assert_eq!(outcome.result["record"]["name"], json!("Acme"));
  assert!(outcome.result["record"]["id"].is_string());
}

#[tokio::test]
async fn pdf_suspends_with_signing_link() {
  let outcome = run(
    NodeConfig::Pdf(trellis_config::PdfConfig {
      document_url: "https://docs.example.com/contract.pdf".to_string(),
      signer_email: Some("signer@example.com".to_string()),
      link_ttl_minutes: Some(60),
    }),
    None,
    json!({}),
    NodeOutputs::new(),
  )
  .await;

  assert_eq!(outcome.status, OutcomeStatus::WaitingUserInput);
  assert!(outcome.result["signingUrl"].as_str().unwrap().starts_with("local://sign/"));
  assert!(outcome.result["requestId"].is_string());
}
