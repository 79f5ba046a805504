//! The workflow orchestrator.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{error, info, instrument};
use trellis_config::{NodeDef, NodeKind, WorkflowDef};
use trellis_executor::{Collaborators, ExecutionContext, ExecutorRegistry, OutcomeStatus};
use trellis_store::{
  ApprovalStatus, ExecutionLogEntry, InstanceStatus, LogLevel, NodeInstance, NodeStatus, Store,
  WorkflowInstance, WorkflowRecord,
};
use trellis_template::{NodeOutput, NodeOutputs};
use trellis_workflow::Workflow;

use crate::error::EngineError;
use crate::events::{Correlation, EventNotifier, NoopNotifier, WorkflowEvent};

/// Snapshot of one run: the instance row, its node instances in creation
/// order, and its execution log.
#[derive(Debug, Clone)]
pub struct WorkflowStatus {
  pub instance: WorkflowInstance,
  pub nodes: Vec<NodeInstance>,
  pub logs: Vec<ExecutionLogEntry>,
}

/// The workflow execution engine.
///
/// Walks a run's graph through one explicit driver loop: execute the current
/// node, persist the transition, then either advance the durable
/// `current_node_id` pointer, park on a suspension, or terminate the run.
/// There is no recursion and no fire-and-forget chaining; callers get
/// control back as soon as the run suspends or reaches a terminal state.
pub struct WorkflowEngine<N: EventNotifier = NoopNotifier> {
  store: Arc<dyn Store>,
  registry: Arc<ExecutorRegistry>,
  collaborators: Collaborators,
  notifier: Arc<N>,
}

impl WorkflowEngine<NoopNotifier> {
  /// Engine that discards events. Use [`WorkflowEngine::with_notifier`] to
  /// observe run progress.
  pub fn new(
    store: Arc<dyn Store>,
    registry: ExecutorRegistry,
    collaborators: Collaborators,
  ) -> Self {
    Self::with_notifier(store, registry, collaborators, NoopNotifier)
  }
}

impl<N: EventNotifier> WorkflowEngine<N> {
  pub fn with_notifier(
    store: Arc<dyn Store>,
    registry: ExecutorRegistry,
    collaborators: Collaborators,
    notifier: N,
  ) -> Self {
    Self {
      store,
      registry: Arc::new(registry),
      collaborators,
      notifier: Arc::new(notifier),
    }
  }

  /// Validate and register a workflow definition.
  pub async fn register_workflow(&self, def: WorkflowDef) -> Result<WorkflowRecord, EngineError> {
    Workflow::load(def.clone())?;

    let record = WorkflowRecord {
      workflow_id: if def.workflow_id.is_empty() {
        uuid::Uuid::new_v4().to_string()
      } else {
        def.workflow_id.clone()
      },
      name: def.name.clone(),
      version: def.version,
      company_id: def.company_id.clone(),
      active: def.active,
      definition: sqlx_json(def),
      created_at: Utc::now(),
    };
    self.store.create_workflow(&record).await?;

    info!(workflow_id = %record.workflow_id, name = %record.name, "workflow_registered");
    Ok(record)
  }

  /// Start a run of the newest active workflow with the given name.
  ///
  /// Creates the instance and the start node's instance, then drives the
  /// chain until it suspends or terminates. The returned instance reflects
  /// the state at that point.
  #[instrument(skip(self, payload), fields(workflow = %name))]
  pub async fn start_workflow(
    &self,
    name: &str,
    payload: Value,
    created_by: Option<&str>,
  ) -> Result<WorkflowInstance, EngineError> {
    let record = self
      .store
      .find_workflow_by_name(name)
      .await?
      .ok_or_else(|| EngineError::WorkflowNotFound(name.to_string()))?;
    let workflow = Workflow::load(record.definition.0.clone())?;

    let instance_id = uuid::Uuid::new_v4().to_string();
    let start = workflow.start_node();
    let now = Utc::now();
    let instance = WorkflowInstance {
      instance_id: instance_id.clone(),
      workflow_id: record.workflow_id.clone(),
      name: format!("{} run {}", record.name, &instance_id[..8]),
      status: InstanceStatus::Active,
      current_node_id: Some(start.node_id.clone()),
      data: sqlx_json(as_object(payload)),
      assigned_to: None,
      created_by: created_by.map(str::to_string),
      created_at: now,
      updated_at: now,
      completed_at: None,
    };
    self.store.create_instance(&instance).await?;
    self
      .create_node_instance(&instance, start, json!({}))
      .await?;

    self
      .store
      .append_log(
        &instance_id,
        None,
        LogLevel::Info,
        "workflow started",
        &json!({ "workflowId": record.workflow_id, "startNodeId": start.node_id }),
      )
      .await?;
    self.notifier.notify(WorkflowEvent::WorkflowStarted {
      instance_id: instance_id.clone(),
      workflow_id: record.workflow_id.clone(),
    });

    self.drive(&instance_id).await
  }

  /// Resume a suspended run with external data, whatever kind of node it is
  /// parked on.
  pub async fn continue_workflow(
    &self,
    instance_id: &str,
    resume_data: Value,
  ) -> Result<WorkflowInstance, EngineError> {
    let instance = self.store.get_instance(instance_id).await?;
    let node_id = current_waiting_node(&instance)?;
    let node = self
      .store
      .find_node_instance(instance_id, &node_id)
      .await?
      .ok_or_else(|| {
        EngineError::InvalidState(format!(
          "instance '{}' has no node instance for current node '{}'",
          instance_id, node_id
        ))
      })?;
    self.resume_node(&node, &[], resume_data).await
  }

  /// Deliver a form submission to a suspended form node.
  ///
  /// Validates that every required field of the form's configuration is
  /// present before completing the node.
  pub async fn submit_form(
    &self,
    node_instance_id: &str,
    submission: Value,
    submitted_by: Option<&str>,
  ) -> Result<WorkflowInstance, EngineError> {
    let node = self.store.get_node_instance(node_instance_id).await?;
    let workflow = self.workflow_for(&node.instance_id).await?;
    let node_def = workflow.node(&node.node_id).ok_or_else(|| {
      EngineError::InvalidState(format!("node '{}' is not part of the workflow", node.node_id))
    })?;

    if let trellis_config::NodeConfig::Form(config) = &node_def.config {
      let fields = submission.as_object();
      for field in config.form_fields.iter().filter(|f| f.required) {
        let present = fields
          .and_then(|map| map.get(&field.name))
          .is_some_and(|v| !v.is_null());
        if !present {
          return Err(EngineError::MissingField {
            node_id: node.node_id.clone(),
            field: field.name.clone(),
          });
        }
      }
    }

    let resume_data = json!({
      "formData": submission,
      "submittedBy": submitted_by,
      "submittedAt": Utc::now().to_rfc3339(),
    });
    self.resume_node(&node, &[NodeKind::Form], resume_data).await
  }

  /// Record an approval decision and resume the run.
  ///
  /// The decision, approved or rejected, completes the node; downstream
  /// nodes see it in the node's result and act on it.
  pub async fn submit_approval_decision(
    &self,
    approval_id: &str,
    approved: bool,
    comments: Option<&str>,
    decided_by: Option<&str>,
  ) -> Result<WorkflowInstance, EngineError> {
    let approval = self.store.get_approval(approval_id).await?;
    if approval.status != ApprovalStatus::Pending {
      return Err(EngineError::InvalidState(format!(
        "approval '{}' has already been decided",
        approval_id
      )));
    }

    let status = if approved {
      ApprovalStatus::Approved
    } else {
      ApprovalStatus::Rejected
    };
    self
      .store
      .decide_approval(approval_id, status, comments, decided_by)
      .await?;

    let node = self
      .store
      .get_node_instance(&approval.node_instance_id)
      .await?;
    let resume_data = json!({
      "approved": approved,
      "decision": if approved { "approved" } else { "rejected" },
      "comments": comments,
      "decidedBy": decided_by,
      "decidedAt": Utc::now().to_rfc3339(),
    });
    self
      .resume_node(&node, &[NodeKind::Approval, NodeKind::CrmApproval], resume_data)
      .await
  }

  /// Deliver a signed document to a suspended pdf node.
  pub async fn submit_signed_document(
    &self,
    node_instance_id: &str,
    signed_document_url: &str,
    signed_by: Option<&str>,
  ) -> Result<WorkflowInstance, EngineError> {
    let node = self.store.get_node_instance(node_instance_id).await?;
    let resume_data = json!({
      "signed": true,
      "signedDocumentUrl": signed_document_url,
      "signedBy": signed_by,
      "signedAt": Utc::now().to_rfc3339(),
    });
    self.resume_node(&node, &[NodeKind::Pdf], resume_data).await
  }

  /// Snapshot a run's state for callers polling for its outcome.
  pub async fn get_workflow_status(&self, instance_id: &str) -> Result<WorkflowStatus, EngineError> {
    let instance = self.store.get_instance(instance_id).await?;
    let nodes = self.store.list_node_instances(instance_id).await?;
    let logs = self.store.list_logs(instance_id).await?;
    Ok(WorkflowStatus {
      instance,
      nodes,
      logs,
    })
  }

  /// Complete a waiting node with resume data and drive the chain onward.
  async fn resume_node(
    &self,
    node: &NodeInstance,
    expected_kinds: &[NodeKind],
    resume_data: Value,
  ) -> Result<WorkflowInstance, EngineError> {
    let instance = self.store.get_instance(&node.instance_id).await?;
    if instance.status != InstanceStatus::Active {
      return Err(EngineError::InvalidState(format!(
        "instance '{}' is not active",
        instance.instance_id
      )));
    }
    if instance.current_node_id.as_deref() != Some(node.node_id.as_str()) {
      return Err(EngineError::InvalidState(format!(
        "node '{}' is not the instance's current node",
        node.node_id
      )));
    }
    if node.status != NodeStatus::WaitingUserInput {
      return Err(EngineError::InvalidState(format!(
        "node instance '{}' is not waiting for input",
        node.node_instance_id
      )));
    }

    if !expected_kinds.is_empty() {
      let workflow = self.workflow_for(&node.instance_id).await?;
      let kind = workflow
        .node(&node.node_id)
        .map(NodeDef::kind)
        .ok_or_else(|| {
          EngineError::InvalidState(format!("node '{}' is not part of the workflow", node.node_id))
        })?;
      if !expected_kinds.contains(&kind) {
        return Err(EngineError::InvalidState(format!(
          "node '{}' is a {} node, which this resume surface does not handle",
          node.node_id, kind
        )));
      }
    }

    let data = merge_objects(&node.data.0, &resume_data);
    let result = merge_objects(&node.result.0, &resume_data);
    self
      .store
      .update_node_instance(
        &node.node_instance_id,
        NodeStatus::Completed,
        Some(&data),
        Some(&result),
        None,
      )
      .await?;
    self
      .store
      .append_log(
        &node.instance_id,
        Some(&node.node_instance_id),
        LogLevel::Info,
        "node resumed",
        &resume_data,
      )
      .await?;
    self.notifier.notify(WorkflowEvent::NodeCompleted {
      instance_id: node.instance_id.clone(),
      node_id: node.node_id.clone(),
    });

    self.drive(&node.instance_id).await
  }

  /// The driver loop. Executes the current node, persists the outcome, and
  /// advances until the run suspends or terminates.
  #[instrument(skip(self), fields(instance_id = %instance_id))]
  async fn drive(&self, instance_id: &str) -> Result<WorkflowInstance, EngineError> {
    let workflow = self.workflow_for(instance_id).await?;

    loop {
      let instance = self.store.get_instance(instance_id).await?;
      if instance.status.is_terminal() {
        return Ok(instance);
      }
      let Some(node_id) = instance.current_node_id.clone() else {
        return Ok(instance);
      };
      let node_def = workflow.node(&node_id).ok_or_else(|| {
        EngineError::InvalidState(format!(
          "current node '{}' is not part of workflow '{}'",
          node_id,
          workflow.name()
        ))
      })?;
      let node = self
        .store
        .find_node_instance(instance_id, &node_id)
        .await?
        .ok_or_else(|| {
          EngineError::InvalidState(format!(
            "no node instance for current node '{}'",
            node_id
          ))
        })?;

      match node.status {
        NodeStatus::WaitingUserInput | NodeStatus::Failed => return Ok(instance),
        NodeStatus::Completed => {
          // Resume already completed this node; advance past it. Also
          // covers a crash between node completion and pointer update.
          self
            .advance(&workflow, &instance, node_def, &node.result.0)
            .await?;
          continue;
        }
        NodeStatus::Pending | NodeStatus::InProgress => {}
      }

      let merged = node_input(&instance, &node, node_def);
      self
        .store
        .update_node_instance(
          &node.node_instance_id,
          NodeStatus::InProgress,
          Some(&merged),
          None,
          None,
        )
        .await?;
      self.notifier.notify(WorkflowEvent::NodeStarted {
        instance_id: instance_id.to_string(),
        node_id: node_id.clone(),
        node_type: node_def.kind().as_str().to_string(),
      });

      let node = self.store.get_node_instance(&node.node_instance_id).await?;
      let outputs = self.collect_outputs(&workflow, instance_id).await?;
      let Some(executor) = self.registry.get(node_def.kind()) else {
        // Fatal for the run: persist the failure so the instance does not
        // hang with an in_progress node nothing can resume.
        let message = format!("unsupported node type '{}'", node_def.kind());
        self
          .store
          .update_node_instance(
            &node.node_instance_id,
            NodeStatus::Failed,
            None,
            None,
            Some(&message),
          )
          .await?;
        self.fail_run(&instance, &node, &message).await?;
        return Err(EngineError::UnsupportedNodeType(
          node_def.kind().as_str().to_string(),
        ));
      };

      let ctx = ExecutionContext {
        store: self.store.as_ref(),
        instance: &instance,
        node: &node,
        node_def,
        data: &merged,
        outputs: &outputs,
        collaborators: &self.collaborators,
      };
      let outcome = match executor.execute(&ctx).await {
        Ok(outcome) => outcome,
        Err(e) => {
          // Unexpected executor error: persist the failure, then surface
          // the error to the caller that drove this step.
          let message = e.to_string();
          self
            .store
            .update_node_instance(
              &node.node_instance_id,
              NodeStatus::Failed,
              None,
              None,
              Some(&message),
            )
            .await?;
          self.fail_run(&instance, &node, &message).await?;
          return Err(e.into());
        }
      };

      match outcome.status {
        OutcomeStatus::Completed => {
          self
            .store
            .update_node_instance(
              &node.node_instance_id,
              NodeStatus::Completed,
              outcome.data.as_ref(),
              Some(&outcome.result),
              None,
            )
            .await?;
          self
            .store
            .append_log(
              instance_id,
              Some(&node.node_instance_id),
              LogLevel::Info,
              "node completed",
              &outcome.result,
            )
            .await?;
          self.notifier.notify(WorkflowEvent::NodeCompleted {
            instance_id: instance_id.to_string(),
            node_id: node_id.clone(),
          });
          self
            .advance(&workflow, &instance, node_def, &outcome.result)
            .await?;
        }
        OutcomeStatus::WaitingUserInput => {
          self
            .store
            .update_node_instance(
              &node.node_instance_id,
              NodeStatus::WaitingUserInput,
              None,
              Some(&outcome.result),
              None,
            )
            .await?;
          self
            .store
            .append_log(
              instance_id,
              Some(&node.node_instance_id),
              LogLevel::Info,
              "node waiting for user input",
              &outcome.result,
            )
            .await?;
          self.notifier.notify(WorkflowEvent::NodeWaiting {
            instance_id: instance_id.to_string(),
            node_id: node_id.clone(),
            node_type: node_def.kind().as_str().to_string(),
          });
          return self.store.get_instance(instance_id).await.map_err(Into::into);
        }
        OutcomeStatus::Failed => {
          let message = outcome
            .error
            .unwrap_or_else(|| "node execution failed".to_string());
          self
            .store
            .update_node_instance(
              &node.node_instance_id,
              NodeStatus::Failed,
              None,
              Some(&outcome.result),
              Some(&message),
            )
            .await?;
          self.fail_run(&instance, &node, &message).await?;
          return self.store.get_instance(instance_id).await.map_err(Into::into);
        }
      }
    }
  }

  /// Move the run past a completed node: merge its result into the run's
  /// data, then either create the successor's node instance or finish.
  async fn advance(
    &self,
    workflow: &Workflow,
    instance: &WorkflowInstance,
    node_def: &NodeDef,
    result: &Value,
  ) -> Result<(), EngineError> {
    let data = merge_objects(&instance.data.0, result);

    match workflow.successor(&node_def.node_id) {
      Some(next) => {
        // Idempotency guard: a retried resume delivery must not create a
        // second instance of the same downstream node.
        let existing = self
          .store
          .find_node_instance(&instance.instance_id, &next.node_id)
          .await?;
        if existing.is_none() {
          let incoming = json!({
            "previousNodeId": node_def.node_id,
            "previousNodeType": node_def.kind().as_str(),
            "previousNodeResult": result,
          });
          self.create_node_instance(instance, next, incoming).await?;
        }
        self
          .store
          .update_instance(
            &instance.instance_id,
            InstanceStatus::Active,
            Some(&next.node_id),
            &data,
            None,
          )
          .await?;
      }
      None => {
        self
          .store
          .update_instance(
            &instance.instance_id,
            InstanceStatus::Completed,
            None,
            &data,
            Some(Utc::now()),
          )
          .await?;
        self
          .store
          .append_log(
            &instance.instance_id,
            None,
            LogLevel::Info,
            "workflow completed",
            &json!({ "finalNodeId": node_def.node_id }),
          )
          .await?;
        info!(instance_id = %instance.instance_id, "workflow_completed");
        self.notifier.notify(WorkflowEvent::WorkflowCompleted {
          instance_id: instance.instance_id.clone(),
          correlation: Correlation::from_data(&data),
        });
      }
    }
    Ok(())
  }

  /// Terminate the run as failed and emit the failure event.
  async fn fail_run(
    &self,
    instance: &WorkflowInstance,
    node: &NodeInstance,
    message: &str,
  ) -> Result<(), EngineError> {
    self
      .store
      .update_instance(
        &instance.instance_id,
        InstanceStatus::Failed,
        None,
        &instance.data.0,
        Some(Utc::now()),
      )
      .await?;
    self
      .store
      .append_log(
        &instance.instance_id,
        Some(&node.node_instance_id),
        LogLevel::Error,
        "workflow failed",
        &json!({ "nodeId": node.node_id, "error": message }),
      )
      .await?;
    error!(instance_id = %instance.instance_id, node_id = %node.node_id, error = %message, "workflow_failed");
    self.notifier.notify(WorkflowEvent::NodeFailed {
      instance_id: instance.instance_id.clone(),
      node_id: node.node_id.clone(),
      error: message.to_string(),
    });
    self.notifier.notify(WorkflowEvent::WorkflowFailed {
      instance_id: instance.instance_id.clone(),
      error: message.to_string(),
      correlation: Correlation::from_data(&instance.data.0),
    });
    Ok(())
  }

  async fn create_node_instance(
    &self,
    instance: &WorkflowInstance,
    node_def: &NodeDef,
    data: Value,
  ) -> Result<NodeInstance, EngineError> {
    let node = NodeInstance {
      node_instance_id: uuid::Uuid::new_v4().to_string(),
      instance_id: instance.instance_id.clone(),
      node_id: node_def.node_id.clone(),
      node_type: node_def.kind().as_str().to_string(),
      assigned_to: instance.assigned_to.clone(),
      status: NodeStatus::Pending,
      data: sqlx_json(data),
      result: sqlx_json(json!({})),
      error_message: None,
      created_at: Utc::now(),
      started_at: None,
      completed_at: None,
    };
    self.store.create_node_instance(&node).await?;
    Ok(node)
  }

  /// Addressable outputs of the run's completed nodes, keyed by logical id
  /// and graph-local node id, for the placeholder resolver.
  async fn collect_outputs(
    &self,
    workflow: &Workflow,
    instance_id: &str,
  ) -> Result<NodeOutputs, EngineError> {
    let mut outputs = NodeOutputs::new();
    for node in self.store.list_node_instances(instance_id).await? {
      if node.status != NodeStatus::Completed {
        continue;
      }
      let mut ids = Vec::new();
      if let Some(def) = workflow.node(&node.node_id) {
        if let Some(logical_id) = &def.logical_id {
          ids.push(logical_id.clone());
        }
      }
      ids.push(node.node_id.clone());
      outputs.push(NodeOutput {
        ids,
        data: node.data.0,
        result: node.result.0,
      });
    }
    Ok(outputs)
  }

  async fn workflow_for(&self, instance_id: &str) -> Result<Workflow, EngineError> {
    let instance = self.store.get_instance(instance_id).await?;
    let record = self.store.get_workflow(&instance.workflow_id).await?;
    Ok(Workflow::load(record.definition.0)?)
  }
}

/// The input a node sees: the run's accumulated data, this node's incoming
/// data, and the engine's bookkeeping keys, in that precedence order.
fn node_input(instance: &WorkflowInstance, node: &NodeInstance, node_def: &NodeDef) -> Value {
  let mut merged = merge_objects(&instance.data.0, &node.data.0);
  if let Some(map) = merged.as_object_mut() {
    map.insert("currentNodeId".to_string(), json!(node.node_id));
    map.insert("nodeType".to_string(), json!(node_def.kind().as_str()));
  }
  merged
}

/// Shallow merge of two JSON objects, last write wins per key.
fn merge_objects(base: &Value, extra: &Value) -> Value {
  let mut merged = match base {
    Value::Object(map) => map.clone(),
    _ => serde_json::Map::new(),
  };
  if let Value::Object(map) = extra {
    for (key, value) in map {
      merged.insert(key.clone(), value.clone());
    }
  }
  Value::Object(merged)
}

/// Start payloads may be any JSON; non-objects are kept under a `payload`
/// key so the merge semantics stay uniform.
fn as_object(payload: Value) -> Value {
  match payload {
    Value::Object(_) => payload,
    Value::Null => json!({}),
    other => json!({ "payload": other }),
  }
}

fn current_waiting_node(instance: &WorkflowInstance) -> Result<String, EngineError> {
  if instance.status != InstanceStatus::Active {
    return Err(EngineError::InvalidState(format!(
      "instance '{}' is not active",
      instance.instance_id
    )));
  }
  instance.current_node_id.clone().ok_or_else(|| {
    EngineError::InvalidState(format!(
      "instance '{}' has no current node to resume",
      instance.instance_id
    ))
  })
}

fn sqlx_json<T>(value: T) -> sqlx::types::Json<T> {
  sqlx::types::Json(value)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn merge_objects_is_last_write_wins() {
    let merged = merge_objects(&json!({"a": 1, "b": 2}), &json!({"b": 3, "c": 4}));
    assert_eq!(merged, json!({"a": 1, "b": 3, "c": 4}));
  }

  #[test]
  fn non_object_payloads_are_wrapped() {
    assert_eq!(as_object(json!([1, 2])), json!({"payload": [1, 2]}));
    assert_eq!(as_object(Value::Null), json!({}));
    assert_eq!(as_object(json!({"x": 1})), json!({"x": 1}));
  }
}
