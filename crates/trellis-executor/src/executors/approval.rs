use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use trellis_config::NodeConfig;
use trellis_store::{Approval, ApprovalStatus, LogLevel};

use crate::{ExecutionContext, ExecutorError, NodeExecutor, Outcome};

/// Handles approval and crmApproval nodes.
///
/// Creates a pending approval record, notifies the approver, and suspends
/// the run until a decision is recorded.
pub struct ApprovalExecutor;

#[async_trait]
impl NodeExecutor for ApprovalExecutor {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError> {
    let config = match &ctx.node_def.config {
      NodeConfig::Approval(config) | NodeConfig::CrmApproval(config) => config,
      _ => {
        return Err(ExecutorError::Configuration(
          "approval executor invoked for a non-approval node".to_string(),
        ));
      }
    };

    let approval = Approval {
      approval_id: uuid::Uuid::new_v4().to_string(),
      instance_id: ctx.instance.instance_id.clone(),
      node_instance_id: ctx.node.node_instance_id.clone(),
      approver_id: ctx.assignee_or_default(config.approver_id.as_deref()),
      approver_email: config.approver_email.clone(),
      node_type: ctx.node_def.kind().as_str().to_string(),
      status: ApprovalStatus::Pending,
      comments: None,
      decided_by: None,
      created_at: Utc::now(),
      decided_at: None,
    };
    ctx.store.create_approval(&approval).await?;

    let title = ctx
      .node_def
      .label
      .clone()
      .unwrap_or_else(|| "Approval requested".to_string());
    // The approval record is the source of truth; failed notification or
    // email delivery is logged and the run still suspends on the decision.
    if let Some(approver) = &approval.approver_id {
      if let Err(e) = ctx
        .collaborators
        .push
        .notify(approver, &title, "A workflow run is waiting for your approval")
        .await
      {
        warn!(approver = %approver, error = %e, "approval_notification_failed");
        ctx
          .log(
            LogLevel::Warn,
            "approval notification failed",
            &json!({ "approver": approver, "error": e.to_string() }),
          )
          .await?;
      }
    }
    if let Some(email) = &approval.approver_email {
      if let Err(e) = ctx
        .collaborators
        .mailer
        .send(
          email,
          &title,
          &format!(
            "Workflow '{}' is waiting for your approval.",
            ctx.instance.name
          ),
        )
        .await
      {
        warn!(email = %email, error = %e, "approval_email_failed");
        ctx
          .log(
            LogLevel::Warn,
            "approval email failed",
            &json!({ "email": email, "error": e.to_string() }),
          )
          .await?;
      }
    }

    info!(
      instance_id = %ctx.instance.instance_id,
      approval_id = %approval.approval_id,
      node_type = %approval.node_type,
      "approval_requested"
    );

    Ok(Outcome::waiting(json!({
      "approvalId": approval.approval_id,
      "approverId": approval.approver_id,
      "approverEmail": approval.approver_email,
    })))
  }
}
