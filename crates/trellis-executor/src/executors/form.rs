use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};
use trellis_config::NodeConfig;
use trellis_store::LogLevel;

use crate::{ExecutionContext, ExecutorError, NodeExecutor, Outcome};

/// Suspends the run until someone submits the configured form.
pub struct FormExecutor;

#[async_trait]
impl NodeExecutor for FormExecutor {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError> {
    let NodeConfig::Form(config) = &ctx.node_def.config else {
      return Err(ExecutorError::Configuration(
        "form executor invoked for a non-form node".to_string(),
      ));
    };

    let assignee = ctx.assignee_or_default(config.assignee.as_deref());
    if let Some(assignee) = &assignee {
      let title = ctx
        .node_def
        .label
        .clone()
        .unwrap_or_else(|| "Form task".to_string());
      // Notification delivery is fire-and-forget; the form task exists
      // either way and the run must still suspend on it.
      if let Err(e) = ctx
        .collaborators
        .push
        .notify(assignee, &title, "A workflow form is waiting for your input")
        .await
      {
        warn!(assignee = %assignee, error = %e, "form_notification_failed");
        ctx
          .log(
            LogLevel::Warn,
            "form notification failed",
            &json!({ "assignee": assignee, "error": e.to_string() }),
          )
          .await?;
      }
    }

    info!(
      instance_id = %ctx.instance.instance_id,
      node_id = %ctx.node_def.node_id,
      fields = config.form_fields.len(),
      "form_task_created"
    );

    Ok(Outcome::waiting(json!({
      "formFields": config.form_fields,
      "assignee": assignee,
    })))
  }
}
