use async_trait::async_trait;
use serde_json::json;
use tracing::warn;
use trellis_config::NodeConfig;
use trellis_store::LogLevel;

use crate::{ExecutionContext, ExecutorError, NodeExecutor, Outcome};

/// Sends an in-app notification, optionally mirrored to email.
pub struct NotificationExecutor;

#[async_trait]
impl NodeExecutor for NotificationExecutor {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError> {
    let NodeConfig::Notification(config) = &ctx.node_def.config else {
      return Err(ExecutorError::Configuration(
        "notification executor invoked for a non-notification node".to_string(),
      ));
    };

    let title = config
      .title
      .as_deref()
      .map(|t| ctx.render(t))
      .unwrap_or_else(|| "Workflow notification".to_string());
    let message = ctx.render(&config.message);

    let Some(recipient) = ctx.assignee_or_default(config.recipient.as_deref()) else {
      // No recipient anywhere on the run; record it and move on rather
      // than failing the whole workflow over a notification.
      ctx
        .log(
          LogLevel::Warn,
          "notification skipped, no recipient",
          &json!({ "title": title }),
        )
        .await?;
      return Ok(Outcome::completed(json!({
        "delivered": false,
        "title": title,
        "message": message,
      })));
    };

    // Delivery is fire-and-forget: a channel outage is logged on the run
    // and the node still completes.
    let delivered = match ctx
      .collaborators
      .push
      .notify(&recipient, &title, &message)
      .await
    {
      Ok(()) => true,
      Err(e) => {
        warn!(recipient = %recipient, error = %e, "push_delivery_failed");
        ctx
          .log(
            LogLevel::Warn,
            "push delivery failed",
            &json!({ "recipient": recipient, "error": e.to_string() }),
          )
          .await?;
        false
      }
    };
    let mut email_sent = false;
    if config.send_email {
      match ctx
        .collaborators
        .mailer
        .send(&recipient, &title, &message)
        .await
      {
        Ok(()) => email_sent = true,
        Err(e) => {
          warn!(recipient = %recipient, error = %e, "email_delivery_failed");
          ctx
            .log(
              LogLevel::Warn,
              "email delivery failed",
              &json!({ "recipient": recipient, "error": e.to_string() }),
            )
            .await?;
        }
      }
    }

    Ok(Outcome::completed(json!({
      "delivered": delivered,
      "recipient": recipient,
      "title": title,
      "message": message,
      "emailSent": email_sent,
    })))
  }
}
