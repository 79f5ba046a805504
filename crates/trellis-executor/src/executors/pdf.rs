use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};
use trellis_config::NodeConfig;
use trellis_store::LogLevel;

use crate::{ExecutionContext, ExecutorError, NodeExecutor, Outcome};

/// Sends a document out for signature and suspends the run until the signed
/// copy comes back.
pub struct PdfExecutor;

#[async_trait]
impl NodeExecutor for PdfExecutor {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError> {
    let NodeConfig::Pdf(config) = &ctx.node_def.config else {
      return Err(ExecutorError::Configuration(
        "pdf executor invoked for a non-pdf node".to_string(),
      ));
    };

    let document_url = ctx.render(&config.document_url);
    let signer_email = config.signer_email.as_deref().map(|e| ctx.render(e));

    let link = ctx
      .collaborators
      .signatures
      .create_signing_link(&document_url, signer_email.as_deref(), config.link_ttl_minutes)
      .await?;

    // The signing link already exists; an email failure is logged and the
    // run still suspends until the signed copy comes back.
    if let Some(email) = &signer_email {
      if let Err(e) = ctx
        .collaborators
        .mailer
        .send(
          email,
          "Document ready for signature",
          &format!("Please sign the document: {}", link.url),
        )
        .await
      {
        warn!(email = %email, error = %e, "signing_email_failed");
        ctx
          .log(
            LogLevel::Warn,
            "signing email failed",
            &json!({ "email": email, "error": e.to_string() }),
          )
          .await?;
      }
    }

    info!(
      instance_id = %ctx.instance.instance_id,
      node_id = %ctx.node_def.node_id,
      request_id = %link.request_id,
      "signature_requested"
    );

    Ok(Outcome::waiting(json!({
      "documentUrl": document_url,
      "signingUrl": link.url,
      "requestId": link.request_id,
      "signerEmail": signer_email,
    })))
  }
}
