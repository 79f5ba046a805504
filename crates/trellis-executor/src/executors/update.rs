use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use trellis_config::NodeConfig;

use crate::{ExecutionContext, ExecutorError, NodeExecutor, Outcome};

/// Handles update and crmUpdate nodes: resolves templated field values and
/// writes the record through the CRM collaborator.
pub struct UpdateExecutor;

#[async_trait]
impl NodeExecutor for UpdateExecutor {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError> {
    let config = match &ctx.node_def.config {
      NodeConfig::Update(config) | NodeConfig::CrmUpdate(config) => config,
      _ => {
        return Err(ExecutorError::Configuration(
          "update executor invoked for a non-update node".to_string(),
        ));
      }
    };

    let fields: BTreeMap<_, _> = config
      .fields
      .iter()
      .map(|(key, value)| (key.clone(), ctx.render_json(value)))
      .collect();

    let record = ctx
      .collaborators
      .crm
      .write_record(
        &config.record_type,
        config.operation,
        &fields,
        config.match_field.as_deref(),
      )
      .await?;

    info!(
      instance_id = %ctx.instance.instance_id,
      node_id = %ctx.node_def.node_id,
      record_type = %config.record_type,
      "crm_record_updated"
    );

    Ok(Outcome::completed(json!({
      "recordType": config.record_type,
      "operation": config.operation,
      "record": record,
    })))
  }
}
