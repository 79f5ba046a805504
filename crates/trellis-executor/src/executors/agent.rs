use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use trellis_config::NodeConfig;

use crate::{ExecutionContext, ExecutorError, NodeExecutor, Outcome};

/// Runs an AI agent step: one completion over the rendered prompt, with an
/// optional enhancement pass that reshapes the raw output.
pub struct AgentExecutor;

#[async_trait]
impl NodeExecutor for AgentExecutor {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError> {
    let NodeConfig::Agent(config) = &ctx.node_def.config else {
      return Err(ExecutorError::Configuration(
        "agent executor invoked for a non-agent node".to_string(),
      ));
    };

    let Some(prompt) = &config.prompt else {
      return Err(ExecutorError::Configuration(format!(
        "agent node '{}' has no prompt",
        ctx.node_def.node_id
      )));
    };

    let prompt = ctx.render(prompt);
    let model = config.model.as_deref();
    let mut response = ctx
      .collaborators
      .language_model
      .complete(&prompt, model)
      .await?;

    if let Some(enhancement) = &config.enhancement_prompt {
      let enhancement = ctx.render(enhancement);
      response = ctx
        .collaborators
        .language_model
        .complete(&format!("{}\n\n{}", enhancement, response), model)
        .await?;
    }

    info!(
      instance_id = %ctx.instance.instance_id,
      node_id = %ctx.node_def.node_id,
      agent_type = config.agent_type.as_deref().unwrap_or("default"),
      enhanced = config.enhancement_prompt.is_some(),
      "agent_completed"
    );

    Ok(Outcome::completed(json!({
      "response": response,
      "agentType": config.agent_type,
      "model": config.model,
    })))
  }
}
