use async_trait::async_trait;
use serde_json::{Map, json};
use trellis_config::NodeConfig;
use trellis_template::{flatten_value, render_variables};

use crate::{ExecutionContext, ExecutorError, NodeExecutor, Outcome};

/// Renders a prompt template and sends it to the language model.
///
/// Two resolution passes run over the template: bare `{{variable}}` tokens
/// are filled from the configured variables plus the flattened outputs of
/// completed nodes, then `{{logicalId.path}}` tokens are resolved against
/// node outputs.
pub struct PromptExecutor;

#[async_trait]
impl NodeExecutor for PromptExecutor {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError> {
    let NodeConfig::Prompt(config) = &ctx.node_def.config else {
      return Err(ExecutorError::Configuration(
        "prompt executor invoked for a non-prompt node".to_string(),
      ));
    };

    let mut variables = Map::new();
    for output in ctx.outputs.iter() {
      flatten_value(&output.data, "", &mut variables);
      flatten_value(&output.result, "", &mut variables);
    }
    // Configured variables win over harvested outputs.
    for (key, value) in &config.variables {
      variables.insert(key.clone(), ctx.render_json(value));
    }

    let prompt = ctx.render(&render_variables(&config.prompt, &variables));
    let response = ctx
      .collaborators
      .language_model
      .complete(&prompt, config.model.as_deref())
      .await?;

    Ok(Outcome::completed(json!({
      "prompt": prompt,
      "response": response,
      "model": config.model,
    })))
  }
}
