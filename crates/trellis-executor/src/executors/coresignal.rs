use async_trait::async_trait;
use serde_json::json;
use trellis_config::NodeConfig;

use crate::{ExecutionContext, ExecutorError, NodeExecutor, Outcome};

/// Enriches the run with external company data looked up by query.
pub struct CoresignalAgentExecutor;

#[async_trait]
impl NodeExecutor for CoresignalAgentExecutor {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError> {
    let NodeConfig::CoresignalAgent(config) = &ctx.node_def.config else {
      return Err(ExecutorError::Configuration(
        "coresignal executor invoked for the wrong node kind".to_string(),
      ));
    };

    let query = ctx.render(&config.query);
    let company = ctx
      .collaborators
      .enrichment
      .lookup(&query, config.dataset.as_deref())
      .await?;

    Ok(Outcome::completed(json!({
      "query": query,
      "company": company,
    })))
  }
}
