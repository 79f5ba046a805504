use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::{ExecutionContext, ExecutorError, NodeExecutor, Outcome};

/// Entry node of every run. Completes immediately, passing the start payload
/// through as its result.
pub struct TriggerExecutor;

#[async_trait]
impl NodeExecutor for TriggerExecutor {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError> {
    let mut result = json!({
      "triggered": true,
      "triggeredAt": Utc::now().to_rfc3339(),
    });
    if let (Some(result_map), Some(payload)) = (result.as_object_mut(), ctx.data.as_object()) {
      result_map.insert("payload".to_string(), serde_json::Value::Object(payload.clone()));
    }
    Ok(Outcome::completed(result))
  }
}
