use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};
use trellis_config::{Authentication, HttpCallConfig, NodeConfig};

use crate::{ExecutionContext, ExecutorError, NodeExecutor, Outcome};

/// Handles api and webhook nodes.
///
/// The two kinds share a config; they differ only in default method. A
/// non-2xx response or a transport failure fails the node (and the run),
/// it is not an engine error.
pub struct HttpCallExecutor {
  client: reqwest::Client,
  default_method: reqwest::Method,
}

impl HttpCallExecutor {
  pub fn new(client: reqwest::Client, default_method: reqwest::Method) -> Self {
    Self {
      client,
      default_method,
    }
  }

  fn method(&self, config: &HttpCallConfig) -> Result<reqwest::Method, ExecutorError> {
    match &config.method {
      None => Ok(self.default_method.clone()),
      Some(m) => reqwest::Method::from_bytes(m.to_uppercase().as_bytes())
        .map_err(|_| ExecutorError::Configuration(format!("invalid http method '{}'", m))),
    }
  }
}

#[async_trait]
impl NodeExecutor for HttpCallExecutor {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError> {
    let config = match &ctx.node_def.config {
      NodeConfig::Api(config) | NodeConfig::Webhook(config) => config,
      _ => {
        return Err(ExecutorError::Configuration(
          "http executor invoked for a non-http node".to_string(),
        ));
      }
    };

    let url = ctx.render(&config.url);
    let method = self.method(config)?;

    let mut request = self.client.request(method.clone(), &url);
    for (name, value) in &config.headers {
      request = request.header(name.as_str(), ctx.render(value));
    }
    match &config.authentication {
      Some(Authentication::Bearer { token }) => {
        request = request.bearer_auth(ctx.render(token));
      }
      Some(Authentication::Basic { username, password }) => {
        request = request.basic_auth(ctx.render(username), Some(ctx.render(password)));
      }
      Some(Authentication::ApiKey {
        header_name,
        api_key,
      }) => {
        request = request.header(header_name.as_str(), ctx.render(api_key));
      }
      None => {}
    }
    if let Some(body) = &config.body {
      request = request.json(&ctx.render_json(body));
    }
    if let Some(timeout_ms) = config.timeout_ms {
      request = request.timeout(Duration::from_millis(timeout_ms));
    }

    info!(
      instance_id = %ctx.instance.instance_id,
      node_id = %ctx.node_def.node_id,
      method = %method,
      url = %url,
      "http_call_started"
    );

    let response = match request.send().await {
      Ok(response) => response,
      Err(e) => return Ok(transport_failure(ctx, &url, &e)),
    };
    let status = response.status();
    let text = match response.text().await {
      Ok(text) => text,
      Err(e) => return Ok(transport_failure(ctx, &url, &e)),
    };
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

    let result = json!({
      "status": status.as_u16(),
      "body": body,
    });

    if status.is_success() {
      Ok(Outcome::completed(result))
    } else {
      warn!(
        instance_id = %ctx.instance.instance_id,
        node_id = %ctx.node_def.node_id,
        status = status.as_u16(),
        "http_call_failed"
      );
      Ok(Outcome::failed(
        format!("request to {} returned {}", url, status),
        result,
      ))
    }
  }
}

/// Connection, DNS, timeout and body-read errors are failures of the call,
/// not of the engine.
fn transport_failure(ctx: &ExecutionContext<'_>, url: &str, error: &reqwest::Error) -> Outcome {
  warn!(
    instance_id = %ctx.instance.instance_id,
    node_id = %ctx.node_def.node_id,
    error = %error,
    "http_call_failed"
  );
  Outcome::failed(
    format!("request to {} failed: {}", url, error),
    json!({ "url": url }),
  )
}
