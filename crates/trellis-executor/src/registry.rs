use std::collections::HashMap;
use std::sync::Arc;

use trellis_config::NodeKind;

use crate::NodeExecutor;
use crate::executors::{
  AgentExecutor, ApprovalExecutor, CoresignalAgentExecutor, FormExecutor, HttpCallExecutor,
  NotificationExecutor, PdfExecutor, PromptExecutor, TriggerExecutor, UpdateExecutor,
};

/// Maps each node kind to its executor.
#[derive(Default)]
pub struct ExecutorRegistry {
  executors: HashMap<NodeKind, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry covering every node kind with its standard executor.
  pub fn standard() -> Self {
    let client = reqwest::Client::new();
    let mut registry = Self::new();
    for kind in NodeKind::ALL {
      registry.register(kind, standard_executor(kind, &client));
    }
    registry
  }

  /// Register or replace the executor for a node kind.
  pub fn register(&mut self, kind: NodeKind, executor: Arc<dyn NodeExecutor>) {
    self.executors.insert(kind, executor);
  }

  pub fn get(&self, kind: NodeKind) -> Option<Arc<dyn NodeExecutor>> {
    self.executors.get(&kind).cloned()
  }
}

/// The stock executor for one node kind. The match is exhaustive: a new
/// kind cannot be added without wiring its executor here.
fn standard_executor(kind: NodeKind, client: &reqwest::Client) -> Arc<dyn NodeExecutor> {
  match kind {
    NodeKind::Trigger => Arc::new(TriggerExecutor),
    NodeKind::Form => Arc::new(FormExecutor),
    NodeKind::Approval | NodeKind::CrmApproval => Arc::new(ApprovalExecutor),
    NodeKind::Agent => Arc::new(AgentExecutor),
    NodeKind::CoresignalAgent => Arc::new(CoresignalAgentExecutor),
    NodeKind::Api => Arc::new(HttpCallExecutor::new(client.clone(), reqwest::Method::GET)),
    NodeKind::Webhook => Arc::new(HttpCallExecutor::new(client.clone(), reqwest::Method::POST)),
    NodeKind::Notification => Arc::new(NotificationExecutor),
    NodeKind::Update | NodeKind::CrmUpdate => Arc::new(UpdateExecutor),
    NodeKind::Prompt => Arc::new(PromptExecutor),
    NodeKind::Pdf => Arc::new(PdfExecutor),
  }
}
