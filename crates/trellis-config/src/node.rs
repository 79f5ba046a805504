use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth::Authentication;

/// The closed set of node kinds the engine can execute.
///
/// Serialized values match the `type` tags used by stored definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
  #[serde(rename = "triggerNode")]
  Trigger,
  #[serde(rename = "formNode")]
  Form,
  #[serde(rename = "approvalNode")]
  Approval,
  #[serde(rename = "crmApprovalNode")]
  CrmApproval,
  #[serde(rename = "agentNode")]
  Agent,
  #[serde(rename = "coresignalAgentNode")]
  CoresignalAgent,
  #[serde(rename = "apiNode")]
  Api,
  #[serde(rename = "webhookNode")]
  Webhook,
  #[serde(rename = "notificationNode")]
  Notification,
  #[serde(rename = "updateNode")]
  Update,
  #[serde(rename = "crmUpdateNode")]
  CrmUpdate,
  #[serde(rename = "promptNode")]
  Prompt,
  #[serde(rename = "pdfNode")]
  Pdf,
}

impl NodeKind {
  /// Every node kind, in declaration order. Dispatch tables iterate this
  /// instead of maintaining their own lists.
  pub const ALL: [NodeKind; 13] = [
    NodeKind::Trigger,
    NodeKind::Form,
    NodeKind::Approval,
    NodeKind::CrmApproval,
    NodeKind::Agent,
    NodeKind::CoresignalAgent,
    NodeKind::Api,
    NodeKind::Webhook,
    NodeKind::Notification,
    NodeKind::Update,
    NodeKind::CrmUpdate,
    NodeKind::Prompt,
    NodeKind::Pdf,
  ];

  /// The wire/database representation of this kind.
  pub fn as_str(&self) -> &'static str {
    match self {
      NodeKind::Trigger => "triggerNode",
      NodeKind::Form => "formNode",
      NodeKind::Approval => "approvalNode",
      NodeKind::CrmApproval => "crmApprovalNode",
      NodeKind::Agent => "agentNode",
      NodeKind::CoresignalAgent => "coresignalAgentNode",
      NodeKind::Api => "apiNode",
      NodeKind::Webhook => "webhookNode",
      NodeKind::Notification => "notificationNode",
      NodeKind::Update => "updateNode",
      NodeKind::CrmUpdate => "crmUpdateNode",
      NodeKind::Prompt => "promptNode",
      NodeKind::Pdf => "pdfNode",
    }
  }
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Canvas position, layout only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
  #[serde(default)]
  pub x: f64,
  #[serde(default)]
  pub y: f64,
}

/// One node of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
  /// Graph-local identifier, referenced by connections.
  pub node_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Stable human-assigned identifier used by placeholder templates.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub logical_id: Option<String>,
  /// Exactly one node per graph carries this flag.
  #[serde(default)]
  pub is_start_node: bool,
  #[serde(default)]
  pub position: Position,
  #[serde(flatten)]
  pub config: NodeConfig,
}

impl NodeDef {
  pub fn kind(&self) -> NodeKind {
    self.config.kind()
  }
}

/// Type-specific node configuration, tagged by the node `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeConfig {
  #[serde(rename = "triggerNode")]
  Trigger(TriggerConfig),
  #[serde(rename = "formNode")]
  Form(FormConfig),
  #[serde(rename = "approvalNode")]
  Approval(ApprovalConfig),
  #[serde(rename = "crmApprovalNode")]
  CrmApproval(ApprovalConfig),
  #[serde(rename = "agentNode")]
  Agent(AgentConfig),
  #[serde(rename = "coresignalAgentNode")]
  CoresignalAgent(CoresignalAgentConfig),
  #[serde(rename = "apiNode")]
  Api(HttpCallConfig),
  #[serde(rename = "webhookNode")]
  Webhook(HttpCallConfig),
  #[serde(rename = "notificationNode")]
  Notification(NotificationConfig),
  #[serde(rename = "updateNode")]
  Update(UpdateConfig),
  #[serde(rename = "crmUpdateNode")]
  CrmUpdate(UpdateConfig),
  #[serde(rename = "promptNode")]
  Prompt(PromptConfig),
  #[serde(rename = "pdfNode")]
  Pdf(PdfConfig),
}

impl NodeConfig {
  pub fn kind(&self) -> NodeKind {
    match self {
      NodeConfig::Trigger(_) => NodeKind::Trigger,
      NodeConfig::Form(_) => NodeKind::Form,
      NodeConfig::Approval(_) => NodeKind::Approval,
      NodeConfig::CrmApproval(_) => NodeKind::CrmApproval,
      NodeConfig::Agent(_) => NodeKind::Agent,
      NodeConfig::CoresignalAgent(_) => NodeKind::CoresignalAgent,
      NodeConfig::Api(_) => NodeKind::Api,
      NodeConfig::Webhook(_) => NodeKind::Webhook,
      NodeConfig::Notification(_) => NodeKind::Notification,
      NodeConfig::Update(_) => NodeKind::Update,
      NodeConfig::CrmUpdate(_) => NodeKind::CrmUpdate,
      NodeConfig::Prompt(_) => NodeKind::Prompt,
      NodeConfig::Pdf(_) => NodeKind::Pdf,
    }
  }
}

/// Trigger nodes carry no execution config; they pass the start payload on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trigger_type: Option<String>,
}

/// A single field of a form node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(rename = "type", default = "default_field_type")]
  pub field_type: String,
  #[serde(default)]
  pub required: bool,
}

fn default_field_type() -> String {
  "text".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
  #[serde(default)]
  pub form_fields: Vec<FormField>,
  /// User the form task is assigned to; falls back to the run's creator.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assignee: Option<String>,
}

/// Shared by approval and crmApproval nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub approver_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub approver_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub agent_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub prompt: Option<String>,
  /// Optional second pass that reshapes the raw agent output.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub enhancement_prompt: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoresignalAgentConfig {
  /// Lookup term; may contain placeholder templates.
  pub query: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dataset: Option<String>,
}

/// Shared by api and webhook nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpCallConfig {
  pub url: String,
  /// Defaults to GET for api nodes and POST for webhook nodes.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub method: Option<String>,
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub authentication: Option<Authentication>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  /// May contain placeholder templates.
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recipient: Option<String>,
  /// Also deliver the notification through the transactional mailer.
  #[serde(default)]
  pub send_email: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOperation {
  Create,
  Update,
  #[default]
  Upsert,
}

/// Shared by update and crmUpdate nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfig {
  /// CRM record type to materialize (account, contact, opportunity, ...).
  pub record_type: String,
  #[serde(default)]
  pub operation: UpdateOperation,
  /// Field values; string values may contain placeholder templates.
  #[serde(default)]
  pub fields: BTreeMap<String, serde_json::Value>,
  /// Field used by the CRM collaborator for duplicate matching.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub match_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
  /// Template with `{{variable}}` and `{{logicalId.field}}` tokens.
  pub prompt: String,
  #[serde(default)]
  pub variables: BTreeMap<String, serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfConfig {
  /// Document to be signed; may contain placeholder templates.
  pub document_url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub signer_email: Option<String>,
  /// Expiry of the signing link itself, not of the suspended node.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub link_ttl_minutes: Option<u64>,
}
