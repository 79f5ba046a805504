//! Traits for the external services node executors call out to.
//!
//! The engine itself only needs these seams; deployments wire in real
//! integrations (SMTP, a CRM backend, an LLM provider, an e-signature
//! vendor). The default implementations log the interaction and return a
//! local stand-in result so a full run can complete offline.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;
use trellis_config::UpdateOperation;

/// Error reported by a collaborator implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
  pub fn new(message: impl Into<String>) -> Self {
    Self(message.into())
  }
}

/// Transactional email delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), CollaboratorError>;
}

/// In-app notification delivery.
#[async_trait]
pub trait PushChannel: Send + Sync {
  async fn notify(
    &self,
    recipient: &str,
    title: &str,
    message: &str,
  ) -> Result<(), CollaboratorError>;
}

/// CRM record persistence for update and crmUpdate nodes.
#[async_trait]
pub trait CrmClient: Send + Sync {
  /// Write a record and return it as stored, including its id.
  async fn write_record(
    &self,
    record_type: &str,
    operation: UpdateOperation,
    fields: &BTreeMap<String, Value>,
    match_field: Option<&str>,
  ) -> Result<Value, CollaboratorError>;
}

/// Text completion for agent and prompt nodes.
#[async_trait]
pub trait LanguageModel: Send + Sync {
  async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String, CollaboratorError>;
}

/// Company data lookup for coresignalAgent nodes.
#[async_trait]
pub trait CompanyEnrichment: Send + Sync {
  async fn lookup(&self, query: &str, dataset: Option<&str>)
  -> Result<Value, CollaboratorError>;
}

/// A link the signer opens to sign a document.
#[derive(Debug, Clone)]
pub struct SigningLink {
  pub url: String,
  pub request_id: String,
}

/// E-signature integration for pdf nodes.
#[async_trait]
pub trait SignatureService: Send + Sync {
  async fn create_signing_link(
    &self,
    document_url: &str,
    signer_email: Option<&str>,
    ttl_minutes: Option<u64>,
  ) -> Result<SigningLink, CollaboratorError>;
}

/// The bundle of collaborators handed to every executor.
#[derive(Clone)]
pub struct Collaborators {
  pub mailer: Arc<dyn Mailer>,
  pub push: Arc<dyn PushChannel>,
  pub crm: Arc<dyn CrmClient>,
  pub language_model: Arc<dyn LanguageModel>,
  pub enrichment: Arc<dyn CompanyEnrichment>,
  pub signatures: Arc<dyn SignatureService>,
}

impl Collaborators {
  /// Collaborators that log each interaction and return local stand-ins.
  pub fn logging() -> Self {
    Self {
      mailer: Arc::new(LoggingMailer),
      push: Arc::new(LoggingPushChannel),
      crm: Arc::new(LocalCrmClient),
      language_model: Arc::new(EchoLanguageModel),
      enrichment: Arc::new(LocalEnrichment),
      signatures: Arc::new(LocalSignatureService),
    }
  }
}

impl Default for Collaborators {
  fn default() -> Self {
    Self::logging()
  }
}

pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
  async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), CollaboratorError> {
    info!(to = %to, subject = %subject, "email_sent");
    Ok(())
  }
}

pub struct LoggingPushChannel;

#[async_trait]
impl PushChannel for LoggingPushChannel {
  async fn notify(
    &self,
    recipient: &str,
    title: &str,
    message: &str,
  ) -> Result<(), CollaboratorError> {
    info!(recipient = %recipient, title = %title, message = %message, "notification_sent");
    Ok(())
  }
}

/// Echoes the written fields back as the stored record.
pub struct LocalCrmClient;

#[async_trait]
impl CrmClient for LocalCrmClient {
  async fn write_record(
    &self,
    record_type: &str,
    operation: UpdateOperation,
    fields: &BTreeMap<String, Value>,
    _match_field: Option<&str>,
  ) -> Result<Value, CollaboratorError> {
    info!(record_type = %record_type, operation = ?operation, "crm_record_written");
    let mut record = serde_json::Map::new();
    record.insert("id".to_string(), json!(uuid::Uuid::new_v4().to_string()));
    for (key, value) in fields {
      record.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(record))
  }
}

/// Returns the prompt back as the completion. A stand-in for offline runs.
pub struct EchoLanguageModel;

#[async_trait]
impl LanguageModel for EchoLanguageModel {
  async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String, CollaboratorError> {
    info!(model = model.unwrap_or("default"), "language_model_called");
    Ok(prompt.to_string())
  }
}

pub struct LocalEnrichment;

#[async_trait]
impl CompanyEnrichment for LocalEnrichment {
  async fn lookup(
    &self,
    query: &str,
    dataset: Option<&str>,
  ) -> Result<Value, CollaboratorError> {
    info!(query = %query, dataset = dataset.unwrap_or("default"), "company_lookup");
    Ok(json!({ "query": query, "matched": false }))
  }
}

pub struct LocalSignatureService;

#[async_trait]
impl SignatureService for LocalSignatureService {
  async fn create_signing_link(
    &self,
    document_url: &str,
    signer_email: Option<&str>,
    _ttl_minutes: Option<u64>,
  ) -> Result<SigningLink, CollaboratorError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    info!(document_url = %document_url, signer = signer_email.unwrap_or("-"), request_id = %request_id, "signing_link_created");
    Ok(SigningLink {
      url: format!("local://sign/{}", request_id),
      request_id,
    })
  }
}
