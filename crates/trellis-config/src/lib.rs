//! Trellis Config
//!
//! This crate contains the serializable workflow definition types for Trellis.
//! Definitions are authored by the workflow-builder UI and stored as JSON
//! blobs; the engine loads them, validates the graph, and walks it at run
//! time. The `type` tag on each node carries the original wire values
//! (`triggerNode`, `formNode`, ...) so existing definitions round-trip.
//!
//! Node configuration is a closed discriminated union: every node kind has a
//! typed config variant, decoded once when the definition is loaded rather
//! than re-parsed inside every executor call.

mod auth;
mod connection;
mod node;
mod workflow;

pub use auth::Authentication;
pub use connection::ConnectionDef;
pub use node::{
  AgentConfig, ApprovalConfig, CoresignalAgentConfig, FormConfig, FormField, HttpCallConfig,
  NodeConfig, NodeDef, NodeKind, NotificationConfig, PdfConfig, Position, PromptConfig,
  TriggerConfig, UpdateConfig, UpdateOperation,
};
pub use workflow::WorkflowDef;
