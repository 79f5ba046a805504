//! Trellis Workflow
//!
//! This crate provides the loaded workflow representation: a definition whose
//! graph has been validated and indexed for execution.
//!
//! Key differences from `trellis-config`:
//! - Graph structure is validated (known edge endpoints, exactly one start
//!   node, at most one outgoing connection per node)
//! - Nodes are indexed by `node_id` and by logical id
//! - Successor lookup is O(1)

mod error;
mod workflow;

pub use error::WorkflowError;
pub use workflow::Workflow;
