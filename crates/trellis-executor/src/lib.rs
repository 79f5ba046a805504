//! Trellis Executor
//!
//! Per-node-kind executors for the workflow engine. Each node kind has a
//! [`NodeExecutor`] implementation; the [`ExecutorRegistry`] maps every
//! [`NodeKind`](trellis_config::NodeKind) to one, so an unregistered kind is
//! caught at engine construction rather than mid-run.
//!
//! Executors never touch control flow: they receive an [`ExecutionContext`]
//! and return an [`Outcome`] saying whether the node completed, suspended for
//! user input, or failed. Side effects on the outside world go through the
//! [`collaborators`] traits so the engine can run offline and under test.

pub mod collaborators;
mod context;
mod error;
mod executors;
mod outcome;
mod registry;

pub use collaborators::Collaborators;
pub use context::ExecutionContext;
pub use error::ExecutorError;
pub use outcome::{Outcome, OutcomeStatus};
pub use registry::ExecutorRegistry;

use async_trait::async_trait;

/// Executes one kind of workflow node.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
  async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outcome, ExecutorError>;
}
