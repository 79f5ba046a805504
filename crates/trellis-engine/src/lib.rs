//! Trellis Engine
//!
//! The orchestrator for durable, resumable workflow runs. It loads a
//! validated graph, walks it node by node through a single explicit driver
//! loop, persists every state transition before acting on it, suspends on
//! human-in-the-loop nodes, and resumes when form submissions, approval
//! decisions, or signed documents arrive.
//!
//! One run advances strictly sequentially: at most one live node instance
//! exists per workflow instance. Different runs execute in parallel with no
//! shared state beyond the store.

mod engine;
mod error;
mod events;

pub use engine::{WorkflowEngine, WorkflowStatus};
pub use error::EngineError;
pub use events::{ChannelNotifier, Correlation, EventNotifier, NoopNotifier, WorkflowEvent};
