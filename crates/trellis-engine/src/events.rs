//! Run lifecycle events and notifiers.
//!
//! Events are emitted as runs start, step, suspend, and finish so consumers
//! can stream progress to UIs or correlate async outcomes. The engine calls
//! `notify` for each event; implementations decide what to do with them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Correlation pair callers may attach to a start payload. Echoed back on
/// the completion and failure events so an external system can match the
/// async outcome to its originating request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
  pub uuid: String,
  pub path: String,
}

impl Correlation {
  /// Pull a correlation pair out of a run's data blob, if one was supplied.
  pub fn from_data(data: &Value) -> Option<Self> {
    let uuid = data.get("uuid")?.as_str()?.to_string();
    let path = data.get("path")?.as_str()?.to_string();
    Some(Self { uuid, path })
  }
}

/// Events emitted during a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkflowEvent {
  WorkflowStarted {
    instance_id: String,
    workflow_id: String,
  },

  NodeStarted {
    instance_id: String,
    node_id: String,
    node_type: String,
  },

  NodeCompleted {
    instance_id: String,
    node_id: String,
  },

  /// The node suspended; the run is parked until external input arrives.
  NodeWaiting {
    instance_id: String,
    node_id: String,
    node_type: String,
  },

  NodeFailed {
    instance_id: String,
    node_id: String,
    error: String,
  },

  WorkflowCompleted {
    instance_id: String,
    correlation: Option<Correlation>,
  },

  WorkflowFailed {
    instance_id: String,
    error: String,
    correlation: Option<Correlation>,
  },
}

/// Trait for receiving run events.
pub trait EventNotifier: Send + Sync {
  fn notify(&self, event: WorkflowEvent);
}

/// Discards all events. Useful for tests and one-shot CLI runs.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
  fn notify(&self, _event: WorkflowEvent) {}
}

/// Sends events to an unbounded channel so a consumer can persist or stream
/// them without slowing the engine. Event volume is one per node transition,
/// so unbounded growth is not a practical concern.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
    Self { sender }
  }
}

impl EventNotifier for ChannelNotifier {
  fn notify(&self, event: WorkflowEvent) {
    // The receiver may have been dropped; that is not the engine's problem.
    let _ = self.sender.send(event);
  }
}
