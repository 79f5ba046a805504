//! Trellis Template
//!
//! Resolution of `{{...}}` tokens in node configuration strings.
//!
//! Two grammars are supported:
//! - `{{logicalId.path.to.field}}` resolved against the outputs of a run's
//!   node instances ([`render_placeholders`]); the path is tried against the
//!   node's input `data` first and its `result` second.
//! - bare `{{variable}}` resolved against a flattened key/value context
//!   ([`render_variables`]), used when assembling AI prompts.
//!
//! Rendering never fails: unresolvable tokens are replaced with a bracketed
//! diagnostic so template output is always a usable string.

mod outputs;
mod render;

pub use outputs::{NodeOutput, NodeOutputs};
pub use render::{flatten_value, nested_value, render_placeholders, render_variables};
