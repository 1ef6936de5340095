//! Per-pattern interaction state machines.
//!
//! One [`OperationHandler`] engine drives every pattern; the legal stage
//! transitions live in a static table on [`PatternKind`] rather than in
//! per-pattern code.

mod handler;
mod pattern;

pub use handler::{CompletionMode, OperationHandler};
pub use pattern::{PatternKind, PubSubOp};

pub(crate) use handler::WaitResult;
