//! The reconciliation engine.
//!
//! [`Reconciler`] drives the local daemon's pin set toward the target set
//! published in the node's profile: one [`Reconciler::run_cycle`] resolves
//! the profile, diffs it against the durable pin state, issues pin/unpin
//! calls, applies the retry/quarantine policy, and rewrites the quarantine
//! report. [`Reconciler::run`] loops cycles on an interval with graceful
//! shutdown and no overlap.

mod config;
mod error;
mod reconciler;

pub use config::ReconcilerConfig;
pub use error::EngineError;
pub use reconciler::{AuditReport, Reconciler};
