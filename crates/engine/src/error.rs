//! Engine error types.

use pinsync_report::ReportError;
use pinsync_store::StoreError;

/// Errors from reconciliation.
///
/// Daemon and ledger failures are not represented here: they feed the
/// per-CID retry policy or make a cycle fall back to the previous target
/// set. Only failures of the engine's own durable state surface as errors,
/// and even those are logged by the loop rather than killing the process.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Pin-state store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Quarantine report could not be written.
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}
