//! Reconciler policy knobs.

/// Default failed pin attempts before quarantine.
pub const DEFAULT_MAX_PIN_RETRIES: u32 = 5;

/// Default garbage-collection cadence, in completed cycles.
pub const DEFAULT_GC_INTERVAL_CYCLES: u64 = 10;

/// Default bound on concurrent daemon calls within a cycle.
pub const DEFAULT_MAX_CONCURRENT_OPS: usize = 8;

/// Default retention of `Removed` records, in seconds (7 days).
pub const DEFAULT_REMOVED_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;

/// Policy configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Failed pin attempts after which a CID is quarantined.
    pub max_pin_retries: u32,

    /// Trigger daemon garbage collection every this many completed cycles.
    /// Zero disables GC entirely.
    pub gc_interval_cycles: u64,

    /// Bound on concurrent pin/unpin calls within one cycle.
    pub max_concurrent_ops: usize,

    /// Re-probe quarantined CIDs still present in the manifest every this
    /// many cycles, granting them a fresh retry budget. `None` (the
    /// default) never re-probes: a quarantined CID is only retried after
    /// it leaves the manifest and is later re-added.
    pub probe_quarantined_after_cycles: Option<u64>,

    /// How long `Removed` records are kept for audit before pruning.
    pub removed_retention_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_pin_retries: DEFAULT_MAX_PIN_RETRIES,
            gc_interval_cycles: DEFAULT_GC_INTERVAL_CYCLES,
            max_concurrent_ops: DEFAULT_MAX_CONCURRENT_OPS,
            probe_quarantined_after_cycles: None,
            removed_retention_secs: DEFAULT_REMOVED_RETENTION_SECS,
        }
    }
}
