//! Per-CID pin state machine.

use serde::{Deserialize, Serialize};

use crate::Cid;

/// Lifecycle state of a managed CID.
///
/// Exactly one status applies to a CID at any instant. Transitions are driven
/// by the reconciliation engine; the store only persists whatever state the
/// engine hands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinStatus {
    /// In the target set, pin not yet confirmed.
    Pending,
    /// Confirmed pinned on the local daemon.
    Pinned,
    /// Pin attempted and failed, retry budget remaining.
    Failing,
    /// Retry budget exhausted; excluded from automatic attempts.
    Quarantined,
    /// Removed from the target set, unpin not yet confirmed.
    Unpinning,
    /// Unpin confirmed; record retained for audit until pruned.
    Removed,
}

impl PinStatus {
    /// Statuses of CIDs the engine considers under management.
    ///
    /// `Removed` records are excluded: they only await retention pruning and
    /// never participate in a diff.
    pub const MANAGED: [PinStatus; 5] = [
        PinStatus::Pending,
        PinStatus::Pinned,
        PinStatus::Failing,
        PinStatus::Quarantined,
        PinStatus::Unpinning,
    ];
}

impl std::fmt::Display for PinStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PinStatus::Pending => "pending",
            PinStatus::Pinned => "pinned",
            PinStatus::Failing => "failing",
            PinStatus::Quarantined => "quarantined",
            PinStatus::Unpinning => "unpinning",
            PinStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// Durable record of one managed CID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRecord {
    /// The managed CID. Unique key in the store.
    pub cid: Cid,
    /// Current lifecycle state.
    pub status: PinStatus,
    /// Failed pin attempts since the last success or since creation.
    pub retry_count: u32,
    /// Unix seconds of the most recent pin/unpin attempt.
    pub last_attempt_at: Option<u64>,
    /// Message from the most recent failure, cleared on success.
    pub last_error: Option<String>,
    /// Unix seconds at which the record entered quarantine.
    pub quarantined_at: Option<u64>,
}

impl PinRecord {
    /// A fresh record for a CID newly seen in a manifest.
    pub fn pending(cid: Cid) -> Self {
        Self {
            cid,
            status: PinStatus::Pending,
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
            quarantined_at: None,
        }
    }

    /// Apply a successful pin attempt.
    pub fn on_pin_success(&mut self, now: u64) {
        self.status = PinStatus::Pinned;
        self.retry_count = 0;
        self.last_attempt_at = Some(now);
        self.last_error = None;
        self.quarantined_at = None;
    }

    /// Apply a failed pin attempt under the given retry budget.
    ///
    /// Returns `true` if the failure exhausted the budget and the record is
    /// now quarantined.
    pub fn on_pin_failure(&mut self, now: u64, error: String, max_retries: u32) -> bool {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_attempt_at = Some(now);
        self.last_error = Some(error);
        if self.retry_count >= max_retries {
            self.status = PinStatus::Quarantined;
            self.quarantined_at = Some(now);
            true
        } else {
            self.status = PinStatus::Failing;
            false
        }
    }

    /// Mark the record as leaving the target set.
    pub fn on_unpin_requested(&mut self) {
        self.status = PinStatus::Unpinning;
    }

    /// Apply a successful unpin attempt.
    pub fn on_unpin_success(&mut self, now: u64) {
        self.status = PinStatus::Removed;
        self.last_attempt_at = Some(now);
        self.last_error = None;
    }

    /// Apply a failed unpin attempt.
    ///
    /// Unpin failures never quarantine: local cleanup is retried every cycle
    /// until it succeeds.
    pub fn on_unpin_failure(&mut self, now: u64, error: String) {
        debug_assert_eq!(self.status, PinStatus::Unpinning);
        self.last_attempt_at = Some(now);
        self.last_error = Some(error);
    }

    /// The daemon no longer holds the pin; schedule a re-pin.
    ///
    /// Used by the audit pass when a tracked `Pinned` CID is missing from
    /// the daemon's pin list.
    pub fn on_pin_lost(&mut self) {
        debug_assert_eq!(self.status, PinStatus::Pinned);
        self.status = PinStatus::Pending;
    }

    /// Demote a quarantined record back to `Pending` with a fresh budget.
    ///
    /// Used by the optional quarantine re-probe policy.
    pub fn on_reprobe(&mut self) {
        debug_assert_eq!(self.status, PinStatus::Quarantined);
        self.status = PinStatus::Pending;
        self.retry_count = 0;
        self.quarantined_at = None;
    }
}
