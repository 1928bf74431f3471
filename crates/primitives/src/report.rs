//! Observability projections of the pin state.

use serde::{Deserialize, Serialize};

use crate::{Cid, PinRecord, PinStatus};

/// Snapshot entry for one quarantined CID.
///
/// The quarantine report is a full snapshot, rewritten every cycle, so it
/// always matches current quarantine membership exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineEntry {
    /// The quarantined CID.
    pub cid: Cid,
    /// Pin attempts at the time of quarantine.
    pub retry_count: u32,
    /// Message from the final failed attempt.
    pub last_error: Option<String>,
    /// Unix seconds at which the CID entered quarantine.
    pub quarantined_at: Option<u64>,
}

impl QuarantineEntry {
    /// Project a quarantined record into a report entry.
    ///
    /// Returns `None` for records in any other status.
    pub fn from_record(record: &PinRecord) -> Option<Self> {
        if record.status != PinStatus::Quarantined {
            return None;
        }
        Some(Self {
            cid: record.cid.clone(),
            retry_count: record.retry_count,
            last_error: record.last_error.clone(),
            quarantined_at: record.quarantined_at,
        })
    }
}

/// Counters summarizing one reconciliation cycle.
///
/// Purely for logging and tests; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// New records created from manifest entries.
    pub added: usize,
    /// Pins confirmed this cycle.
    pub pinned: usize,
    /// Unpins confirmed this cycle.
    pub unpinned: usize,
    /// Pin attempts that failed with budget remaining.
    pub failed: usize,
    /// CIDs that entered quarantine this cycle.
    pub quarantined: usize,
    /// CIDs already pinned and still in the manifest (no daemon call).
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_only_quarantined() {
        let cid = Cid::new("QmTest1111111111111111111111111111111111111111").unwrap();
        let mut record = PinRecord::pending(cid);
        assert!(QuarantineEntry::from_record(&record).is_none());

        record.on_pin_failure(9, "refused".into(), 1);
        let entry = QuarantineEntry::from_record(&record).unwrap();
        assert_eq!(entry.retry_count, 1);
        assert_eq!(entry.quarantined_at, Some(9));
        assert_eq!(entry.last_error.as_deref(), Some("refused"));
    }
}
