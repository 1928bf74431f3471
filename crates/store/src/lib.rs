//! Durable per-CID pin state.
//!
//! The [`PinStore`] trait abstracts over storage backends: [`RedbPinStore`]
//! for production, [`MemoryPinStore`] for tests. The store is the single
//! source of truth for what the engine believes is pinned, pending, or
//! quarantined; it must survive process restart.

mod error;
mod memory;
mod redb_store;

pub use error::StoreError;
pub use memory::MemoryPinStore;
pub use redb_store::RedbPinStore;

use pinsync_primitives::{Cid, PinRecord, PinStatus};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Pin-state storage backend.
///
/// Writes are atomic per CID: a reader never observes a partially updated
/// record. No cross-CID transactionality is provided or needed — the engine
/// updates records independently.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait PinStore: Send + Sync {
    /// Get the record for a CID, if one exists.
    fn get(&self, cid: &Cid) -> StoreResult<Option<PinRecord>>;

    /// Insert or replace the record for its CID.
    fn upsert(&self, record: &PinRecord) -> StoreResult<()>;

    /// All records whose status is in `statuses`.
    fn list_by_status(&self, statuses: &[PinStatus]) -> StoreResult<Vec<PinRecord>>;

    /// Remove a record entirely.
    ///
    /// Returns `Ok(())` even if no record existed.
    fn delete(&self, cid: &Cid) -> StoreResult<()>;

    /// Delete `Removed` records whose last attempt is older than `cutoff`
    /// (unix seconds). Returns the number of records pruned.
    fn prune_removed(&self, cutoff: u64) -> StoreResult<u64>;
}

impl<T: PinStore + ?Sized> PinStore for std::sync::Arc<T> {
    fn get(&self, cid: &Cid) -> StoreResult<Option<PinRecord>> {
        (**self).get(cid)
    }

    fn upsert(&self, record: &PinRecord) -> StoreResult<()> {
        (**self).upsert(record)
    }

    fn list_by_status(&self, statuses: &[PinStatus]) -> StoreResult<Vec<PinRecord>> {
        (**self).list_by_status(statuses)
    }

    fn delete(&self, cid: &Cid) -> StoreResult<()> {
        (**self).delete(cid)
    }

    fn prune_removed(&self, cutoff: u64) -> StoreResult<u64> {
        (**self).prune_removed(cutoff)
    }
}

/// Whether a `Removed` record has aged out of its retention window.
pub(crate) fn removed_before(record: &PinRecord, cutoff: u64) -> bool {
    record.status == PinStatus::Removed && record.last_attempt_at.unwrap_or(0) < cutoff
}
