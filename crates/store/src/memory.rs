//! In-memory pin store for tests.

use std::collections::HashMap;

use parking_lot::RwLock;
use pinsync_primitives::{Cid, PinRecord, PinStatus};

use crate::{removed_before, PinStore, StoreResult};

/// Simple in-memory pin store.
///
/// Same contract as [`crate::RedbPinStore`] without durability. Used by
/// engine tests and anywhere a throwaway store is convenient.
#[derive(Default)]
pub struct MemoryPinStore {
    records: RwLock<HashMap<Cid, PinRecord>>,
}

impl MemoryPinStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PinStore for MemoryPinStore {
    fn get(&self, cid: &Cid) -> StoreResult<Option<PinRecord>> {
        Ok(self.records.read().get(cid).cloned())
    }

    fn upsert(&self, record: &PinRecord) -> StoreResult<()> {
        self.records
            .write()
            .insert(record.cid.clone(), record.clone());
        Ok(())
    }

    fn list_by_status(&self, statuses: &[PinStatus]) -> StoreResult<Vec<PinRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect())
    }

    fn delete(&self, cid: &Cid) -> StoreResult<()> {
        self.records.write().remove(cid);
        Ok(())
    }

    fn prune_removed(&self, cutoff: u64) -> StoreResult<u64> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| !removed_before(r, cutoff));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(n: u8) -> Cid {
        Cid::new(format!("QmMemTest{n:03}")).unwrap()
    }

    #[test]
    fn matches_trait_contract() {
        let store = MemoryPinStore::new();
        assert_eq!(store.get(&cid(1)).unwrap(), None);

        let record = PinRecord::pending(cid(1));
        store.upsert(&record).unwrap();
        assert_eq!(store.get(&cid(1)).unwrap(), Some(record));

        store.delete(&cid(1)).unwrap();
        store.delete(&cid(1)).unwrap();
        assert_eq!(store.get(&cid(1)).unwrap(), None);
    }

    #[test]
    fn prune_only_touches_removed() {
        let store = MemoryPinStore::new();

        let mut removed = PinRecord::pending(cid(1));
        removed.on_unpin_requested();
        removed.on_unpin_success(10);
        store.upsert(&removed).unwrap();

        store.upsert(&PinRecord::pending(cid(2))).unwrap();

        assert_eq!(store.prune_removed(100).unwrap(), 1);
        assert!(store.get(&cid(2)).unwrap().is_some());
    }
}
