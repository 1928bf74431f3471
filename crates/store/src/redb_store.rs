//! redb-based pin store.

use std::path::Path;

use pinsync_primitives::{Cid, PinRecord, PinStatus};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::{removed_before, PinStore, StoreResult};

/// Table of pin records.
/// Key: CID string
/// Value: postcard-encoded [`PinRecord`]
const PINS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("pins");

/// Persistent pin store backed by the redb embedded database.
///
/// Each upsert is its own committed write transaction, so a crash leaves
/// either the old record or the new one. Status filtering scans the table;
/// pin sets are small (thousands of CIDs, not millions), so no secondary
/// index is kept.
pub struct RedbPinStore {
    db: Database,
}

impl RedbPinStore {
    /// Open or create a pin store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = Database::create(path)?;

        // Ensure the table exists so first reads don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PINS_TABLE)?;
        }
        write_txn.commit()?;

        debug!("opened redb pin store");
        Ok(Self { db })
    }
}

impl PinStore for RedbPinStore {
    fn get(&self, cid: &Cid) -> StoreResult<Option<PinRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PINS_TABLE)?;
        match table.get(cid.as_str())? {
            Some(value) => Ok(Some(postcard::from_bytes(value.value())?)),
            None => Ok(None),
        }
    }

    fn upsert(&self, record: &PinRecord) -> StoreResult<()> {
        let bytes = postcard::to_allocvec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PINS_TABLE)?;
            table.insert(record.cid.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list_by_status(&self, statuses: &[PinStatus]) -> StoreResult<Vec<PinRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PINS_TABLE)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: PinRecord = postcard::from_bytes(value.value())?;
            if statuses.contains(&record.status) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn delete(&self, cid: &Cid) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PINS_TABLE)?;
            table.remove(cid.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn prune_removed(&self, cutoff: u64) -> StoreResult<u64> {
        let write_txn = self.db.begin_write()?;
        let pruned;
        {
            let mut table = write_txn.open_table(PINS_TABLE)?;

            let mut stale = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let record: PinRecord = postcard::from_bytes(value.value())?;
                if removed_before(&record, cutoff) {
                    stale.push(key.value().to_owned());
                }
            }

            for key in &stale {
                table.remove(key.as_str())?;
            }
            pruned = stale.len() as u64;
        }
        write_txn.commit()?;

        if pruned > 0 {
            debug!(pruned, "pruned removed pin records");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cid(n: u8) -> Cid {
        Cid::new(format!("QmStoreTest{n:03}")).unwrap()
    }

    #[test]
    fn upsert_then_get() {
        let dir = tempdir().unwrap();
        let store = RedbPinStore::open(dir.path().join("pins.redb")).unwrap();

        let record = PinRecord::pending(cid(1));
        store.upsert(&record).unwrap();
        assert_eq!(store.get(&cid(1)).unwrap(), Some(record));
        assert_eq!(store.get(&cid(2)).unwrap(), None);
    }

    #[test]
    fn upsert_replaces() {
        let dir = tempdir().unwrap();
        let store = RedbPinStore::open(dir.path().join("pins.redb")).unwrap();

        let mut record = PinRecord::pending(cid(1));
        store.upsert(&record).unwrap();

        record.on_pin_success(100);
        store.upsert(&record).unwrap();

        let loaded = store.get(&cid(1)).unwrap().unwrap();
        assert_eq!(loaded.status, PinStatus::Pinned);
        assert_eq!(loaded.last_attempt_at, Some(100));
    }

    #[test]
    fn list_filters_by_status() {
        let dir = tempdir().unwrap();
        let store = RedbPinStore::open(dir.path().join("pins.redb")).unwrap();

        let pending = PinRecord::pending(cid(1));
        let mut pinned = PinRecord::pending(cid(2));
        pinned.on_pin_success(10);
        let mut failing = PinRecord::pending(cid(3));
        failing.on_pin_failure(10, "timeout".into(), 5);

        store.upsert(&pending).unwrap();
        store.upsert(&pinned).unwrap();
        store.upsert(&failing).unwrap();

        let active = store
            .list_by_status(&[PinStatus::Pending, PinStatus::Failing])
            .unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|r| r.status != PinStatus::Pinned));

        let all = store.list_by_status(&PinStatus::MANAGED).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pins.redb");

        {
            let store = RedbPinStore::open(&path).unwrap();
            let mut record = PinRecord::pending(cid(1));
            record.on_pin_failure(10, "refused".into(), 5);
            store.upsert(&record).unwrap();
        }

        let store = RedbPinStore::open(&path).unwrap();
        let loaded = store.get(&cid(1)).unwrap().unwrap();
        assert_eq!(loaded.status, PinStatus::Failing);
        assert_eq!(loaded.retry_count, 1);
        assert_eq!(loaded.last_error.as_deref(), Some("refused"));
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = RedbPinStore::open(dir.path().join("pins.redb")).unwrap();

        store.upsert(&PinRecord::pending(cid(1))).unwrap();
        store.delete(&cid(1)).unwrap();
        store.delete(&cid(1)).unwrap();
        assert_eq!(store.get(&cid(1)).unwrap(), None);
    }

    #[test]
    fn prune_respects_cutoff_and_status() {
        let dir = tempdir().unwrap();
        let store = RedbPinStore::open(dir.path().join("pins.redb")).unwrap();

        let mut old_removed = PinRecord::pending(cid(1));
        old_removed.on_unpin_requested();
        old_removed.on_unpin_success(100);

        let mut fresh_removed = PinRecord::pending(cid(2));
        fresh_removed.on_unpin_requested();
        fresh_removed.on_unpin_success(900);

        let mut pinned = PinRecord::pending(cid(3));
        pinned.on_pin_success(50);

        store.upsert(&old_removed).unwrap();
        store.upsert(&fresh_removed).unwrap();
        store.upsert(&pinned).unwrap();

        assert_eq!(store.prune_removed(500).unwrap(), 1);
        assert_eq!(store.get(&cid(1)).unwrap(), None);
        assert!(store.get(&cid(2)).unwrap().is_some());
        assert!(store.get(&cid(3)).unwrap().is_some());
    }
}
