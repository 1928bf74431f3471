//! Cycle-based pin reconciliation.

use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::stream::{self, StreamExt};
use pinsync_client::{PinError, ProfileSource, StorageNode};
use pinsync_primitives::{
    Cid, CycleReport, PinRecord, PinStatus, ProfileManifest, QuarantineEntry,
};
use pinsync_report::QuarantineReporter;
use pinsync_store::PinStore;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{EngineError, ReconcilerConfig};

/// Outcome of an audit of daemon pins against the durable store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Daemon pins with no managed record, now released.
    pub strays_released: usize,
    /// Confirmed pins the daemon no longer holds, demoted to pending.
    pub repins_scheduled: usize,
}

/// Which daemon call a batch entry wants.
#[derive(Clone, Copy)]
enum Op {
    Pin,
    Unpin,
}

/// Drives the daemon's pin set toward the published target set.
///
/// One [`run_cycle`](Self::run_cycle) resolves the profile pointer, diffs
/// the target set against the durable records, issues the pin and unpin
/// calls with bounded concurrency, applies the retry/quarantine policy, and
/// rewrites the quarantine report. Cycles never overlap; all persistence
/// goes through the [`PinStore`].
pub struct Reconciler<S, N, P> {
    store: S,
    node: N,
    profiles: P,
    reporter: QuarantineReporter,
    config: ReconcilerConfig,
    /// Most recent successfully parsed manifest, reused when resolution or
    /// fetch fails and skipped entirely when the pointer is unchanged.
    last_manifest: Option<ProfileManifest>,
    cycles_completed: u64,
}

impl<S, N, P> Reconciler<S, N, P>
where
    S: PinStore,
    N: StorageNode,
    P: ProfileSource,
{
    /// Create a reconciler over the given collaborators.
    pub fn new(
        store: S,
        node: N,
        profiles: P,
        reporter: QuarantineReporter,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            node,
            profiles,
            reporter,
            config,
            last_manifest: None,
            cycles_completed: 0,
        }
    }

    /// Run reconciliation cycles on `interval` until `shutdown` flips to
    /// `true` (or its sender drops).
    ///
    /// The first cycle runs immediately. A cycle in flight when shutdown
    /// arrives completes before the loop exits. Cycle errors are logged and
    /// never terminate the loop.
    pub async fn run(&mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "reconciliation loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_cycle().await {
                        error!(%err, "reconciliation cycle failed");
                    }
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("reconciliation loop stopped");
    }

    /// Execute one reconciliation cycle.
    ///
    /// When no target set can be determined (resolution failed and no prior
    /// manifest exists) the cycle is a no-op: no records change, no report
    /// is written.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, EngineError> {
        let now = unix_now();
        let cycle = self.cycles_completed + 1;

        let Some(target) = self.resolve_target(now).await else {
            debug!(cycle, "no target set available, skipping cycle");
            return Ok(CycleReport::default());
        };

        let known = self.store.list_by_status(&PinStatus::MANAGED)?;
        let known_cids: BTreeSet<Cid> = known.iter().map(|r| r.cid.clone()).collect();

        let reprobe = self
            .config
            .probe_quarantined_after_cycles
            .is_some_and(|n| n > 0 && cycle % n == 0);

        let mut report = CycleReport::default();
        let mut pin_batch = Vec::new();
        let mut unpin_batch = Vec::new();

        // New manifest entries get a record and a pin attempt this cycle.
        for cid in target.difference(&known_cids) {
            let record = PinRecord::pending(cid.clone());
            self.store.upsert(&record)?;
            debug!(%cid, "tracking new manifest entry");
            report.added += 1;
            pin_batch.push(record);
        }

        for mut record in known {
            let in_target = target.contains(&record.cid);
            match record.status {
                PinStatus::Pending | PinStatus::Failing if in_target => pin_batch.push(record),
                PinStatus::Pinned if in_target => report.skipped += 1,
                PinStatus::Quarantined if in_target => {
                    if reprobe {
                        record.on_reprobe();
                        self.store.upsert(&record)?;
                        info!(cid = %record.cid, "re-probing quarantined pin");
                        pin_batch.push(record);
                    }
                }
                PinStatus::Unpinning => {
                    // Finish the unpin first even if the CID reappeared in
                    // the manifest; the re-add is picked up as a fresh
                    // record on a later cycle.
                    unpin_batch.push(record);
                }
                _ => {
                    record.on_unpin_requested();
                    self.store.upsert(&record)?;
                    debug!(cid = %record.cid, "manifest entry withdrawn, unpinning");
                    unpin_batch.push(record);
                }
            }
        }

        for (mut record, result) in self.execute(pin_batch, Op::Pin).await {
            match result {
                Ok(()) => {
                    record.on_pin_success(now);
                    debug!(cid = %record.cid, "pinned");
                    report.pinned += 1;
                }
                Err(err) => {
                    let quarantined =
                        record.on_pin_failure(now, err.to_string(), self.config.max_pin_retries);
                    if quarantined {
                        warn!(
                            cid = %record.cid,
                            retries = record.retry_count,
                            %err,
                            "retry budget exhausted, quarantining"
                        );
                        report.quarantined += 1;
                    } else {
                        debug!(cid = %record.cid, retries = record.retry_count, %err, "pin attempt failed");
                        report.failed += 1;
                    }
                }
            }
            self.store.upsert(&record)?;
        }

        for (mut record, result) in self.execute(unpin_batch, Op::Unpin).await {
            match result {
                Ok(()) => {
                    record.on_unpin_success(now);
                    debug!(cid = %record.cid, "unpinned");
                    report.unpinned += 1;
                }
                Err(err) => {
                    warn!(cid = %record.cid, %err, "unpin attempt failed, will retry");
                    record.on_unpin_failure(now, err.to_string());
                }
            }
            self.store.upsert(&record)?;
        }

        self.cycles_completed = cycle;

        if self.config.gc_interval_cycles > 0 && cycle % self.config.gc_interval_cycles == 0 {
            match self.node.collect_garbage().await {
                Ok(()) => info!(cycle, "daemon garbage collection completed"),
                Err(err) => warn!(%err, "daemon garbage collection failed"),
            }
        }

        self.write_quarantine_report()?;

        let cutoff = now.saturating_sub(self.config.removed_retention_secs);
        let pruned = self.store.prune_removed(cutoff)?;
        if pruned > 0 {
            debug!(pruned, "pruned removed records past retention");
        }

        info!(
            cycle,
            added = report.added,
            pinned = report.pinned,
            unpinned = report.unpinned,
            failed = report.failed,
            quarantined = report.quarantined,
            skipped = report.skipped,
            "reconciliation cycle complete"
        );
        Ok(report)
    }

    /// Reconcile the daemon's actual pin list against the store.
    ///
    /// Daemon pins with no managed record (crash leftovers, manual operator
    /// pins) are released; confirmed pins the daemon no longer holds are
    /// demoted to pending so the next cycle re-pins them. Best effort: a
    /// failed daemon call is logged and skipped.
    pub async fn audit(&self) -> Result<AuditReport, EngineError> {
        let daemon_pins = match self.node.list_pins().await {
            Ok(pins) => pins,
            Err(err) => {
                warn!(%err, "pin listing failed, skipping audit");
                return Ok(AuditReport::default());
            }
        };

        let managed = self.store.list_by_status(&PinStatus::MANAGED)?;
        let managed_cids: BTreeSet<Cid> = managed.iter().map(|r| r.cid.clone()).collect();

        let mut audit = AuditReport::default();

        for cid in daemon_pins.difference(&managed_cids) {
            match self.node.unpin(cid).await {
                Ok(()) => {
                    debug!(%cid, "released stray daemon pin");
                    audit.strays_released += 1;
                }
                Err(err) => warn!(%cid, %err, "failed to release stray pin"),
            }
        }

        for mut record in managed {
            if record.status == PinStatus::Pinned && !daemon_pins.contains(&record.cid) {
                record.on_pin_lost();
                self.store.upsert(&record)?;
                warn!(cid = %record.cid, "daemon lost a confirmed pin, re-pinning");
                audit.repins_scheduled += 1;
            }
        }

        Ok(audit)
    }

    /// Determine the target CID set for this cycle.
    ///
    /// `None` aborts the cycle. An empty set is a valid target (no profile
    /// published) and releases everything managed.
    async fn resolve_target(&mut self, now: u64) -> Option<BTreeSet<Cid>> {
        let pointer = match self.profiles.resolve_profile().await {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, "profile resolution failed");
                return self.carry_over();
            }
        };

        let source = match pointer {
            Some(cid) => cid,
            None => {
                if self.last_manifest.take().is_some() {
                    info!("profile withdrawn, releasing all managed pins");
                }
                return Some(BTreeSet::new());
            }
        };

        if let Some(manifest) = &self.last_manifest {
            // Profile documents are content-addressed: same pointer, same
            // content, no refetch.
            if manifest.source == source {
                return Some(manifest.entries.clone());
            }
        }

        let bytes = match self.node.fetch(&source).await {
            Ok(b) => b,
            Err(err) => {
                warn!(%source, %err, "profile fetch failed");
                return self.carry_over();
            }
        };

        match ProfileManifest::parse(source.clone(), &bytes, now) {
            Ok(manifest) => {
                info!(%source, entries = manifest.entries.len(), "loaded new profile manifest");
                let entries = manifest.entries.clone();
                self.last_manifest = Some(manifest);
                Some(entries)
            }
            Err(err) => {
                warn!(%source, %err, "profile parse failed");
                self.carry_over()
            }
        }
    }

    fn carry_over(&self) -> Option<BTreeSet<Cid>> {
        let manifest = self.last_manifest.as_ref()?;
        debug!(source = %manifest.source, "reusing previous target set");
        Some(manifest.entries.clone())
    }

    /// Issue one daemon call per record with bounded concurrency.
    async fn execute(
        &self,
        batch: Vec<PinRecord>,
        op: Op,
    ) -> Vec<(PinRecord, Result<(), PinError>)> {
        let node = &self.node;
        stream::iter(batch.into_iter().map(|record| async move {
            let result = match op {
                Op::Pin => node.pin(&record.cid).await,
                Op::Unpin => node.unpin(&record.cid).await,
            };
            (record, result)
        }))
        .buffer_unordered(self.config.max_concurrent_ops.max(1))
        .collect()
        .await
    }

    fn write_quarantine_report(&self) -> Result<(), EngineError> {
        let mut quarantined = self.store.list_by_status(&[PinStatus::Quarantined])?;
        quarantined.sort_by(|a, b| a.cid.cmp(&b.cid));
        let entries: Vec<QuarantineEntry> = quarantined
            .iter()
            .filter_map(QuarantineEntry::from_record)
            .collect();
        self.reporter.write(&entries)?;
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
