//! External collaborator contracts.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use pinsync_primitives::Cid;

use crate::PinError;

/// The local content-addressable storage daemon.
///
/// All operations are idempotent from the daemon's perspective: pinning an
/// already-pinned CID and unpinning an absent one both succeed. Calls may
/// block; implementations bound each call with a timeout so a hang surfaces
/// as an ordinary [`PinError::Transient`].
#[async_trait]
pub trait StorageNode: Send + Sync {
    /// Pin a CID so its content is retained locally.
    async fn pin(&self, cid: &Cid) -> Result<(), PinError>;

    /// Release a CID so garbage collection may reclaim its content.
    async fn unpin(&self, cid: &Cid) -> Result<(), PinError>;

    /// Fetch the content behind a CID.
    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>, PinError>;

    /// All CIDs the daemon currently holds recursive pins for.
    async fn list_pins(&self) -> Result<BTreeSet<Cid>, PinError>;

    /// Trigger a garbage-collection pass on the daemon's repository.
    async fn collect_garbage(&self) -> Result<(), PinError>;
}

/// Resolver for the node's published profile pointer.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// The CID of the currently published profile document.
    ///
    /// `Ok(None)` means no profile is published — the target set is empty
    /// and everything managed should be released.
    async fn resolve_profile(&self) -> Result<Option<Cid>, PinError>;
}

#[async_trait]
impl<T: StorageNode + ?Sized> StorageNode for Arc<T> {
    async fn pin(&self, cid: &Cid) -> Result<(), PinError> {
        (**self).pin(cid).await
    }

    async fn unpin(&self, cid: &Cid) -> Result<(), PinError> {
        (**self).unpin(cid).await
    }

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>, PinError> {
        (**self).fetch(cid).await
    }

    async fn list_pins(&self) -> Result<BTreeSet<Cid>, PinError> {
        (**self).list_pins().await
    }

    async fn collect_garbage(&self) -> Result<(), PinError> {
        (**self).collect_garbage().await
    }
}

#[async_trait]
impl<T: ProfileSource + ?Sized> ProfileSource for Arc<T> {
    async fn resolve_profile(&self) -> Result<Option<Cid>, PinError> {
        (**self).resolve_profile().await
    }
}
