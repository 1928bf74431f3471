//! Core types shared across the pinsync crates.
//!
//! This crate defines the [`Cid`] identifier, the per-CID pin state machine
//! ([`PinStatus`], [`PinRecord`]), the desired-state [`ProfileManifest`], and
//! the observability projections ([`CycleReport`], [`QuarantineEntry`]).

mod cid;
mod manifest;
mod record;
mod report;

pub use cid::{Cid, CidError};
pub use manifest::{ManifestError, ProfileManifest};
pub use record::{PinRecord, PinStatus};
pub use report::{CycleReport, QuarantineEntry};
