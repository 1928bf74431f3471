//! Clients for the external collaborators of the reconciler.
//!
//! Two narrow contracts: [`StorageNode`] for the local content-addressable
//! storage daemon (pin/unpin/fetch/gc over its HTTP API) and
//! [`ProfileSource`] for resolving the published profile pointer from the
//! ledger. The engine only ever sees these traits; the HTTP implementations
//! live here.

mod error;
mod ipfs;
mod ledger;
mod traits;

pub use error::PinError;
pub use ipfs::{IpfsApiClient, IpfsApiConfig};
pub use ledger::{HttpProfileSource, LedgerConfig};
pub use traits::{ProfileSource, StorageNode};
