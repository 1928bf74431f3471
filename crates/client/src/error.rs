//! Client error taxonomy.

/// Failure of a storage-daemon or ledger call.
///
/// The engine treats both variants identically for retry counting — it
/// cannot reliably tell "will never succeed" from "temporarily broken".
/// The distinction only changes what gets logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinError {
    /// Network trouble, timeout, or daemon temporarily unavailable.
    #[error("transient: {0}")]
    Transient(String),

    /// The daemon explicitly rejected the request.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl PinError {
    /// Whether the failure is presumed temporary.
    pub fn is_transient(&self) -> bool {
        matches!(self, PinError::Transient(_))
    }
}

impl From<reqwest::Error> for PinError {
    fn from(err: reqwest::Error) -> Self {
        // Connection-level failures and timeouts are transient; an error
        // status carried through here means the daemon answered.
        if err.is_status() {
            PinError::Permanent(err.to_string())
        } else {
            PinError::Transient(err.to_string())
        }
    }
}
