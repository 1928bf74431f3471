//! Content identifier newtype.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Errors from CID construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CidError {
    /// The input string was empty.
    #[error("empty CID")]
    Empty,

    /// The input string contained whitespace or control characters.
    #[error("invalid character in CID: {0:?}")]
    InvalidCharacter(char),

    /// A hex-encoded ledger pointer could not be decoded.
    #[error("invalid ledger pointer: {0}")]
    InvalidPointer(String),
}

/// An opaque content identifier.
///
/// A CID is a content-derived identifier string used to address and retrieve
/// data from the storage daemon. The engine never interprets its internal
/// structure; equality is exact, case-sensitive string equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    /// Create a CID from a string, validating basic shape.
    ///
    /// The string must be non-empty and free of whitespace and control
    /// characters. No multibase or multihash validation is performed; the
    /// daemon is the authority on whether a CID resolves.
    pub fn new(s: impl Into<String>) -> Result<Self, CidError> {
        let s = s.into();
        if s.is_empty() {
            return Err(CidError::Empty);
        }
        if let Some(c) = s.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(CidError::InvalidCharacter(c));
        }
        Ok(Self(s))
    }

    /// Decode a profile pointer as published on the ledger.
    ///
    /// Pointers are stored on-chain either as a plain CID string or as the
    /// hex encoding (optionally `0x`-prefixed) of the UTF-8 CID string.
    pub fn from_ledger_hex(value: &str) -> Result<Self, CidError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CidError::Empty);
        }

        // Already a plain CID, common for newer ledger runtimes.
        if !looks_like_hex(trimmed) {
            return Self::new(trimmed);
        }

        let stripped = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes = hex::decode(stripped)
            .map_err(|e| CidError::InvalidPointer(format!("hex decode failed: {e}")))?;
        let decoded = String::from_utf8(bytes)
            .map_err(|e| CidError::InvalidPointer(format!("not utf-8: {e}")))?;
        Self::new(decoded)
    }

    /// The CID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whether the value can only be a hex-encoded pointer rather than a CID.
///
/// Base58/base32 CIDs always contain characters outside the hex alphabet, so
/// an all-hex string of even length is treated as an encoded pointer.
fn looks_like_hex(s: &str) -> bool {
    let body = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    !body.is_empty() && body.len() % 2 == 0 && body.chars().all(|c| c.is_ascii_hexdigit())
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cid {
    type Err = CidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Cid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
