//! Desired-state manifest parsing.

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::warn;

use crate::{Cid, CidError};

/// Errors from manifest parsing.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The document was not valid JSON.
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document did not contain an entry list.
    #[error("manifest is not a list of entries")]
    NotAList,
}

/// Immutable snapshot of one profile fetch.
///
/// Holds the target CID set the reconciler drives the daemon toward. The
/// engine keeps the most recent successfully parsed manifest across cycles so
/// a transient resolution failure does not collapse the target set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileManifest {
    /// CID of the profile document itself.
    pub source: Cid,
    /// Target set of CIDs to keep pinned.
    pub entries: BTreeSet<Cid>,
    /// Unix seconds at which the profile was fetched.
    pub fetched_at: u64,
}

/// One entry of the profile document.
///
/// Profiles published by older runtimes carry a `file_hash` byte array (ASCII
/// values of the hex encoding of a UTF-8 CID string); newer ones carry a
/// plain `cid` string. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestEntry {
    Plain(String),
    Object {
        #[serde(default)]
        cid: Option<String>,
        #[serde(default)]
        file_hash: Option<Vec<u8>>,
    },
}

impl ProfileManifest {
    /// Parse the fetched profile document.
    ///
    /// The document must be a JSON array; anything else is a parse failure
    /// and aborts the cycle. Individual entries that fail to decode are
    /// skipped with a warning, matching the published-profile tolerance of
    /// the ledger runtime.
    pub fn parse(source: Cid, bytes: &[u8], fetched_at: u64) -> Result<Self, ManifestError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let items = value.as_array().ok_or(ManifestError::NotAList)?;

        let mut entries = BTreeSet::new();
        for item in items {
            let entry: ManifestEntry = match serde_json::from_value(item.clone()) {
                Ok(e) => e,
                Err(err) => {
                    warn!(%source, %err, "skipping undecodable manifest entry");
                    continue;
                }
            };
            match decode_entry(entry) {
                Ok(cid) => {
                    entries.insert(cid);
                }
                Err(err) => {
                    warn!(%source, %err, "skipping manifest entry with invalid CID");
                }
            }
        }

        Ok(Self {
            source,
            entries,
            fetched_at,
        })
    }
}

fn decode_entry(entry: ManifestEntry) -> Result<Cid, CidError> {
    match entry {
        ManifestEntry::Plain(s) => Cid::new(s),
        ManifestEntry::Object {
            cid: Some(s),
            file_hash: _,
        } => Cid::new(s),
        ManifestEntry::Object {
            cid: None,
            file_hash: Some(bytes),
        } => {
            // The byte array spells out a hex string, which in turn encodes
            // the UTF-8 CID.
            let hex_string =
                String::from_utf8(bytes).map_err(|e| CidError::InvalidPointer(e.to_string()))?;
            Cid::from_ledger_hex(&hex_string)
        }
        ManifestEntry::Object {
            cid: None,
            file_hash: None,
        } => Err(CidError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID_A: &str = "QmbWqxBEKC3P8tqsKc98xmWNzrzDtRLMiMPL8wBuTGsMnR";
    const CID_B: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

    fn source() -> Cid {
        Cid::new("QmSource111111111111111111111111111111111111111").unwrap()
    }

    #[test]
    fn parses_plain_string_entries() {
        let doc = serde_json::json!([CID_A, CID_B]);
        let manifest =
            ProfileManifest::parse(source(), doc.to_string().as_bytes(), 100).unwrap();
        assert_eq!(manifest.entries.len(), 2);
        assert!(manifest.entries.contains(&Cid::new(CID_A).unwrap()));
    }

    #[test]
    fn parses_cid_object_entries() {
        let doc = serde_json::json!([{"cid": CID_A, "size": 42, "owner": "x"}]);
        let manifest =
            ProfileManifest::parse(source(), doc.to_string().as_bytes(), 100).unwrap();
        assert_eq!(manifest.entries.len(), 1);
    }

    #[test]
    fn parses_file_hash_entries() {
        // file_hash is the ASCII bytes of the hex encoding of the CID.
        let hex_string = hex::encode(CID_A);
        let file_hash: Vec<u8> = hex_string.into_bytes();
        let doc = serde_json::json!([{"file_hash": file_hash}]);
        let manifest =
            ProfileManifest::parse(source(), doc.to_string().as_bytes(), 100).unwrap();
        assert!(manifest.entries.contains(&Cid::new(CID_A).unwrap()));
    }

    #[test]
    fn skips_bad_entries_keeps_good() {
        let doc = serde_json::json!([CID_A, {"owner": "nobody"}, 17]);
        let manifest =
            ProfileManifest::parse(source(), doc.to_string().as_bytes(), 100).unwrap();
        assert_eq!(manifest.entries.len(), 1);
    }

    #[test]
    fn non_list_is_parse_failure() {
        let doc = serde_json::json!({"entries": [CID_A]});
        let err = ProfileManifest::parse(source(), doc.to_string().as_bytes(), 100);
        assert!(matches!(err, Err(ManifestError::NotAList)));
    }

    #[test]
    fn garbage_is_parse_failure() {
        let err = ProfileManifest::parse(source(), b"not json", 100);
        assert!(matches!(err, Err(ManifestError::Json(_))));
    }

    #[test]
    fn duplicate_entries_collapse() {
        let doc = serde_json::json!([CID_A, CID_A, {"cid": CID_A}]);
        let manifest =
            ProfileManifest::parse(source(), doc.to_string().as_bytes(), 100).unwrap();
        assert_eq!(manifest.entries.len(), 1);
    }
}
