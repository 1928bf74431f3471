//! Quarantine report artifact.
//!
//! The reconciler rewrites the report after every cycle with the current set
//! of quarantined CIDs. Operators (and external tooling) read the file; the
//! engine itself only reads it back in tests.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use pinsync_primitives::QuarantineEntry;
use tracing::debug;

/// Errors from report persistence.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The report could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Full-snapshot JSON report of quarantined CIDs.
///
/// Writes go to a temp file in the same directory followed by a rename, so a
/// reader either sees the previous report or the new one, never a partial
/// write.
pub struct QuarantineReporter {
    path: PathBuf,
}

impl QuarantineReporter {
    /// Create a reporter writing to `path`, making parent directories.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    /// Path of the report artifact.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the report with the given snapshot.
    pub fn write(&self, entries: &[QuarantineEntry]) -> Result<(), ReportError> {
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, entries)
                .map_err(|e| ReportError::Serialization(e.to_string()))?;
        }
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), count = entries.len(), "wrote quarantine report");
        Ok(())
    }

    /// Read the current report.
    ///
    /// A missing file is an empty report.
    pub fn read(&self) -> Result<Vec<QuarantineEntry>, ReportError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| ReportError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinsync_primitives::Cid;

    fn entry(n: u8) -> QuarantineEntry {
        QuarantineEntry {
            cid: Cid::new(format!("QmQuarantine{n:03}")).unwrap(),
            retry_count: 5,
            last_error: Some("connection refused".into()),
            quarantined_at: Some(1_700_000_000 + u64::from(n)),
        }
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = QuarantineReporter::new(dir.path().join("report.json")).unwrap();
        assert!(reporter.read().unwrap().is_empty());
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = QuarantineReporter::new(dir.path().join("report.json")).unwrap();

        let entries = vec![entry(1), entry(2)];
        reporter.write(&entries).unwrap();
        assert_eq!(reporter.read().unwrap(), entries);
    }

    #[test]
    fn write_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = QuarantineReporter::new(dir.path().join("report.json")).unwrap();

        reporter.write(&[entry(1), entry(2), entry(3)]).unwrap();
        reporter.write(&[entry(2)]).unwrap();

        let current = reporter.read().unwrap();
        assert_eq!(current, vec![entry(2)]);
    }

    #[test]
    fn empty_snapshot_clears_report() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = QuarantineReporter::new(dir.path().join("report.json")).unwrap();

        reporter.write(&[entry(1)]).unwrap();
        reporter.write(&[]).unwrap();
        assert!(reporter.read().unwrap().is_empty());
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/report.json");
        let reporter = QuarantineReporter::new(&nested).unwrap();
        reporter.write(&[entry(7)]).unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = QuarantineReporter::new(dir.path().join("report.json")).unwrap();
        reporter.write(&[entry(1)]).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("report.json")]);
    }
}
