//! The run file: how a service instance advertises itself.
//!
//! A freshly started service writes a small JSON record with its pid and
//! listening port; clients discover a running instance by reading it back.
//! The record is advisory, so readers always confirm liveness before
//! trusting it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Contents of the run file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub pid: u32,
    pub port: u16,
}

/// Reads and writes the run file at a fixed location.
#[derive(Debug, Clone)]
pub struct RunFileRegistry {
    path: PathBuf,
}

impl RunFileRegistry {
    pub fn new(dir: &Path) -> Self {
        RunFileRegistry {
            path: dir.join(super::platform::RUN_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the advertised record, or `None` when the file is absent or
    /// unreadable. A malformed file reads as absent; the caller will
    /// provision a fresh instance and overwrite it.
    pub fn load(&self) -> Option<ServiceRecord> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring malformed run file");
                None
            }
        }
    }

    /// Writes the record atomically: a temp file in the same directory,
    /// then a rename over the final path.
    pub fn store(&self, record: &ServiceRecord) -> Result<()> {
        let tmp = self.path.with_extension("run.tmp");
        std::fs::write(&tmp, serde_json::to_vec(record)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Removes the run file; missing is not an error.
    pub fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RunFileRegistry::new(dir.path());
        let record = ServiceRecord {
            pid: 4321,
            port: 9876,
        };
        registry.store(&record).unwrap();
        assert_eq!(registry.load(), Some(record));
    }

    #[test]
    fn missing_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RunFileRegistry::new(dir.path());
        assert_eq!(registry.load(), None);
    }

    #[test]
    fn malformed_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RunFileRegistry::new(dir.path());
        std::fs::write(registry.path(), b"{not json").unwrap();
        assert_eq!(registry.load(), None);
    }

    #[test]
    fn delete_tolerates_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RunFileRegistry::new(dir.path());
        registry.delete().unwrap();
        registry
            .store(&ServiceRecord { pid: 1, port: 2 })
            .unwrap();
        registry.delete().unwrap();
        assert_eq!(registry.load(), None);
    }
}
