//! Archival sinks for closed procedures.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use tracing::{debug, warn};

use super::StoreError;
use crate::types::Procedure;

/// Receives each closed procedure exactly once.
pub trait ArchiveSink: Send + Sync {
    fn append(&self, record: &Procedure) -> Result<(), StoreError>;

    fn sink_name(&self) -> &'static str;
}

// ============================================================================
// JSONL journal
// ============================================================================

/// Line-delimited JSON journal, one archived procedure per line.
pub struct JsonlArchive {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlArchive {
    /// Open (or create) the journal for appending, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "Archive journal opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in a journal. Malformed lines are skipped with a warning.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<Procedure>, StoreError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Procedure>(&line) {
                Ok(p) => records.push(p),
                Err(e) => {
                    warn!(path = %path.display(), line = idx + 1, error = %e, "Skipping malformed archive line");
                }
            }
        }
        Ok(records)
    }
}

impl ArchiveSink for JsonlArchive {
    fn append(&self, record: &Procedure) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self
            .file
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "Jsonl"
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-process sink for tests and embedding.
#[derive(Default)]
pub struct MemoryArchive {
    records: RwLock<Vec<Procedure>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Procedure> {
        self.records
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArchiveSink for MemoryArchive {
    fn append(&self, record: &Procedure) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "Memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CloseReason, ProcedureType};

    fn closed(id: &str) -> Procedure {
        let mut p = Procedure::new(id, "U1", ProcedureType::InitialAccess, "RRCSetupComplete", 0);
        p.close(CloseReason::Success, 100);
        p
    }

    #[test]
    fn test_jsonl_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/archive.jsonl");
        let archive = JsonlArchive::open(&path).unwrap();
        archive.append(&closed("a")).unwrap();
        archive.append(&closed("b")).unwrap();

        let records = JsonlArchive::read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].procedure_id, "b");
        assert_eq!(records[0].end_time_ms, Some(100));
    }

    #[test]
    fn test_jsonl_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.jsonl");
        JsonlArchive::open(&path).unwrap().append(&closed("a")).unwrap();
        JsonlArchive::open(&path).unwrap().append(&closed("b")).unwrap();
        assert_eq!(JsonlArchive::read_all(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_jsonl_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.jsonl");
        let archive = JsonlArchive::open(&path).unwrap();
        archive.append(&closed("a")).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json}\n\n")
            .unwrap();
        assert_eq!(JsonlArchive::read_all(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_memory_archive() {
        let archive = MemoryArchive::new();
        assert!(archive.is_empty());
        archive.append(&closed("a")).unwrap();
        assert_eq!(archive.records()[0].close_reason, Some(CloseReason::Success));
    }
}
