//! The shared report file used as rendezvous between sibling processes.
//!
//! Every dump fully replaces the file, so only the latest report survives.
//! The file is not locked: readers must expect stale, missing or corrupt
//! content and retry.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::error::CatcherError;
use crate::snapshot::{self, ConsolidatedReport, Snapshot};

/// Number of reads attempted per sibling before giving up
pub const POLL_ATTEMPTS: u32 = 15;

/// Pause between two reads of the same sibling
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sequence number of temp files created by this process
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Handle to the report file location
#[derive(Debug, Clone)]
pub struct ReportFile {
    path: PathBuf,
}

impl ReportFile {
    /// Create a handle for `path` (nothing is touched on disk)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the report file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the report file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Replace the file content with `record`.
    ///
    /// Writes to a temp file first and renames it over the report. Temp
    /// names carry the pid and a per-process sequence number, so the dump and
    /// aggregate tasks of one process may write at the same time.
    pub fn write<T: Serialize>(&self, record: &T) -> Result<(), CatcherError> {
        let text = snapshot::serialize(record)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| CatcherError::io(dir, e))?;
        }

        let temp_path = self.temp_path();
        // Leftover from a crashed process that had the same pid
        let _ = fs::remove_file(&temp_path);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| CatcherError::io(&temp_path, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| CatcherError::io(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| CatcherError::io(&temp_path, e))?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            CatcherError::io(&self.path, e)
        })
    }

    /// Read the raw file content
    pub fn read_bytes(&self) -> Result<Vec<u8>, CatcherError> {
        fs::read(&self.path).map_err(|e| CatcherError::io(&self.path, e))
    }

    /// Read whatever snapshot is currently in the file
    pub fn read_snapshot(&self) -> Result<Snapshot, CatcherError> {
        snapshot::decode(&self.read_bytes()?)
    }

    /// Read a consolidated report from the file
    pub fn read_report(&self) -> Result<ConsolidatedReport, CatcherError> {
        snapshot::decode_report(&self.read_bytes()?)
    }

    /// Wait for a snapshot written by `pid`.
    ///
    /// A read only counts when the decoded pid is `pid` and differs from
    /// `previous_pid`. Read and decode failures are treated as "not written
    /// yet". Gives up with [`CatcherError::SiblingTimeout`] after `attempts`
    /// reads spaced by `interval`.
    pub async fn poll_snapshot(
        &self,
        pid: u32,
        previous_pid: u32,
        attempts: u32,
        interval: Duration,
    ) -> Result<Snapshot, CatcherError> {
        for attempt in 1..=attempts {
            match self.read_snapshot() {
                Ok(snapshot) if snapshot.pid == pid && snapshot.pid != previous_pid => {
                    tracing::debug!("pid {} answered after {} reads", pid, attempt);
                    return Ok(snapshot);
                }
                Ok(snapshot) => {
                    tracing::debug!(
                        "read {}/{}: report still from pid {}",
                        attempt,
                        attempts,
                        snapshot.pid
                    );
                }
                Err(e) => {
                    tracing::debug!("read {}/{}: not ready ({})", attempt, attempts, e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(CatcherError::SiblingTimeout { pid, attempts })
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.path.with_file_name(format!(
            ".{}.{}.{}.tmp",
            name,
            std::process::id(),
            seq
        ))
    }
}
