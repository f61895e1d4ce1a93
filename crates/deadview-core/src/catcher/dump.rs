//! Local dump: write this process's snapshot to the report file.

use std::sync::Arc;

use anyhow::{Context, Result};

use super::context::CatcherContext;
use crate::report_file::ReportFile;
use crate::snapshot::Snapshot;

/// Writes the current process's snapshot on demand
#[derive(Clone)]
pub struct Dumper {
    ctx: Arc<CatcherContext>,
    file: ReportFile,
}

impl Dumper {
    pub fn new(ctx: Arc<CatcherContext>, file: ReportFile) -> Self {
        Self { ctx, file }
    }

    /// Snapshot the registry and replace the report file with it
    pub fn dump(&self) -> Result<Snapshot> {
        tracing::info!(">> Dumping dead views...");
        let snapshot = self.ctx.snapshot();
        self.file
            .write(&snapshot)
            .with_context(|| format!("Failed to write dead views of pid {}", snapshot.pid))?;
        tracing::info!(">> Dead views dumped to {}", self.file.path().display());
        Ok(snapshot)
    }

    /// Signal entry point: never fails, only logs
    pub fn handle_signal(&self) {
        if let Err(e) = self.dump() {
            tracing::error!("Dead views dump failed: {:?}", e);
        }
    }

    /// [`handle_signal`](Self::handle_signal) on the blocking pool, since the
    /// write syncs to disk
    pub async fn handle_signal_blocking(&self) {
        let dumper = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || dumper.handle_signal()).await {
            tracing::error!("Dead views dump task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = ReportFile::new(dir.path().join("tmp/dead_views.txt"));
        let ctx = Arc::new(CatcherContext::with_pid(["a.html", "b.html"], 8));
        ctx.record_render("b.html").unwrap();

        let dumper = Dumper::new(ctx, file.clone());
        let written = dumper.dump().unwrap();

        let read = file.read_snapshot().unwrap();
        assert_eq!(read, written);
        assert_eq!(read.dead_views.keys().collect::<Vec<_>>(), vec!["a.html"]);
    }

    #[tokio::test]
    async fn test_blocking_dump_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = ReportFile::new(dir.path().join("dead_views.txt"));
        let ctx = Arc::new(CatcherContext::with_pid(["a.html"], 31));

        Dumper::new(ctx, file.clone()).handle_signal_blocking().await;

        assert_eq!(file.read_snapshot().unwrap().pid, 31);
    }

    #[test]
    fn test_dump_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // parent is a regular file, so the directory cannot be created
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let file = ReportFile::new(blocker.join("dead_views.txt"));

        let dumper = Dumper::new(Arc::new(CatcherContext::new(["a.html"])), file.clone());
        assert!(dumper.dump().is_err());
        dumper.handle_signal();
        assert!(!file.exists());
    }
}
