//! Fleet aggregation over the shared report file.
//!
//! Siblings are visited one at a time in discovery order: send them the
//! dump signal, then poll the report file until it holds a snapshot with
//! their pid. Siblings that do not answer in time are skipped. Nothing is
//! locked, so this is best effort.

use std::sync::Arc;

use anyhow::{Context, Result};
use nix::sys::signal::Signal;

use super::context::CatcherContext;
use crate::error::CatcherError;
use crate::process::{ProcessFinder, Signaller};
use crate::report_file::{ReportFile, POLL_ATTEMPTS, POLL_INTERVAL};
use crate::snapshot::{ConsolidatedReport, Snapshot};

/// Collects and merges snapshots of all sibling processes
#[derive(Clone)]
pub struct Aggregator {
    ctx: Arc<CatcherContext>,
    file: ReportFile,
    finder: Arc<dyn ProcessFinder>,
    signaller: Arc<dyn Signaller>,
    /// Signal asking a sibling to dump
    dump_signal: Signal,
    /// Command line filter used to discover siblings
    filter: String,
}

impl Aggregator {
    pub fn new(
        ctx: Arc<CatcherContext>,
        file: ReportFile,
        finder: Arc<dyn ProcessFinder>,
        signaller: Arc<dyn Signaller>,
        dump_signal: Signal,
        filter: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            file,
            finder,
            signaller,
            dump_signal,
            filter: filter.into(),
        }
    }

    /// Gather every reachable sibling and write the consolidated report.
    ///
    /// On error nothing is written.
    pub async fn aggregate(&self) -> Result<ConsolidatedReport> {
        tracing::info!(">> Starting gathering consolidated dead views...");

        let siblings = self.discover().await?;
        tracing::debug!("Siblings matching {:?}: {:?}", self.filter, siblings);

        let mut report = ConsolidatedReport::seed(self.ctx.snapshot());
        for pid in siblings {
            if pid == self.ctx.pid() {
                continue;
            }
            match self.collect(pid, report.last_pid()).await {
                Ok(snapshot) => {
                    tracing::info!("  >> Aggregating data from pid {}", pid);
                    report.absorb(&snapshot);
                }
                Err(e) => {
                    tracing::warn!("  >> pid {} skipped: {}", pid, e);
                }
            }
        }
        report.finish();

        let report = self.write(report).await?;
        tracing::info!(
            ">> Consolidated dead views of {} instances dumped to {}",
            report.nb_instances,
            self.file.path().display()
        );
        Ok(report)
    }

    /// Signal entry point: never fails, only logs
    pub async fn handle_signal(&self) {
        if let Err(e) = self.aggregate().await {
            tracing::error!("Dead views aggregation aborted: {:?}", e);
        }
    }

    /// Run the process finder off the async runtime (it may shell out)
    async fn discover(&self) -> Result<Vec<u32>> {
        let finder = self.finder.clone();
        let filter = self.filter.clone();
        tokio::task::spawn_blocking(move || finder.find(&filter))
            .await
            .context("Process discovery task failed")?
            .context("Failed to discover sibling processes")
    }

    /// Write the report from the blocking pool and hand it back
    async fn write(&self, report: ConsolidatedReport) -> Result<ConsolidatedReport> {
        let file = self.file.clone();
        tokio::task::spawn_blocking(move || file.write(&report).map(|()| report))
            .await
            .context("Report write task failed")?
            .context("Failed to write consolidated dead views")
    }

    /// Ask `pid` to dump and wait for its snapshot
    async fn collect(&self, pid: u32, previous_pid: u32) -> Result<Snapshot, CatcherError> {
        self.signaller.send(pid, self.dump_signal)?;
        self.file
            .poll_snapshot(pid, previous_pid, POLL_ATTEMPTS, POLL_INTERVAL)
            .await
    }
}
