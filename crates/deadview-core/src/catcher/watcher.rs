//! Signal subscriptions driving dumps and aggregations.
//!
//! Each signal gets its own task. A task handles one delivery at a time;
//! signals arriving meanwhile coalesce into one more run, which is safe
//! because every run fully replaces the report file.

use std::sync::Arc;

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use super::aggregate::Aggregator;
use super::context::CatcherContext;
use super::dump::Dumper;
use crate::config::Settings;
use crate::process::{KillSignaller, ProcScanner, ProcessFinder, Signaller};
use crate::report_file::ReportFile;

/// Running signal tasks; dropping it unsubscribes them
pub struct WatchHandle {
    dump_task: JoinHandle<()>,
    aggregate_task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Whether the aggregate signal is being listened to
    pub fn is_aggregating(&self) -> bool {
        self.aggregate_task.is_some()
    }

    /// Stop listening to both signals
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.dump_task.abort();
        if let Some(task) = &self.aggregate_task {
            task.abort();
        }
    }
}

/// Install the dump task, and the aggregate task when a process filter is
/// configured. Must run inside a tokio runtime.
pub fn watch(settings: &Settings, ctx: Arc<CatcherContext>) -> Result<WatchHandle> {
    watch_with(
        settings,
        ctx,
        Arc::new(ProcScanner::new()),
        Arc::new(KillSignaller),
    )
}

/// [`watch`] with explicit discovery and signalling collaborators
pub fn watch_with(
    settings: &Settings,
    ctx: Arc<CatcherContext>,
    finder: Arc<dyn ProcessFinder>,
    signaller: Arc<dyn Signaller>,
) -> Result<WatchHandle> {
    let dump_signal = settings.dump_signal()?;
    let aggregate_signal = settings.aggregate_signal()?;
    if dump_signal == aggregate_signal {
        anyhow::bail!(
            "Dump and aggregate signals must differ (both are {})",
            dump_signal.as_str()
        );
    }

    let file = ReportFile::new(settings.report_path());

    let dumper = Dumper::new(ctx.clone(), file.clone());
    let mut dump_stream = subscribe(dump_signal)?;
    let dump_task = tokio::spawn(async move {
        while dump_stream.recv().await.is_some() {
            dumper.handle_signal_blocking().await;
        }
    });
    tracing::info!(
        "Dead view catcher started: {} dumps pid {} to {}",
        dump_signal.as_str(),
        ctx.pid(),
        file.path().display()
    );

    let aggregate_task = match &settings.process_filter {
        Some(filter) => {
            let aggregator = Aggregator::new(
                ctx,
                file,
                finder,
                signaller,
                dump_signal,
                filter.clone(),
            );
            let mut aggregate_stream = match subscribe(aggregate_signal) {
                Ok(stream) => stream,
                Err(e) => {
                    dump_task.abort();
                    return Err(e);
                }
            };
            let task = tokio::spawn(async move {
                while aggregate_stream.recv().await.is_some() {
                    aggregator.handle_signal().await;
                }
            });
            tracing::info!(
                "{} aggregates all processes matching {:?}",
                aggregate_signal.as_str(),
                filter
            );
            Some(task)
        }
        None => {
            tracing::debug!("No process filter, aggregation disabled");
            None
        }
    };

    Ok(WatchHandle {
        dump_task,
        aggregate_task,
    })
}

fn subscribe(sig: Signal) -> Result<tokio::signal::unix::Signal> {
    signal(SignalKind::from_raw(sig as i32))
        .with_context(|| format!("Failed to install {} handler", sig.as_str()))
}
