//! Subcommand implementations

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use nix::sys::signal::Signal;

use deadview_core::process::{KillSignaller, Signaller};
use deadview_core::report_file::{ReportFile, POLL_INTERVAL};
use deadview_core::Settings;

use crate::config::Command;
use crate::report::{self, Report};

/// Dispatch a parsed subcommand
pub async fn run(command: &Command, settings: Settings) -> Result<()> {
    match command {
        Command::Serve => crate::host::run(settings).await,
        Command::Dump { pid, timeout_secs } => {
            let report = dump(&settings, *pid, Duration::from_secs(*timeout_secs)).await?;
            report::print(&report);
            Ok(())
        }
        Command::Aggregate { pid, timeout_secs } => {
            let report = aggregate(&settings, *pid, Duration::from_secs(*timeout_secs)).await?;
            report::print(&report);
            Ok(())
        }
        Command::Show { json } => show(&settings, *json),
    }
}

/// Send the dump signal to `pid` and wait for its snapshot
pub async fn dump(settings: &Settings, pid: u32, timeout: Duration) -> Result<Report> {
    let file = ReportFile::new(settings.report_path());
    let requested_at = request(pid, settings.dump_signal()?)?;

    wait_for(&file, timeout, |report| match report {
        Report::Process(snapshot) => snapshot.pid == pid && snapshot.captured_at >= requested_at,
        Report::Fleet(_) => false,
    })
    .await
    .with_context(|| format!("pid {} did not dump to {}", pid, file.path().display()))
}

/// Send the aggregate signal to `pid` and wait for its consolidated report
pub async fn aggregate(settings: &Settings, pid: u32, timeout: Duration) -> Result<Report> {
    let file = ReportFile::new(settings.report_path());
    let requested_at = request(pid, settings.aggregate_signal()?)?;

    wait_for(&file, timeout, |report| match report {
        Report::Fleet(fleet) => {
            fleet.snapshot.pid == pid && fleet.snapshot.captured_at >= requested_at
        }
        Report::Process(_) => false,
    })
    .await
    .with_context(|| {
        format!(
            "pid {} did not write a consolidated report to {} (is a process filter configured?)",
            pid,
            file.path().display()
        )
    })
}

/// Print the current report file
pub fn show(settings: &Settings, json: bool) -> Result<()> {
    let file = ReportFile::new(settings.report_path());
    let report = Report::load(&file)
        .with_context(|| format!("No readable report at {}", file.path().display()))?;
    if json {
        println!("{}", report.to_json()?);
    } else {
        report::print(&report);
    }
    Ok(())
}

fn request(pid: u32, signal: Signal) -> Result<DateTime<Local>> {
    let requested_at = Local::now();
    KillSignaller.send(pid, signal)?;
    tracing::debug!("Sent {} to pid {}", signal.as_str(), pid);
    Ok(requested_at)
}

/// Poll the report file until `accept` holds or `timeout` elapses.
///
/// Unreadable content counts as not ready.
async fn wait_for(
    file: &ReportFile,
    timeout: Duration,
    accept: impl Fn(&Report) -> bool,
) -> Result<Report> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(report) = Report::load(file) {
            if accept(&report) {
                return Ok(report);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("timed out after {:?}", timeout);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
