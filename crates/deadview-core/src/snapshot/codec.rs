//! Conversion between the registry and the shared text format (YAML).
//!
//! Decoding never panics: a missing, truncated or half-written report is
//! just an error the caller can retry on. Every field is required, and a
//! record whose totals disagree with its stats is rejected, so a report cut
//! at a line boundary does not pass for a complete one.

use std::time::{Duration, Instant};

use chrono::Local;
use serde::Serialize;

use super::types::{round_hours, ConsolidatedReport, Snapshot};
use crate::error::CatcherError;
use crate::registry::{self, UsageRegistry};

/// Build a snapshot of `registry` as seen by process `pid`
pub fn encode(
    registry: &UsageRegistry,
    started_at: Instant,
    last_exception: Option<&str>,
    pid: u32,
) -> Snapshot {
    Snapshot {
        running_hours: running_hours(started_at.elapsed()),
        views_rendered: registry.total_renders(),
        captured_at: Local::now(),
        pid,
        exception_caught: last_exception.map(str::to_string).into_iter().collect(),
        dead_views: registry.dead_entries(),
        complete_stats: registry.counts().clone(),
    }
}

/// Elapsed time in hours, rounded to two decimals
pub fn running_hours(elapsed: Duration) -> f64 {
    round_hours(elapsed.as_secs_f64() / 3600.0)
}

/// Render any report record as YAML text
pub fn serialize<T: Serialize>(record: &T) -> Result<String, CatcherError> {
    Ok(serde_yaml::to_string(record)?)
}

/// Render a consolidated report as YAML text
pub fn encode_report(report: &ConsolidatedReport) -> Result<String, CatcherError> {
    serialize(report)
}

/// Parse a snapshot from report file content.
///
/// Consolidated reports decode as well; their `pid` is the orchestrator's.
pub fn decode(bytes: &[u8]) -> Result<Snapshot, CatcherError> {
    let snapshot: Snapshot = serde_yaml::from_slice(bytes)?;
    check_totals(&snapshot)?;
    Ok(snapshot)
}

/// Parse a consolidated report from report file content
pub fn decode_report(bytes: &[u8]) -> Result<ConsolidatedReport, CatcherError> {
    let report: ConsolidatedReport = serde_yaml::from_slice(bytes)?;
    check_totals(&report.snapshot)?;
    if report.nb_instances != report.pids.len() {
        return Err(CatcherError::Incomplete {
            reason: format!(
                "nb_instances is {} but {} pids are listed",
                report.nb_instances,
                report.pids.len()
            ),
        });
    }
    if report.pids.first() != Some(&report.snapshot.pid) {
        return Err(CatcherError::Incomplete {
            reason: format!("pid {} does not lead the pid list", report.snapshot.pid),
        });
    }
    Ok(report)
}

/// Render total and dead views must both follow from `complete_stats`
fn check_totals(snapshot: &Snapshot) -> Result<(), CatcherError> {
    let sum: u64 = snapshot.complete_stats.values().sum();
    if snapshot.views_rendered != sum {
        return Err(CatcherError::Incomplete {
            reason: format!(
                "views_rendered is {} but stats add up to {}",
                snapshot.views_rendered, sum
            ),
        });
    }
    if snapshot.dead_views != registry::dead_entries(&snapshot.complete_stats) {
        return Err(CatcherError::Incomplete {
            reason: "dead_views does not match complete_stats".to_string(),
        });
    }
    Ok(())
}
