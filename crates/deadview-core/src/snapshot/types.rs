//! Snapshot and consolidated report records.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::registry;

/// Telemetry of a single process, as written on a dump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Hours since the catcher started, two decimals
    pub running_hours: f64,
    /// Renders recorded since startup
    pub views_rendered: u64,
    /// When the snapshot was taken
    #[serde(rename = "time")]
    pub captured_at: DateTime<Local>,
    /// Process that wrote the snapshot
    pub pid: u32,
    /// Last error swallowed by the render hook (zero or one entry)
    pub exception_caught: Vec<String>,
    /// Templates with zero renders
    pub dead_views: BTreeMap<String, u64>,
    /// Render count of every tracked template
    pub complete_stats: BTreeMap<String, u64>,
}

/// Snapshots of several sibling processes folded together.
///
/// `pids[0]` is the process that ran the aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    /// Processes whose snapshot made it into the totals, in collection order
    pub pids: Vec<u32>,
    /// Always `pids.len()`
    pub nb_instances: usize,
}

impl ConsolidatedReport {
    /// Start a report from the orchestrating process's own snapshot
    pub fn seed(own: Snapshot) -> Self {
        let pid = own.pid;
        Self {
            snapshot: own,
            pids: vec![pid],
            nb_instances: 1,
        }
    }

    /// Pid of the most recently absorbed snapshot
    pub fn last_pid(&self) -> u32 {
        self.pids.last().copied().unwrap_or(self.snapshot.pid)
    }

    /// Fold a sibling snapshot into the totals.
    ///
    /// Hours, renders and per-template counts are summed. The exception list
    /// holds at most one entry, so a sibling's error replaces the current one.
    pub fn absorb(&mut self, sibling: &Snapshot) {
        let total = &mut self.snapshot;
        total.running_hours = round_hours(total.running_hours + sibling.running_hours);
        total.views_rendered += sibling.views_rendered;
        if !sibling.exception_caught.is_empty() {
            total.exception_caught = sibling.exception_caught.clone();
        }
        for (template, count) in &sibling.complete_stats {
            *total.complete_stats.entry(template.clone()).or_insert(0) += count;
        }

        self.pids.push(sibling.pid);
        self.nb_instances = self.pids.len();
    }

    /// Recompute dead views from the merged stats
    pub fn finish(&mut self) {
        self.snapshot.dead_views = registry::dead_entries(&self.snapshot.complete_stats);
    }
}

/// Round to two decimals
pub(crate) fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}
