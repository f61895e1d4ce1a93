//! Process-wide telemetry state, owned by the host and shared by handle.

use std::time::Instant;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::error::CatcherError;
use crate::registry::UsageRegistry;
use crate::snapshot::{self, Snapshot};

/// The single telemetry instance of a process.
///
/// Created once at startup and handed (as `Arc`) to the render hook and
/// both signal tasks.
pub struct CatcherContext {
    /// Pid stamped on every snapshot
    pid: u32,
    /// Monotonic start, for running hours
    started_at: Instant,
    /// Wall clock start, for display
    started_on: DateTime<Local>,
    registry: Mutex<UsageRegistry>,
    /// Last error swallowed by the render hook
    last_exception: Mutex<Option<String>>,
}

impl CatcherContext {
    /// Track `templates` for the current process
    pub fn new<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_pid(templates, std::process::id())
    }

    /// Track `templates` on behalf of `pid`
    pub fn with_pid<I, S>(templates: I, pid: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pid,
            started_at: Instant::now(),
            started_on: Local::now(),
            registry: Mutex::new(UsageRegistry::new(templates)),
            last_exception: Mutex::new(None),
        }
    }

    /// Pid stamped on snapshots
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// When tracking started
    pub fn started_on(&self) -> DateTime<Local> {
        self.started_on
    }

    /// Count one render of `template_id`
    pub fn record_render(&self, template_id: &str) -> Result<(), CatcherError> {
        self.registry.lock().record_render(template_id)
    }

    /// Remember `message` as the last exception, replacing any previous one
    pub fn stash_exception(&self, message: impl Into<String>) {
        *self.last_exception.lock() = Some(message.into());
    }

    /// Last exception swallowed by the render hook
    pub fn last_exception(&self) -> Option<String> {
        self.last_exception.lock().clone()
    }

    /// Number of tracked templates
    pub fn template_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Read-only access to the registry
    pub fn with_registry<R>(&self, f: impl FnOnce(&UsageRegistry) -> R) -> R {
        f(&self.registry.lock())
    }

    /// Current state as a snapshot
    pub fn snapshot(&self) -> Snapshot {
        let last_exception = self.last_exception();
        let registry = self.registry.lock();
        snapshot::encode(
            &registry,
            self.started_at,
            last_exception.as_deref(),
            self.pid,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_renders() {
        let ctx = CatcherContext::with_pid(["a.html", "b.html"], 31);
        ctx.record_render("a.html").unwrap();
        ctx.record_render("a.html").unwrap();

        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.pid, 31);
        assert_eq!(snapshot.views_rendered, 2);
        assert_eq!(snapshot.complete_stats["a.html"], 2);
        assert_eq!(snapshot.dead_views.keys().collect::<Vec<_>>(), vec!["b.html"]);
        assert_eq!(snapshot.running_hours, 0.0);
    }

    #[test]
    fn test_exception_overwrites() {
        let ctx = CatcherContext::new(["a.html"]);
        assert!(ctx.last_exception().is_none());

        ctx.stash_exception("first");
        ctx.stash_exception("second");

        assert_eq!(ctx.last_exception().as_deref(), Some("second"));
        assert_eq!(ctx.snapshot().exception_caught, vec!["second"]);
    }

    #[test]
    fn test_default_pid_is_current_process() {
        let ctx = CatcherContext::new(Vec::<String>::new());
        assert_eq!(ctx.pid(), std::process::id());
        assert_eq!(ctx.template_count(), 0);
    }
}
