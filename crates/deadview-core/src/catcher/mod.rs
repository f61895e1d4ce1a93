//! Render telemetry wiring: the owned context, the two signal-driven
//! procedures (dump and aggregate) and the render hook.

mod aggregate;
mod context;
mod dump;
mod hook;
mod watcher;

pub use aggregate::Aggregator;
pub use context::CatcherContext;
pub use dump::Dumper;
pub use hook::{RenderHook, RenderObserver};
pub use watcher::{watch, watch_with, WatchHandle};
