//! deadview-core: find the templates your production traffic never renders.
//!
//! A host process builds one [`CatcherContext`](catcher::CatcherContext) at
//! startup, feeds render events into it through a
//! [`RenderHook`](catcher::RenderHook), and installs the signal tasks with
//! [`catcher::watch`]. Operators then:
//!
//! - send the dump signal (`TRAP` by default) to one process to write its
//!   own stats to the report file, or
//! - send the aggregate signal (`URG` by default) to one process, which fans
//!   the dump signal out to every sibling matching the process filter, polls
//!   the report file for each answer and writes a consolidated report.
//!
//! ```ignore
//! let settings = Settings::load(None)?;
//! let templates = templates::scan(&settings.root, &settings.views_dir)?;
//! let ctx = Arc::new(CatcherContext::new(templates));
//! let handle = catcher::watch(&settings, ctx.clone())?;
//! let hook = RenderHook::new(ctx, &settings.root, &settings.views_dir);
//! ```

pub mod catcher;
pub mod config;
pub mod error;
pub mod process;
pub mod registry;
pub mod report_file;
pub mod snapshot;
pub mod templates;

pub use catcher::{CatcherContext, RenderHook, WatchHandle};
pub use config::Settings;
pub use error::CatcherError;
pub use registry::UsageRegistry;
pub use snapshot::{ConsolidatedReport, Snapshot};
