//! Error taxonomy for render telemetry.
//!
//! None of these are fatal to the host: signal tasks log them, the render
//! hook stashes them as the last exception.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for catcher operations
#[derive(Debug, Error)]
pub enum CatcherError {
    /// A render was recorded for a template outside the known universe
    #[error("template not tracked: {template}")]
    UnknownTemplate { template: String },

    /// The report could not be encoded or decoded
    #[error("report serialization failed: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// The report parsed but its totals disagree with its per-template stats
    #[error("report is incomplete: {reason}")]
    Incomplete { reason: String },

    /// A sibling never produced a matching snapshot within the poll budget
    #[error("pid {pid} did not answer within {attempts} attempts")]
    SiblingTimeout { pid: u32, attempts: u32 },

    /// The shared report file could not be read or written
    #[error("report file I/O failed on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configured signal name does not map to a signal
    #[error("unknown signal name: {name}")]
    UnknownSignal { name: String },

    /// Delivering a signal failed
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },
}

impl CatcherError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
