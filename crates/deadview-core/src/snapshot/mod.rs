//! Point-in-time telemetry records and their text encoding.

pub mod codec;
pub mod types;

pub use codec::{decode, decode_report, encode, encode_report, running_hours, serialize};
pub use types::{ConsolidatedReport, Snapshot};
