//! Sibling process discovery and signal delivery.

pub mod finder;
pub mod signal;

pub use finder::{ProcScanner, ProcessFinder};
pub use signal::{parse_signal, KillSignaller, Signaller};
