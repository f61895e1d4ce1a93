//! Signal names and delivery.

use std::str::FromStr;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::error::CatcherError;

/// Parse a signal name such as `TRAP`, `sigurg`, `SIGTRAP` or `5`
pub fn parse_signal(name: &str) -> Result<Signal, CatcherError> {
    let trimmed = name.trim();
    let unknown = || CatcherError::UnknownSignal {
        name: name.to_string(),
    };

    if let Ok(number) = trimmed.parse::<i32>() {
        return Signal::try_from(number).map_err(|_| unknown());
    }

    let upper = trimmed.to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    Signal::from_str(&full).map_err(|_| unknown())
}

/// Sends signals to other processes
pub trait Signaller: Send + Sync {
    /// Deliver `signal` to `pid`
    fn send(&self, pid: u32, signal: Signal) -> Result<(), CatcherError>;
}

/// Delivers signals with `kill(2)`
#[derive(Debug, Default, Clone, Copy)]
pub struct KillSignaller;

impl Signaller for KillSignaller {
    fn send(&self, pid: u32, sig: Signal) -> Result<(), CatcherError> {
        let raw = i32::try_from(pid).map_err(|_| CatcherError::Signal {
            pid,
            source: nix::errno::Errno::ESRCH,
        })?;
        signal::kill(Pid::from_raw(raw), sig)
            .map_err(|source| CatcherError::Signal { pid, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signal_names() {
        assert_eq!(parse_signal("TRAP").unwrap(), Signal::SIGTRAP);
        assert_eq!(parse_signal("urg").unwrap(), Signal::SIGURG);
        assert_eq!(parse_signal("SIGUSR2").unwrap(), Signal::SIGUSR2);
        assert_eq!(parse_signal(" SigHup ").unwrap(), Signal::SIGHUP);
        assert_eq!(parse_signal("5").unwrap(), Signal::SIGTRAP);
    }

    #[test]
    fn test_parse_signal_rejects_unknown() {
        assert!(matches!(
            parse_signal("NOPE"),
            Err(CatcherError::UnknownSignal { .. })
        ));
        assert!(parse_signal("").is_err());
        assert!(parse_signal("9999").is_err());
    }

    #[test]
    fn test_kill_missing_process_fails() {
        // pid_max on Linux is at most 2^22
        let err = KillSignaller
            .send(u32::MAX / 2, Signal::SIGURG)
            .unwrap_err();
        assert!(matches!(err, CatcherError::Signal { .. }));
    }
}
