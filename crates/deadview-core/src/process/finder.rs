use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use std::process::Command;

/// `ps -eo pid=,args=` output line
static PS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s+(.*)$").expect("Invalid PS_LINE regex"));

/// Binary name of the deadview CLI
const CLIENT_BIN: &str = "deadview";

/// CLI subcommands that signal hosts without hosting a catcher themselves
const CLIENT_COMMANDS: &[&str] = &["dump", "aggregate", "show"];

/// Source of sibling process ids
pub trait ProcessFinder: Send + Sync {
    /// Pids of live processes whose command line matches `filter`,
    /// excluding the calling process
    fn find(&self, filter: &str) -> Result<Vec<u32>>;
}

/// Finds processes by command line, reading `/proc` or falling back to `ps`
pub struct ProcScanner {
    /// Root of the proc filesystem
    proc_root: PathBuf,
    /// Pid excluded from every result
    self_pid: u32,
}

impl ProcScanner {
    /// Scanner over the live `/proc`, excluding this process
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            self_pid: std::process::id(),
        }
    }

    /// Scanner over a custom proc root and self pid
    pub fn with_proc_root(proc_root: impl Into<PathBuf>, self_pid: u32) -> Self {
        Self {
            proc_root: proc_root.into(),
            self_pid,
        }
    }

    /// Read (pid, cmdline) pairs from the proc filesystem
    fn list_proc(&self) -> Result<Vec<(u32, String)>> {
        let mut processes = Vec::new();
        for entry in std::fs::read_dir(&self.proc_root)
            .with_context(|| format!("Failed to read {:?}", self.proc_root))?
        {
            let entry = entry?;
            let pid: u32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                Some(pid) => pid,
                None => continue,
            };
            // Processes may exit between readdir and read
            if let Some(cmdline) = read_cmdline(&entry.path()) {
                processes.push((pid, cmdline));
            }
        }
        Ok(processes)
    }

    /// Read (pid, args) pairs from `ps`
    fn list_ps(&self) -> Result<Vec<(u32, String)>> {
        let output = Command::new("ps")
            .args(["-eo", "pid=,args="])
            .output()
            .context("Failed to execute ps")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ps failed: {}", stderr);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ps_output(&stdout))
    }
}

impl Default for ProcScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessFinder for ProcScanner {
    fn find(&self, filter: &str) -> Result<Vec<u32>> {
        let matcher = build_matcher(filter)?;
        let mut processes = if self.proc_root.is_dir() {
            self.list_proc()?
        } else {
            self.list_ps()?
        };
        processes.sort_by_key(|(pid, _)| *pid);

        Ok(select(processes, &matcher, self.self_pid))
    }
}

/// Case-insensitive matcher for a filter, like `grep -i`.
///
/// Filters that are not valid regexes are matched literally.
fn build_matcher(filter: &str) -> Result<Regex> {
    let filter = filter.trim();
    if filter.is_empty() {
        anyhow::bail!("Process filter is empty");
    }
    RegexBuilder::new(filter)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(filter))
                .case_insensitive(true)
                .build()
        })
        .context("Failed to build process filter")
}

/// Matching pids in input order, without self, duplicates or deadview
/// client invocations
fn select(processes: Vec<(u32, String)>, matcher: &Regex, self_pid: u32) -> Vec<u32> {
    let mut pids: Vec<u32> = Vec::new();
    for (pid, cmdline) in processes {
        if pid == self_pid || pids.contains(&pid) {
            continue;
        }
        // Its argv often carries the filter, and it has no dump handler
        if is_client(&cmdline) {
            tracing::debug!("Ignoring deadview client pid {}: {}", pid, cmdline);
            continue;
        }
        if matcher.is_match(&cmdline) {
            pids.push(pid);
        }
    }
    pids
}

/// Whether `cmdline` runs a deadview subcommand other than `serve`
fn is_client(cmdline: &str) -> bool {
    let mut args = cmdline.split_whitespace();
    let is_deadview = args
        .next()
        .and_then(|bin| Path::new(bin).file_name())
        .map_or(false, |name| name == CLIENT_BIN);
    is_deadview && args.any(|arg| CLIENT_COMMANDS.contains(&arg))
}

fn read_cmdline(proc_dir: &Path) -> Option<String> {
    let raw = std::fs::read(proc_dir.join("cmdline")).ok()?;
    let cmdline = String::from_utf8_lossy(&raw)
        .replace('\0', " ")
        .trim()
        .to_string();
    // Kernel threads have no command line
    if cmdline.is_empty() {
        None
    } else {
        Some(cmdline)
    }
}

fn parse_ps_output(stdout: &str) -> Vec<(u32, String)> {
    stdout
        .lines()
        .filter_map(|line| {
            let caps = PS_LINE.captures(line)?;
            let pid = caps[1].parse().ok()?;
            Some((pid, caps[2].trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn fake_proc(entries: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, cmdline) in entries {
            let proc_dir = dir.path().join(name);
            fs::create_dir_all(&proc_dir).unwrap();
            fs::write(proc_dir.join("cmdline"), cmdline).unwrap();
        }
        dir
    }

    #[test]
    fn test_proc_scan_matches_filter_and_excludes_self() {
        let proc_root = fake_proc(&[
            ("101", "unicorn worker[0]\0-c\0config.rb"),
            ("102", "unicorn worker[1]\0-c\0config.rb"),
            ("103", "UNICORN master\0"),
            ("200", "sshd\0"),
            ("300", ""),
            ("self", "unicorn\0"),
            ("stat", "unicorn\0"),
        ]);
        let scanner = ProcScanner::with_proc_root(proc_root.path(), 102);

        let pids = scanner.find("unicorn").unwrap();
        assert_eq!(pids, vec![101, 103]);
    }

    #[test]
    fn test_filter_regex_and_literal_fallback() {
        let proc_root = fake_proc(&[
            ("1", "puma: cluster worker 0\0"),
            ("2", "puma: cluster worker 1\0"),
            ("3", "weird [app\0"),
        ]);
        let scanner = ProcScanner::with_proc_root(proc_root.path(), 999);

        assert_eq!(scanner.find("worker [01]").unwrap(), vec![1, 2]);
        // unbalanced bracket is matched literally
        assert_eq!(scanner.find("[app").unwrap(), vec![3]);
    }

    #[test]
    fn test_empty_filter_is_error() {
        let proc_root = fake_proc(&[]);
        let scanner = ProcScanner::with_proc_root(proc_root.path(), 1);
        assert!(scanner.find("   ").is_err());
    }

    #[test]
    fn test_parse_ps_output() {
        let out = "    1 /sbin/init\n  42 unicorn worker[0]\nbogus line\n";
        assert_eq!(
            parse_ps_output(out),
            vec![
                (1, "/sbin/init".to_string()),
                (42, "unicorn worker[0]".to_string()),
            ]
        );
    }

    #[test]
    fn test_client_invocations_are_not_siblings() {
        let proc_root = fake_proc(&[
            ("10", "/usr/local/bin/deadview\0serve\0--filter\0deadview serve"),
            ("11", "deadview\0--filter\0deadview serve\0aggregate\010"),
            ("12", "/usr/local/bin/deadview\0dump\010\0--filter\0deadview serve"),
            ("13", "target/debug/deadview\0--root\0/srv\0serve\0--filter\0deadview serve"),
            ("14", "vim\0deadview serve aggregate notes"),
        ]);
        let scanner = ProcScanner::with_proc_root(proc_root.path(), 999);

        assert_eq!(scanner.find("deadview serve").unwrap(), vec![10, 13, 14]);
    }

    #[test]
    fn test_is_client() {
        assert!(is_client("deadview show --json"));
        assert!(is_client("/opt/bin/deadview --debug aggregate 42"));
        assert!(!is_client("deadview serve"));
        assert!(!is_client("deadview-host dump"));
        assert!(!is_client(""));
    }

    #[test]
    fn test_select_dedupes_in_order() {
        let matcher = build_matcher("app").unwrap();
        let processes = vec![
            (5, "app".to_string()),
            (3, "app".to_string()),
            (5, "app".to_string()),
            (7, "other".to_string()),
        ];
        assert_eq!(select(processes, &matcher, 0), vec![5, 3]);
    }
}
