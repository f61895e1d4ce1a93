//! Terminal output formatting for report files

use std::fmt::Write;

use deadview_core::report_file::ReportFile;
use deadview_core::{ConsolidatedReport, Snapshot};

/// Content of the report file: one process or a whole fleet
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Process(Snapshot),
    Fleet(ConsolidatedReport),
}

impl Report {
    /// Read the report file, preferring the consolidated form
    pub fn load(file: &ReportFile) -> anyhow::Result<Self> {
        let bytes = file.read_bytes()?;
        if let Ok(report) = deadview_core::snapshot::decode_report(&bytes) {
            return Ok(Self::Fleet(report));
        }
        Ok(Self::Process(deadview_core::snapshot::decode(&bytes)?))
    }

    /// The (possibly merged) snapshot part
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            Self::Process(snapshot) => snapshot,
            Self::Fleet(report) => &report.snapshot,
        }
    }

    /// Pretty JSON of the report
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::Process(snapshot) => serde_json::to_string_pretty(snapshot),
            Self::Fleet(report) => serde_json::to_string_pretty(report),
        }
    }
}

/// Whether color output is enabled (TTY + NO_COLOR not set)
fn use_color() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// ANSI color codes container (empty strings when color is disabled)
pub struct Colors {
    bold: &'static str,
    dim: &'static str,
    reset: &'static str,
    green: &'static str,
    red: &'static str,
    cyan: &'static str,
}

impl Colors {
    pub fn new() -> Self {
        if use_color() {
            Self {
                bold: "\x1b[1m",
                dim: "\x1b[2m",
                reset: "\x1b[0m",
                green: "\x1b[32m",
                red: "\x1b[31m",
                cyan: "\x1b[36m",
            }
        } else {
            Self::plain()
        }
    }

    /// No escape codes at all
    pub fn plain() -> Self {
        Self {
            bold: "",
            dim: "",
            reset: "",
            green: "",
            red: "",
            cyan: "",
        }
    }
}

impl Default for Colors {
    fn default() -> Self {
        Self::new()
    }
}

/// Print a report summary to stdout
pub fn print(report: &Report) {
    print!("{}", render(&Colors::new(), report));
}

/// Human summary of a report
pub fn render(c: &Colors, report: &Report) -> String {
    let snapshot = report.snapshot();
    let mut out = String::new();

    let title = match report {
        Report::Process(_) => format!("Dead views of pid {}", snapshot.pid),
        Report::Fleet(fleet) => format!("Dead views of {} instances", fleet.nb_instances),
    };
    let _ = writeln!(out, "{}=== {} ==={}", c.bold, title, c.reset);
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "  {}Captured:{}       {}",
        c.dim,
        c.reset,
        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Report::Fleet(fleet) = report {
        let pids: Vec<String> = fleet.pids.iter().map(|p| p.to_string()).collect();
        let _ = writeln!(out, "  {}Pids:{}           {}", c.dim, c.reset, pids.join(", "));
    }
    let _ = writeln!(
        out,
        "  {}Running hours:{}  {:.2}",
        c.dim, c.reset, snapshot.running_hours
    );
    let _ = writeln!(
        out,
        "  {}Renders:{}        {}",
        c.dim, c.reset, snapshot.views_rendered
    );

    let total = snapshot.complete_stats.len();
    let dead = snapshot.dead_views.len();
    let _ = writeln!(
        out,
        "  {}Templates:{}      {} tracked, {}{} dead{}",
        c.dim,
        c.reset,
        total,
        if dead > 0 { c.red } else { c.green },
        dead,
        c.reset
    );
    let _ = writeln!(out);

    if dead > 0 {
        let _ = writeln!(out, "  {}Never rendered:{}", c.bold, c.reset);
        for template in snapshot.dead_views.keys() {
            let _ = writeln!(out, "    {}{}{}", c.red, template, c.reset);
        }
        let _ = writeln!(out);
    }

    let mut busiest: Vec<(&String, &u64)> = snapshot
        .complete_stats
        .iter()
        .filter(|(_, &n)| n > 0)
        .collect();
    busiest.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    if !busiest.is_empty() {
        let _ = writeln!(out, "  {}Most rendered:{}", c.bold, c.reset);
        let max = *busiest[0].1;
        for (template, count) in busiest.iter().take(10) {
            let bar = make_bar(c, **count, max, 30);
            let _ = writeln!(out, "    {:<50} {:>8}  {bar}", template, count);
        }
        let _ = writeln!(out);
    }

    for exception in &snapshot.exception_caught {
        let _ = writeln!(out, "  {}Last exception:{}", c.bold, c.reset);
        for line in exception.lines() {
            let _ = writeln!(out, "    {}{}{}", c.cyan, line, c.reset);
        }
    }

    out
}

fn make_bar(c: &Colors, value: u64, max: u64, width: u64) -> String {
    if max == 0 {
        return String::new();
    }
    let filled = (value * width) / max;
    let filled = filled.max(1); // at least 1 char for non-zero values
    format!("{}{}{}", c.dim, "█".repeat(filled as usize), c.reset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::collections::BTreeMap;

    fn snapshot(pid: u32) -> Snapshot {
        let complete_stats: BTreeMap<String, u64> = [
            ("app/views/a.html".to_string(), 4),
            ("app/views/b.html".to_string(), 0),
            ("app/views/c.html".to_string(), 1),
        ]
        .into_iter()
        .collect();
        Snapshot {
            running_hours: 2.5,
            views_rendered: 5,
            captured_at: Local::now(),
            pid,
            exception_caught: vec!["template not tracked: x".to_string()],
            dead_views: [("app/views/b.html".to_string(), 0)].into_iter().collect(),
            complete_stats,
        }
    }

    #[test]
    fn test_render_process_report() {
        let text = render(&Colors::plain(), &Report::Process(snapshot(42)));

        assert!(text.contains("=== Dead views of pid 42 ==="));
        assert!(text.contains("3 tracked, 1 dead"));
        assert!(text.contains("    app/views/b.html\n"));
        assert!(text.contains("template not tracked: x"));
        // busiest first
        let a = text.find("app/views/a.html").unwrap();
        let c = text.find("app/views/c.html").unwrap();
        assert!(a < c);
    }

    #[test]
    fn test_render_fleet_report() {
        let mut fleet = ConsolidatedReport::seed(snapshot(1));
        fleet.absorb(&snapshot(2));
        fleet.finish();

        let text = render(&Colors::plain(), &Report::Fleet(fleet));
        assert!(text.contains("=== Dead views of 2 instances ==="));
        assert!(text.contains("Pids:           1, 2"));
        assert!(text.contains("Running hours:  5.00"));
    }

    #[test]
    fn test_load_distinguishes_forms() {
        let dir = tempfile::tempdir().unwrap();
        let file = ReportFile::new(dir.path().join("dead_views.txt"));

        file.write(&snapshot(7)).unwrap();
        assert!(matches!(Report::load(&file).unwrap(), Report::Process(s) if s.pid == 7));

        let mut fleet = ConsolidatedReport::seed(snapshot(7));
        fleet.finish();
        file.write(&fleet).unwrap();
        assert!(matches!(Report::load(&file).unwrap(), Report::Fleet(f) if f.nb_instances == 1));
    }

    #[test]
    fn test_json_output() {
        let json = Report::Process(snapshot(3)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["pid"], 3);
        assert_eq!(value["dead_views"]["app/views/b.html"], 0);
        assert!(value.get("time").is_some());
    }

    #[test]
    fn test_make_bar() {
        let c = Colors::plain();
        assert_eq!(make_bar(&c, 0, 0, 10), "");
        assert_eq!(make_bar(&c, 10, 10, 4), "████");
        assert_eq!(make_bar(&c, 1, 100, 4), "█");
    }
}
