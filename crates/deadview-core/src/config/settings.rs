use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CatcherError;
use crate::process::parse_signal;

/// Catcher settings (from config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Signal that makes a process dump its own stats
    #[serde(default = "default_dump_signal")]
    pub dump_signal: String,

    /// Signal that makes a process aggregate stats of all siblings
    #[serde(default = "default_aggregate_signal")]
    pub aggregate_signal: String,

    /// Report file, relative to `root` unless absolute
    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,

    /// Command line filter for sibling discovery.
    /// Aggregation is disabled when unset.
    #[serde(default)]
    pub process_filter: Option<String>,

    /// Project root; template ids are relative to it
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Directory holding templates, relative to `root`
    #[serde(default = "default_views_dir")]
    pub views_dir: PathBuf,
}

// SIGUSR1/SIGUSR2 are left alone: app servers such as unicorn use them
fn default_dump_signal() -> String {
    "TRAP".to_string()
}

fn default_aggregate_signal() -> String {
    "URG".to_string()
}

fn default_report_file() -> PathBuf {
    PathBuf::from("tmp/dead_views.txt")
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_views_dir() -> PathBuf {
    PathBuf::from("app/views")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dump_signal: default_dump_signal(),
            aggregate_signal: default_aggregate_signal(),
            report_file: default_report_file(),
            process_filter: None,
            root: default_root(),
            views_dir: default_views_dir(),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                return Self::from_file(p);
            }
            tracing::warn!("Config file {:?} not found, using defaults", p);
        }

        // Try default config locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("deadview/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/deadview/config.toml")),
            dirs::home_dir().map(|p| p.join(".deadview.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        // Return defaults if no config file found
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Override values given on the command line (CLI takes precedence)
    pub fn merge_cli(
        &mut self,
        root: Option<&PathBuf>,
        report_file: Option<&PathBuf>,
        process_filter: Option<&String>,
    ) {
        if let Some(root) = root {
            self.root = root.clone();
        }
        if let Some(report_file) = report_file {
            self.report_file = report_file.clone();
        }
        if let Some(filter) = process_filter {
            self.process_filter = Some(filter.clone());
        }
    }

    /// Normalize values: trim signal names, drop a blank filter
    pub fn validate(&mut self) {
        self.dump_signal = self.dump_signal.trim().to_string();
        self.aggregate_signal = self.aggregate_signal.trim().to_string();
        self.process_filter = self
            .process_filter
            .take()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
    }

    /// Report file location with `root` applied
    pub fn report_path(&self) -> PathBuf {
        if self.report_file.is_absolute() {
            self.report_file.clone()
        } else {
            self.root.join(&self.report_file)
        }
    }

    /// Parsed dump signal
    pub fn dump_signal(&self) -> Result<Signal, CatcherError> {
        parse_signal(&self.dump_signal)
    }

    /// Parsed aggregate signal
    pub fn aggregate_signal(&self) -> Result<Signal, CatcherError> {
        parse_signal(&self.aggregate_signal)
    }

    /// Whether fleet aggregation should be installed
    pub fn aggregation_enabled(&self) -> bool {
        self.process_filter.is_some()
    }
}
