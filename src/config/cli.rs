use anyhow::Result;
use clap::{Parser, Subcommand};
use deadview_core::Settings;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Find templates that production traffic never renders")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root (template ids are relative to it)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Report file (default: tmp/dead_views.txt under the root)
    #[arg(long, global = true)]
    pub report_file: Option<PathBuf>,

    /// Command line filter used to find sibling processes
    #[arg(long, global = true)]
    pub filter: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a host that counts renders read from stdin (one template path per line)
    Serve,
    /// Ask one process to dump its stats and print them
    Dump {
        /// Target process
        pid: u32,
        /// How long to wait for the dump
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
    /// Ask one process to aggregate stats of all its siblings and print them
    Aggregate {
        /// Process that runs the aggregation
        pid: u32,
        /// How long to wait for the consolidated report
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Print the current report file
    Show {
        /// Print as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Settings from the config file with CLI overrides applied
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_ref())?;
        settings.merge_cli(
            self.root.as_ref(),
            self.report_file.as_ref(),
            self.filter.as_ref(),
        );
        settings.validate();
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_dump() {
        let cli = Config::try_parse_from(["deadview", "dump", "4242"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Dump {
                pid: 4242,
                timeout_secs: 5
            }
        );
        assert!(!cli.debug);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Config::try_parse_from([
            "deadview",
            "serve",
            "--filter",
            "unicorn worker",
            "--root",
            "/srv/app",
            "-d",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::Serve);
        assert!(cli.debug);
        assert_eq!(cli.filter.as_deref(), Some("unicorn worker"));
    }

    #[test]
    fn test_cli_overrides_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("deadview.toml");
        std::fs::write(&config, "process_filter = \"puma\"\nroot = \"/opt/app\"\n").unwrap();

        let cli = Config::try_parse_from([
            "deadview",
            "--config",
            config.to_str().unwrap(),
            "--filter",
            "unicorn",
            "show",
        ])
        .unwrap();
        let settings = cli.settings().unwrap();

        assert_eq!(settings.process_filter.as_deref(), Some("unicorn"));
        assert_eq!(settings.root, PathBuf::from("/opt/app"));
        assert_eq!(cli.command, Command::Show { json: false });
    }

    #[test]
    fn test_aggregate_requires_pid() {
        assert!(Config::try_parse_from(["deadview", "aggregate"]).is_err());
    }
}
