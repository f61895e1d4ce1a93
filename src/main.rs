use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deadview::commands;
use deadview::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Setup logging
    setup_logging(cli.debug);

    // Load settings
    let settings = cli.settings()?;

    commands::run(&cli.command, settings).await
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("deadview=debug,deadview_core=debug")
    } else {
        EnvFilter::new("deadview=info,deadview_core=info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
