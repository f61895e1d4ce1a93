//! Reference host for `deadview serve`.
//!
//! Stands in for a web framework: each stdin line names one rendered
//! template. Useful to try dumps and aggregations across a few local
//! processes.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};

use deadview_core::catcher::{self, CatcherContext, RenderHook, RenderObserver};
use deadview_core::{templates, Settings};

/// Run until SIGINT or SIGTERM
pub async fn run(settings: Settings) -> Result<()> {
    let templates = templates::scan(&settings.root, &settings.views_dir)?;
    tracing::info!(
        "Tracking {} templates under {}",
        templates.len(),
        settings.root.join(&settings.views_dir).display()
    );

    let ctx = Arc::new(CatcherContext::new(templates));
    let watch = catcher::watch(&settings, ctx.clone())?;
    let hook = RenderHook::new(ctx.clone(), &settings.root, &settings.views_dir);

    let feeder = tokio::spawn(async move {
        match feed_renders(BufReader::new(tokio::io::stdin()), &hook).await {
            Ok(count) => tracing::debug!("stdin closed after {} render events", count),
            Err(e) => tracing::warn!("Reading render events failed: {}", e),
        }
    });

    wait_for_shutdown().await?;

    feeder.abort();
    watch.stop();
    tracing::info!(
        "Shutting down pid {} ({} renders recorded)",
        ctx.pid(),
        ctx.with_registry(|r| r.total_renders())
    );
    Ok(())
}

/// Report every non-empty line of `reader` as a render.
///
/// Returns the number of events fed.
pub async fn feed_renders<R>(reader: R, observer: &dyn RenderObserver) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await.context("Failed to read line")? {
        let template = line.trim();
        if template.is_empty() {
            continue;
        }
        observer.on_render(Path::new(template));
        count += 1;
    }
    Ok(count)
}

async fn wait_for_shutdown() -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for SIGINT")?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}
