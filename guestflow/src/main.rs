//! Command-line entry point: `guestflow <event-url>`.
//!
//! The Chrome page endpoint comes from `GUESTFLOW_WS` (a
//! `ws://host:port/devtools/page/<id>` URL as listed by Chrome's
//! `/json` endpoint when started with `--remote-debugging-port`). An
//! optional `GUESTFLOW_CONFIG` points at a JSON configuration file.
//!
//! Any failure is reported and the process exits normally.

use anyhow::Context;
use tracing::error;
use tracing_subscriber::EnvFilter;

use guestflow::cancellation::CancellationToken;
use guestflow::config::ScrapeConfig;
use guestflow::driver::cdp::ChromePage;
use guestflow::run::EventScrape;
use guestflow::session::ConsoleCodeSource;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        error!(error = %err, "scrape failed");
        eprintln!("guestflow: {err:#}");
    }
}

async fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let event_url = args
        .next()
        .context("usage: guestflow <event-url>")?;
    if args.next().is_some() {
        anyhow::bail!("usage: guestflow <event-url>");
    }

    let config = match std::env::var_os("GUESTFLOW_CONFIG") {
        Some(path) => ScrapeConfig::from_file(std::path::Path::new(&path))
            .with_context(|| format!("loading config from {}", path.to_string_lossy()))?,
        None => ScrapeConfig::new(),
    };

    let ws_url = std::env::var("GUESTFLOW_WS").context(
        "GUESTFLOW_WS must point at a Chrome page WebSocket \
         (start Chrome with --remote-debugging-port and pick a target from /json)",
    )?;

    let page = ChromePage::connect(&ws_url, config.network_idle())
        .await
        .context("connecting to Chrome")?;

    let cancel = CancellationToken::new();
    let scrape = EventScrape::new(&page, &config, &ConsoleCodeSource)?;
    let summary = scrape.run(&event_url, &cancel).await?;

    println!(
        "Scrape complete: {} rows written to {} ({} guests without a LinkedIn link, {} duplicates dropped)",
        summary.export.written,
        summary.output_path.display(),
        summary.export.without_link,
        summary.export.duplicates,
    );
    Ok(())
}
