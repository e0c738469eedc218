//! Terminal console entry point.

mod app;
mod config;

use std::time::Duration;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so console output stays clean on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pteroconsole=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting pteroconsole");

    let config = config::Config::load()?;
    tracing::info!(panel = %config.panel_url, server = %config.server_id, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(app::run(config));
    // A pending stdin read cannot be cancelled; don't wait on it.
    rt.shutdown_timeout(Duration::from_millis(250));
    result?;

    tracing::info!("console closed");
    Ok(())
}
