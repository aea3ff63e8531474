//! Dispatch Console - Main Entry Point
//!
//! Field-technician dispatch admin console

use anyhow::Context as _;
use dispatch_console::domain::config::AppConfig;
use dispatch_console::helpers::{get_or_create_data_dir, is_development};
use dispatch_console::{app, constants::APP_NAME};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

/// Log to stderr and to a daily file in the data directory
fn init_tracing() -> Option<WorkerGuard> {
    let default_level = if is_development() { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);

    match get_or_create_data_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{APP_NAME}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _guard = init_tracing();

    let command = match app::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n\n{}", app::USAGE);
            std::process::exit(2);
        }
    };

    let config = AppConfig::load().context("Failed to load configuration")?;
    tracing::debug!(api = %config.api_url, socket = %config.socket_url, "configuration loaded");

    app::run(command, config).await
}
