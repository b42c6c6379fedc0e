//! kbvault: knowledge base tools over a JSON-lines stdio channel.

use std::sync::Arc;

use kbvault_api::driver::run_stdio;
use kbvault_api::{Config, LogFormat, ToolRouter};
use kbvault_core::defaults::{LOG_FILE_NAME, LOG_FILTER};
use kbvault_store::FilesystemStorage;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Initialize tracing. Stdout carries the protocol, so console logs go to stderr.
    //   RUST_LOG    - standard env filter (default: LOG_FILTER)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = config.log_file {
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(LOG_FILE_NAME);
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        match config.log_format {
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init(),
            LogFormat::Text => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(config.log_ansi.unwrap_or(false)),
                )
                .init(),
        }
        Some(guard)
    } else {
        match config.log_format {
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init(),
            LogFormat::Text => {
                let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
                if let Some(ansi) = config.log_ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
        }
        None
    };

    info!(
        log_format = config.log_format.as_str(),
        log_file = config
            .log_file
            .as_deref()
            .and_then(|p| p.to_str())
            .unwrap_or("(stderr)"),
        "Logging initialized"
    );

    let storage = FilesystemStorage::new(&config.vault_path);
    storage.validate().await?;
    info!(
        vault_path = %config.vault_path.display(),
        kb_root_dir = %config.kb_root_dir,
        "Vault opened"
    );

    let router = ToolRouter::new(Arc::new(storage), &config.kb_root_dir);
    run_stdio(&router).await?;

    info!("Input closed, shutting down");
    Ok(())
}
