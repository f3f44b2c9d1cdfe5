//! # message-board
//!
//! Loads settings, opens the configured store and serves the board API.

mod store;

use anyhow::Context;
use api_adapters::{layers, router, AppState};
use configs::{BoardSettings, LogFormat, LogSettings, Settings, StorageSettings, ThreadDeletePolicy};
use services::{ReplyRetention, ServiceOptions, Services};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.log);

    let store = store::open(&settings.storage).context("opening store")?;
    let services = Services::new(store, service_options(&settings.storage, &settings.board));

    let app = layers::apply(router(
        AppState::new(services),
        settings.server.static_dir.as_deref(),
    ));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "message board listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn service_options(storage: &StorageSettings, board: &BoardSettings) -> ServiceOptions {
    ServiceOptions {
        call_timeout: storage.call_timeout(),
        thread_limit: board.thread_limit,
        reply_preview_limit: board.reply_preview_limit,
        reply_limit: board.reply_limit,
        fan_out_concurrency: board.fan_out_concurrency,
        reply_retention: match board.thread_delete_policy {
            ThreadDeletePolicy::Orphan => ReplyRetention::Orphan,
            ThreadDeletePolicy::Cascade => ReplyRetention::Cascade,
        },
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
