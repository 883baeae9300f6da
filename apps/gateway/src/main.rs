mod env;

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use ink_dropbox::DropboxClient;
use ink_ingest::{AppState, IngestConfig, IngestService, ProcessRunner};
use ink_ledger::{CursorStore, ProcessedLedger};

use env::env;

fn app() -> Router {
    let env = env();

    let dropbox = DropboxClient::builder()
        .access_token(&env.dropbox_access_token)
        .build();

    let cursors = CursorStore::new(env.state_dir.join("cursors.json"));
    let ledger = ProcessedLedger::new(
        env.state_dir.join("processed.json"),
        Duration::from_secs(env.claim_ttl_secs),
    );
    let runner = ProcessRunner::new(&env.worker_bin);
    let config = IngestConfig::new(&env.raw_folder, &env.dropbox_app_secret);

    let service = IngestService::new(dropbox, cursors, ledger, runner, config);

    ink_ingest::router(AppState::new(service)).layer(TraceLayer::new_for_http())
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let env = env();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            let addr = SocketAddr::from(([0, 0, 0, 0], env.port));
            tracing::info!(addr = %addr, raw_folder = %env.raw_folder, "gateway_listening");

            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            axum::serve(listener, app())
                .with_graceful_shutdown(shutdown_signal())
                .await
                .unwrap();
        });

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("shutdown_signal_received");
}
