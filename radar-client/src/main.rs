//! radar-client — check-execution client.
//!
//! Connects to a radar-server, receives CHECK dispatches, runs them
//! locally, and ships CHECK REPLY messages back.

mod app;
mod config;
mod connection;
mod queue;

use tokio_util::sync::CancellationToken;
use tracing::info;

use app::ClientApp;
use config::ClientConfig;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = ClientConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "radar_client=info".into()))
        .with_target(true)
        .init();

    info!("radar-client starting");
    info!(to = %config.connect.to, port = config.connect.port, "connect target");

    let stop = CancellationToken::new();
    let ctrlc_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            ctrlc_stop.cancel();
        }
    });

    let app = ClientApp::new(config.connect, config.run_as, config.checks_dir, config.max_frame_len, stop);
    app.run().await;

    info!("radar-client stopped");
}
