//! Standalone relay: reads its settings from the environment and runs until
//! Ctrl-C.
//!
//! ```text
//! PORT=3001 ROOMCAST_PING_INTERVAL_SECS=30 RUST_LOG=info cargo run -p relay-server
//! ```

use roomcast::prelude::*;

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    roomcast::init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr(),
        liveness = ?config.liveness.interval,
        "starting relay"
    );

    let server = RelayServerBuilder::from_config(config).build().await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
