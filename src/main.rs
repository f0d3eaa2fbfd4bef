#![deny(warnings)]

use hello_devops::handler::{AppState, build_router};
use hello_devops::metrics::Metrics;

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Fixed bind address; changing it means rebuilding.
const PORT: u16 = 5000;

#[tokio::main]
pub async fn main() -> Result<(), DynError> {
    // hello_devops::init_log::env_logger::init();
    hello_devops::init_log::tracing::init(env!("CARGO_CRATE_NAME"))?;
    let metrics = Metrics::new();
    let (server, shutdown_tx) = hello_devops::new_server(PORT, build_router(AppState { metrics }));
    tokio::spawn(async move {
        if let Err(e) = hello_devops::wait_signal().await {
            log::warn!("wait signal error: {e}");
        }
        let _ = shutdown_tx.send(()).await;
    });
    server.run().await?;
    Ok(())
}
