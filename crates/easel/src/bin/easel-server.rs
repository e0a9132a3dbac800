//! Server binary: load config, bind, run until interrupted.

use std::time::Duration;

use easel::{Config, EaselServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_owned());
    let config = Config::load(&config_path)?;
    let addr = format!("0.0.0.0:{}", config.server.port);

    let server = EaselServer::builder()
        .bind(&addr)
        .config(config)
        .build()
        .await?;
    let handle = server.handle();
    tracing::info!(%addr, "easel server listening");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            handle.shutdown();
            // Give the hub a moment to disconnect clients cleanly.
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    Ok(())
}
