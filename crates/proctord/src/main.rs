use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod routes;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        device = %config.camera_device,
        model_dir = %config.model_dir.display(),
        eye_threshold = config.eye_threshold,
        mouth_threshold = config.mouth_threshold,
        "proctord starting"
    );

    // Fail fast: camera, models, and the event log are all checked here.
    let engine = engine::spawn_engine(&config)?;

    let app = routes::build_router(engine).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("proctord shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
