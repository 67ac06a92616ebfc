use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use crate::services::gateway::ObjectStore;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        endpoint = %cfg.s3_endpoint,
        bucket = %cfg.bucket,
        "Starting s3-file-gateway"
    );

    // --- Connect to the object store ---
    let gateway = services::gateway::S3Gateway::connect(&cfg).await;

    // --- Ensure the default bucket exists before accepting traffic ---
    gateway
        .ensure_bucket()
        .await
        .context("ensuring default bucket")?;

    // --- Build router ---
    let mut app = routes::routes::routes().with_state(gateway);

    if let Some(origin) = &cfg.allowed_origin {
        let origin = origin
            .parse::<HeaderValue>()
            .with_context(|| format!("parsing allowed origin `{}`", origin))?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::DELETE]),
        );
    }

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
