//! Defines routes for all file gateway operations.
//!
//! ## Structure
//! - **File endpoints**
//!   - `GET    /files` — pattern-filtered listing (?pattern=)
//!   - `POST   /files` — multipart upload (file, new_filename, set_unique_name)
//!   - `GET    /files/{*key}` — streaming download
//!   - `DELETE /files/{*key}` — idempotent delete
//!
//! - **Probe endpoints**
//!   - `GET /healthz` — liveness
//!   - `GET /readyz`  — store readiness
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    handlers::{
        file_handlers::{delete_file, download_file, find_files, upload_file},
        health_handlers::{healthz, readyz},
    },
    services::gateway::S3Gateway,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::get,
};

/// Build and return the router for all gateway routes.
///
/// The router carries shared state (`S3Gateway`) to all handlers. The
/// default body limit is lifted on the file routes: upload size is bounded
/// by the multipart chunking, not by buffering the request.
pub fn routes() -> Router<S3Gateway> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // file endpoints
        .route("/files", get(find_files).post(upload_file))
        .route("/files/{*key}", get(download_file).delete(delete_file))
        .layer(DefaultBodyLimit::disable())
}
