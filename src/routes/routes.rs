//! Defines routes for the crash report collector.
//!
//! ## Structure
//! - `GET  /status` — fixed liveness message
//! - `GET  /readyz` — readiness probe against the dump directory
//! - `*    /upload` — crash report intake; the handler enforces POST itself
//!   so that other methods get the documented 400 response
//!
//! The router carries shared state (`AppState`) to all handlers.

use crate::{
    AppState,
    handlers::{
        health_handlers::{readyz, status},
        report_handlers::upload_report,
    },
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{any, get},
};

/// Largest accepted upload body. Minidumps are usually well under this.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Build and return the router for all collector routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/readyz", get(readyz))
        .route("/upload", any(upload_report))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
