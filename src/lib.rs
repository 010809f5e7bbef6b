//! Breakpad crash report collector.
//!
//! Accepts minidump uploads over HTTP, stores them on disk under a random
//! report identifier, and runs a single background worker that symbolicates
//! each report with an external stack-walking tool.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use services::{pipeline::PipelineHandle, report_store::ReportStore};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Writes report artifacts under the dump directory.
    pub store: ReportStore,

    /// Submits accepted report identifiers to the processing worker.
    pub pipeline: PipelineHandle,
}
