//! Core services: on-disk report storage and the symbolication pipeline.

pub mod pipeline;
pub mod report_store;
