//! Core data models for crash reports.
//!
//! A report is identified by an opaque random token; its metadata, dump
//! payload, and eventual stack trace are separate files joined only by that
//! token on disk.

pub mod report;
