#![deny(missing_docs)]

//! Core library for the document gateway.

/// HTTP routing and handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Upload, index, and lookup workflows behind the HTTP handlers.
pub mod documents;
/// Adapter for the hosted inference Space.
pub mod inference;
/// Structured logging and tracing setup.
pub mod logging;
/// On-disk stores for documents, metadata, and the index artifact.
pub mod storage;
