#![deny(missing_docs)]

//! Core library for the Rusty Digest summarization service.

/// HTTP routing and REST handlers.
pub mod api;
/// Text-generation backend abstraction and adapters.
pub mod backend;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Document chunking and summarization pipeline.
pub mod processing;
/// Persistence of summarization results.
pub mod store;
