//! Streamforge - video ingestion and DASH segmentation service
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod streaming;
pub mod tools;
pub mod upload;
