//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - The cache store abstraction with a SQLite backend
//! - Request descriptors and fingerprints
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{CacheDb, CacheStore, Namespace, ResponseSnapshot};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use request::RequestDescriptor;
