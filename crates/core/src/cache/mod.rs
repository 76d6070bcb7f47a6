//! SQLite-backed cache store of versioned namespaces.
//!
//! This module provides a persistent store using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Named namespaces, created on open and deleted wholesale
//! - Entries keyed by SHA-256 request fingerprint, last write wins
//! - Atomic batch writes for all-or-nothing population
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespaces;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::ResponseSnapshot;
pub use namespaces::Namespace;
pub use store::CacheStore;
