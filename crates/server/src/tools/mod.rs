//! MCP tool implementations.
//!
//! This module contains all tools exposed by the offcache server.

pub mod control;
pub mod fetch;
pub mod status;

pub use control::{ControlParams, control_impl};
pub use fetch::{FetchParams, fetch_impl};
pub use status::status_impl;
