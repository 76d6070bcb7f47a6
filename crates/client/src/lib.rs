//! Client-side engine for offcache.
//!
//! This crate provides the origin fetch pipeline, request classification, the
//! three caching strategies, the store lifecycle and the control channel,
//! wired together by [`Worker`].

pub mod classify;
pub mod clients;
pub mod control;
pub mod fetch;
pub mod lifecycle;
pub mod manifest;
pub mod strategy;
pub mod worker;

#[cfg(test)]
mod testing;

pub use classify::{Classifier, StrategyTag};
pub use clients::{ClientMessage, ClientNotifier, ClientRegistry, ClientSession};
pub use control::{ControlChannel, ControlMessage, ControlReply};
pub use fetch::{FetchClient, FetchConfig, Origin};
pub use lifecycle::{ActivationReport, InstallReport, LifecycleManager, LifecycleState, NamespaceDeletion};
pub use manifest::{AppShell, AssetManifest, NamespacePair};
pub use strategy::StrategyEngine;
pub use worker::{BringUpReport, Intercepted, Worker};
