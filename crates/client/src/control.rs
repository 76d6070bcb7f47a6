//! Side-door management protocol.
//!
//! Callers send `{type, payload}`; recognized types are `SKIP_WAITING`,
//! `GET_CACHE_SIZE` and `CLEAR_CACHE`. Anything else, including a message
//! whose shape cannot be read, is logged and answered with nothing.

use std::sync::Arc;

use futures::future::join_all;
use offcache_core::{CacheStore, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lifecycle::LifecycleManager;

/// An inbound control message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, alias = "data")]
    pub payload: Value,
}

impl ControlMessage {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), payload: Value::Null }
    }

    /// Read a message from arbitrary JSON. A value without a string `type`
    /// becomes a message of empty type, which no handler recognizes.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "malformed control message");
            Self::new("")
        })
    }
}

/// A reply to a recognized request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    CacheSize { size: u64 },
    CacheCleared,
}

pub struct ControlChannel {
    store: Arc<dyn CacheStore>,
    lifecycle: Arc<LifecycleManager>,
}

impl ControlChannel {
    pub fn new(store: Arc<dyn CacheStore>, lifecycle: Arc<LifecycleManager>) -> Self {
        Self { store, lifecycle }
    }

    /// Dispatch a message. `Ok(None)` means no reply is owed.
    pub async fn handle(&self, message: &ControlMessage) -> Result<Option<ControlReply>, Error> {
        match message.kind.as_str() {
            "SKIP_WAITING" => {
                self.lifecycle.skip_waiting().await?;
                Ok(None)
            }
            "GET_CACHE_SIZE" => {
                let size = self.cache_size().await?;
                Ok(Some(ControlReply::CacheSize { size }))
            }
            "CLEAR_CACHE" => {
                self.clear_all().await?;
                Ok(Some(ControlReply::CacheCleared))
            }
            other => {
                tracing::warn!(message_type = other, "ignoring unknown control message");
                Ok(None)
            }
        }
    }

    pub async fn handle_value(&self, value: Value) -> Result<Option<ControlReply>, Error> {
        self.handle(&ControlMessage::from_value(value)).await
    }

    /// Body bytes across every namespace. Never creates one.
    pub async fn cache_size(&self) -> Result<u64, Error> {
        self.store.total_body_size().await
    }

    /// Delete every enumerable namespace, current ones included.
    ///
    /// Every deletion is attempted even when some fail; the first failure is
    /// returned after all of them have settled.
    pub async fn clear_all(&self) -> Result<usize, Error> {
        let names = self.store.list_namespaces().await?;
        let results = join_all(names.iter().map(|name| async move {
            let result = self.store.delete_namespace(name).await;
            if let Err(e) = &result {
                tracing::warn!(namespace = %name, error = %e, "failed to delete namespace");
            }
            result
        }))
        .await;

        let mut count = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(existed) => count += usize::from(existed),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        tracing::info!(deleted = count, "cleared all namespaces");
        Ok(count)
    }
}
