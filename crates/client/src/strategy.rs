//! The three request-handling strategies.
//!
//! | Strategy | Store hit | Store miss | Network failure |
//! |----------|-----------|------------|-----------------|
//! | cache-first | return, no fetch | fetch and store | offline shell for the entry point, else fail |
//! | network-first | only after fetch fails | - | stored copy, then cached shell for HTML, else fail |
//! | stale-while-revalidate | return, refresh in background | await the refresh | logged; fails only on a miss |
//!
//! Only 2xx responses are written back. Writes after a successful fetch are
//! best effort: a failed write is logged and the response is still returned.

use std::sync::Arc;

use offcache_core::{CacheStore, Error, Namespace, RequestDescriptor, ResponseSnapshot};
use tokio::task::JoinHandle;

use crate::classify::StrategyTag;
use crate::fetch::Origin;
use crate::manifest::{AppShell, NamespacePair};

/// Strategy engine over a store and an origin.
pub struct StrategyEngine {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn Origin>,
    namespaces: NamespacePair,
    shell: AppShell,
}

impl StrategyEngine {
    pub fn new(
        store: Arc<dyn CacheStore>, origin: Arc<dyn Origin>, namespaces: NamespacePair, shell: AppShell,
    ) -> Self {
        Self { store, origin, namespaces, shell }
    }

    /// Serve a classified request from the namespace its strategy owns.
    pub async fn respond(&self, tag: StrategyTag, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        match tag {
            StrategyTag::CacheFirst => self.cache_first(request, &self.namespaces.static_name).await,
            StrategyTag::StaleWhileRevalidate => {
                self.stale_while_revalidate(request, &self.namespaces.dynamic_name)
                    .await
            }
            StrategyTag::NetworkFirst => self.network_first(request, &self.namespaces.dynamic_name).await,
        }
    }

    /// Serve from the store; fetch and store only on a miss.
    pub async fn cache_first(&self, request: &RequestDescriptor, namespace: &str) -> Result<ResponseSnapshot, Error> {
        match self.lookup_then_fetch(request, namespace).await {
            Ok(response) => Ok(response),
            Err(err) if self.shell.is_entry_point(&request.url) => {
                tracing::warn!(url = %request.url, error = %err, "entry point unavailable, serving offline shell");
                Ok(self.shell.offline_response())
            }
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "cache-first failed");
                Err(err)
            }
        }
    }

    async fn lookup_then_fetch(&self, request: &RequestDescriptor, namespace: &str) -> Result<ResponseSnapshot, Error> {
        let ns = self.store.open(namespace).await?;

        if let Some(hit) = self.store.match_request(&ns, request).await? {
            tracing::debug!(url = %request.url, namespace, "cache hit");
            return Ok(hit);
        }

        tracing::debug!(url = %request.url, namespace, "cache miss, fetching");
        let response = self.origin.fetch(request).await?;
        if response.is_success() {
            remember(self.store.as_ref(), &ns, request, &response).await;
        }
        Ok(response)
    }

    /// Prefer the network; fall back to the store, then to the cached shell.
    pub async fn network_first(
        &self, request: &RequestDescriptor, namespace: &str,
    ) -> Result<ResponseSnapshot, Error> {
        let network_err = match self.origin.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    match self.store.open(namespace).await {
                        Ok(ns) => remember(self.store.as_ref(), &ns, request, &response).await,
                        Err(e) => tracing::warn!(namespace, error = %e, "could not open namespace for write"),
                    }
                }
                return Ok(response);
            }
            Err(err) => err,
        };

        tracing::debug!(url = %request.url, error = %network_err, "network failed, trying cache");
        let ns = self.store.open(namespace).await?;
        if let Some(hit) = self.store.match_request(&ns, request).await? {
            return Ok(hit);
        }

        if request.accepts_html() {
            let static_ns = self.store.open(&self.namespaces.static_name).await?;
            let shell_request = RequestDescriptor::get(self.shell.entry_point.clone());
            if let Some(shell) = self.store.match_request(&static_ns, &shell_request).await? {
                tracing::debug!(url = %request.url, "serving cached shell for HTML request");
                return Ok(shell);
            }
        }

        Err(network_err)
    }

    /// Serve a stored copy immediately while refreshing it in the background.
    ///
    /// The refresh is detached when a stored copy exists: it has no timeout and
    /// cannot be cancelled, and its failure is only logged.
    pub async fn stale_while_revalidate(
        &self, request: &RequestDescriptor, namespace: &str,
    ) -> Result<ResponseSnapshot, Error> {
        let ns = self.store.open(namespace).await?;
        let cached = self.store.match_request(&ns, request).await?;

        let refresh = self.revalidate(ns, request.clone());

        if let Some(hit) = cached {
            tracing::debug!(url = %request.url, "serving from cache (stale)");
            return Ok(hit);
        }

        tracing::debug!(url = %request.url, "no cached copy, waiting for network");
        refresh
            .await
            .map_err(|e| Error::Network(format!("revalidation of {} aborted: {e}", request.url)))?
    }

    fn revalidate(&self, namespace: Namespace, request: RequestDescriptor) -> JoinHandle<Result<ResponseSnapshot, Error>> {
        let store = Arc::clone(&self.store);
        let origin = Arc::clone(&self.origin);
        tokio::spawn(async move {
            match origin.fetch(&request).await {
                Ok(response) => {
                    if response.is_success() {
                        remember(store.as_ref(), &namespace, &request, &response).await;
                    }
                    Ok(response)
                }
                Err(err) => {
                    tracing::warn!(url = %request.url, error = %err, "background fetch failed");
                    Err(err)
                }
            }
        })
    }
}

async fn remember(store: &dyn CacheStore, namespace: &Namespace, request: &RequestDescriptor, response: &ResponseSnapshot) {
    if let Err(e) = store.put(namespace, request, response).await {
        tracing::warn!(url = %request.url, namespace = %namespace.name, error = %e, "failed to store response");
    }
}
