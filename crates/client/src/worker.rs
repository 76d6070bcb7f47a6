//! The intercepting worker: one value wiring classifier, strategies,
//! lifecycle and control channel over a shared store and origin.

use std::sync::Arc;

use offcache_core::{AppConfig, CacheStore, Error, RequestDescriptor, ResponseSnapshot};
use serde_json::Value;

use crate::classify::{Classifier, StrategyTag};
use crate::clients::ClientNotifier;
use crate::control::{ControlChannel, ControlMessage, ControlReply};
use crate::fetch::Origin;
use crate::lifecycle::{ActivationReport, InstallReport, LifecycleManager, LifecycleState};
use crate::manifest::{AppShell, AssetManifest, NamespacePair};
use crate::strategy::StrategyEngine;

/// A response produced by one of the strategies.
#[derive(Debug, Clone)]
pub struct Intercepted {
    pub strategy: StrategyTag,
    pub response: ResponseSnapshot,
}

/// Outcome of [`Worker::bring_up`].
#[derive(Debug)]
pub struct BringUpReport {
    pub install: InstallReport,
    /// Present when install succeeded and activation followed immediately.
    pub activation: Option<ActivationReport>,
}

pub struct Worker {
    classifier: Classifier,
    engine: StrategyEngine,
    lifecycle: Arc<LifecycleManager>,
    control: ControlChannel,
    skip_waiting: bool,
}

impl Worker {
    /// Resolve the manifest and shell from config and wire every component.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the scope or a manifest entry does not
    /// resolve to an http(s) URL.
    pub fn new(
        config: &AppConfig, store: Arc<dyn CacheStore>, origin: Arc<dyn Origin>, clients: Arc<dyn ClientNotifier>,
    ) -> Result<Self, Error> {
        let manifest = AssetManifest::from_config(config)?;
        let shell = AppShell::from_config(config)?;
        let namespaces = NamespacePair::from_config(config);

        let classifier = Classifier::new(&manifest, &config.icon_marker);
        let engine = StrategyEngine::new(store.clone(), origin.clone(), namespaces.clone(), shell);
        let lifecycle = Arc::new(LifecycleManager::new(store.clone(), origin, clients, manifest, namespaces));
        let control = ControlChannel::new(store, lifecycle.clone());

        Ok(Self { classifier, engine, lifecycle, control, skip_waiting: config.skip_waiting })
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn namespaces(&self) -> &NamespacePair {
        self.lifecycle.namespaces()
    }

    /// Install, then activate straight away when configured to skip waiting
    /// or when a `SKIP_WAITING` message arrived while installing.
    pub async fn bring_up(&self) -> Result<BringUpReport, Error> {
        let install = self.lifecycle.install().await?;
        let requested = self.lifecycle.take_skip_request();
        let activation = if install.is_success() && (self.skip_waiting || requested) {
            self.lifecycle.skip_waiting().await?
        } else {
            None
        };
        Ok(BringUpReport { install, activation })
    }

    /// Serve a request through the strategy its classification selects.
    ///
    /// `Ok(None)` means the request is declined and should go to the network
    /// untouched: anything other than GET, or a URL outside http(s).
    pub async fn intercept(&self, request: &RequestDescriptor) -> Result<Option<Intercepted>, Error> {
        if request.method != "GET" {
            tracing::debug!(method = %request.method, url = %request.url, "declining non-GET request");
            return Ok(None);
        }

        let Some(strategy) = self.classifier.classify(request) else {
            tracing::debug!(url = %request.url, "declining unclassified request");
            return Ok(None);
        };

        let response = self.engine.respond(strategy, request).await?;
        Ok(Some(Intercepted { strategy, response }))
    }

    pub async fn handle_control_message(&self, message: &ControlMessage) -> Result<Option<ControlReply>, Error> {
        self.control.handle(message).await
    }

    pub async fn handle_control_value(&self, value: Value) -> Result<Option<ControlReply>, Error> {
        self.control.handle_value(value).await
    }
}
