//! Store bring-up and supersession.
//!
//! ```text
//! Uninitialized --install--> Installing --ok--> InstalledWaiting --activate--> Activating --> Active
//!       ^                        |
//!       +--------- failed -------+
//! ```
//!
//! Install populates the static namespace with the whole static list and the
//! dynamic namespace with the bounded CDN prefix, both in parallel. Each
//! population is all-or-nothing. Activation deletes every namespace outside
//! the current version pair (and reserved names), each deletion independent,
//! then claims and notifies connected clients.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::{join_all, try_join_all};
use offcache_core::{CacheStore, Error, RequestDescriptor};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;

use crate::clients::{ClientMessage, ClientNotifier};
use crate::fetch::Origin;
use crate::manifest::{AssetManifest, NamespacePair};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Installing,
    InstalledWaiting,
    Activating,
    Active,
}

/// Outcome of both population steps. Each side succeeds or fails on its own.
#[derive(Debug)]
pub struct InstallReport {
    /// Entries written to the static namespace.
    pub static_assets: Result<usize, Error>,
    /// Entries written to the dynamic namespace.
    pub cdn_assets: Result<usize, Error>,
}

impl InstallReport {
    pub fn is_success(&self) -> bool {
        self.static_assets.is_ok() && self.cdn_assets.is_ok()
    }
}

/// Outcome of deleting one stale namespace.
#[derive(Debug)]
pub struct NamespaceDeletion {
    pub name: String,
    pub result: Result<bool, Error>,
}

/// Aggregate activation outcome. Failures here never block the transition.
#[derive(Debug)]
pub struct ActivationReport {
    /// Set when the namespaces could not be enumerated, so nothing was deleted.
    pub enumeration_error: Option<Error>,
    pub deletions: Vec<NamespaceDeletion>,
    pub clients_claimed: usize,
    pub clients_notified: usize,
}

impl ActivationReport {
    pub fn failures(&self) -> impl Iterator<Item = &NamespaceDeletion> {
        self.deletions.iter().filter(|d| d.result.is_err())
    }

    pub fn is_clean(&self) -> bool {
        self.enumeration_error.is_none() && self.failures().next().is_none()
    }
}

pub struct LifecycleManager {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn Origin>,
    clients: Arc<dyn ClientNotifier>,
    manifest: AssetManifest,
    namespaces: NamespacePair,
    state: watch::Sender<LifecycleState>,
    /// Set by a skip-waiting request that arrived mid-install.
    skip_requested: AtomicBool,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn CacheStore>, origin: Arc<dyn Origin>, clients: Arc<dyn ClientNotifier>, manifest: AssetManifest,
        namespaces: NamespacePair,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Uninitialized);
        Self { store, origin, clients, manifest, namespaces, state, skip_requested: AtomicBool::new(false) }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn namespaces(&self) -> &NamespacePair {
        &self.namespaces
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), Error> {
        let moved = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::debug!(?from, ?to, "lifecycle transition");
            Ok(())
        } else {
            Err(Error::Lifecycle(format!("cannot move to {to:?} from {:?}", self.state())))
        }
    }

    /// Populate both namespaces.
    ///
    /// Only fails outright when called outside `Uninitialized`. A failed
    /// population is reported in the returned [`InstallReport`] and leaves the
    /// manager back in `Uninitialized` so a later install can retry.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(LifecycleState::Uninitialized, LifecycleState::Installing)?;
        tracing::info!(
            static_namespace = %self.namespaces.static_name,
            dynamic_namespace = %self.namespaces.dynamic_name,
            "installing"
        );

        let (static_assets, cdn_assets) = tokio::join!(
            self.populate(&self.namespaces.static_name, &self.manifest.static_assets),
            self.populate(&self.namespaces.dynamic_name, self.manifest.precached_cdn_assets()),
        );
        let report = InstallReport { static_assets, cdn_assets };

        if report.is_success() {
            self.state.send_replace(LifecycleState::InstalledWaiting);
            tracing::info!("initial cache population complete");
        } else {
            self.state.send_replace(LifecycleState::Uninitialized);
            self.skip_requested.store(false, Ordering::Release);
            tracing::error!(
                static_error = ?report.static_assets.as_ref().err(),
                cdn_error = ?report.cdn_assets.as_ref().err(),
                "install failed"
            );
        }

        Ok(report)
    }

    async fn populate(&self, namespace: &str, urls: &[Url]) -> Result<usize, Error> {
        let ns = self.store.open(namespace).await?;
        let requests: Vec<RequestDescriptor> = urls.iter().cloned().map(RequestDescriptor::get).collect();

        let responses = try_join_all(requests.iter().map(|request| self.origin.fetch(request))).await?;
        if let Some((request, response)) = requests.iter().zip(&responses).find(|(_, r)| !r.is_success()) {
            return Err(Error::Network(format!("{} answered {}", request.url, response.status)));
        }

        let entries: Vec<_> = requests.into_iter().zip(responses).collect();
        let written = self.store.put_all(&ns, &entries).await?;
        tracing::debug!(namespace, written, "namespace populated");
        Ok(written)
    }

    /// Retire stale namespaces, claim clients and announce activation.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition(LifecycleState::InstalledWaiting, LifecycleState::Activating)?;
        tracing::info!("activating");

        let (enumeration_error, deletions) = match self.store.list_namespaces().await {
            Ok(names) => {
                let stale = names.into_iter().filter(|name| !self.namespaces.is_retained(name));
                let deletions = join_all(stale.map(|name| async move {
                    tracing::info!(namespace = %name, "deleting stale namespace");
                    let result = self.store.delete_namespace(&name).await;
                    if let Err(e) = &result {
                        tracing::warn!(namespace = %name, error = %e, "failed to delete stale namespace");
                    }
                    NamespaceDeletion { name, result }
                }))
                .await;
                (None, deletions)
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not enumerate namespaces, skipping cleanup");
                (Some(e), Vec::new())
            }
        };

        let clients_claimed = self.clients.claim();
        self.state.send_replace(LifecycleState::Active);
        let clients_notified = self.clients.notify_all(&ClientMessage::SwActivated);

        let report = ActivationReport { enumeration_error, deletions, clients_claimed, clients_notified };
        tracing::info!(
            deleted = report.deletions.len(),
            failed = report.failures().count(),
            clients_claimed,
            "activation complete"
        );
        Ok(report)
    }

    /// Activate now if an install is waiting.
    ///
    /// During `Installing` the request is latched for whoever finishes the
    /// install (see [`Self::take_skip_request`]). In any other state it does
    /// nothing.
    pub async fn skip_waiting(&self) -> Result<Option<ActivationReport>, Error> {
        match self.state() {
            LifecycleState::InstalledWaiting => self.activate().await.map(Some),
            LifecycleState::Installing => {
                self.skip_requested.store(true, Ordering::Release);
                tracing::debug!("skip waiting latched until install completes");
                // The install may have finished between the check and the latch.
                if self.state() == LifecycleState::InstalledWaiting && self.take_skip_request() {
                    return self.activate().await.map(Some);
                }
                Ok(None)
            }
            state => {
                tracing::debug!(?state, "skip waiting ignored");
                Ok(None)
            }
        }
    }

    /// Consume a skip-waiting request latched during install.
    pub fn take_skip_request(&self) -> bool {
        self.skip_requested.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientRegistry;
    use crate::testing::{FaultyStore, MockOrigin, test_config};
    use offcache_core::{AppConfig, CacheDb};

    struct Fixture {
        db: Arc<CacheDb>,
        origin: Arc<MockOrigin>,
        clients: Arc<ClientRegistry>,
        lifecycle: LifecycleManager,
    }

    async fn fixture() -> Fixture {
        let config = test_config();
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let origin = Arc::new(MockOrigin::new());
        let clients = Arc::new(ClientRegistry::new());
        let manifest = AssetManifest::from_config(&config).unwrap();
        for url in manifest.static_assets.iter().chain(&manifest.cdn_assets) {
            origin.route(url.as_str(), 200, url.path());
        }
        let lifecycle = LifecycleManager::new(
            db.clone(),
            origin.clone(),
            clients.clone(),
            manifest,
            NamespacePair::from_config(&config),
        );
        Fixture { db, origin, clients, lifecycle }
    }

    #[tokio::test]
    async fn test_install_populates_static_and_bounded_cdn_prefix() {
        let f = fixture().await;

        let report = f.lifecycle.install().await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.static_assets.unwrap(), 6);
        assert_eq!(report.cdn_assets.unwrap(), 2);
        assert_eq!(f.lifecycle.state(), LifecycleState::InstalledWaiting);
        assert_eq!(f.origin.calls(), 8);

        let dynamic = f.db.open_namespace("app-dynamic-v1").await.unwrap();
        let keys = f.db.entry_keys(&dynamic).await.unwrap();
        assert!(keys[0].url.path().ends_with("all.min.css"));
        assert!(keys[1].url.path().ends_with("pdf.min.js"));
    }

    #[tokio::test]
    async fn test_install_cdn_failure_does_not_touch_static_outcome() {
        let f = fixture().await;
        f.origin.fail("https://cdnjs.cloudflare.com/ajax/libs/pdf.js/2.16.105/pdf.min.js");

        let report = f.lifecycle.install().await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.static_assets.as_ref().unwrap(), &6);
        assert!(report.cdn_assets.as_ref().unwrap_err().is_network());
        assert_eq!(f.lifecycle.state(), LifecycleState::Uninitialized);

        let dynamic = f.db.open_namespace("app-dynamic-v1").await.unwrap();
        assert!(f.db.entry_keys(&dynamic).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_static_bad_status_is_all_or_nothing() {
        let f = fixture().await;
        f.origin.route("https://app.example/manifest.json", 500, "oops");

        let report = f.lifecycle.install().await.unwrap();

        assert!(report.static_assets.is_err());
        assert!(report.cdn_assets.is_ok());
        let static_ns = f.db.open_namespace("app-static-v1").await.unwrap();
        assert!(f.db.entry_keys(&static_ns).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_can_be_retried_after_failure() {
        let f = fixture().await;
        f.origin.set_offline(true);
        assert!(!f.lifecycle.install().await.unwrap().is_success());

        f.origin.set_offline(false);
        assert!(f.lifecycle.install().await.unwrap().is_success());
        assert_eq!(f.lifecycle.state(), LifecycleState::InstalledWaiting);
    }

    #[tokio::test]
    async fn test_install_twice_is_rejected() {
        let f = fixture().await;
        f.lifecycle.install().await.unwrap();
        assert!(matches!(f.lifecycle.install().await, Err(Error::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_activate_leaves_exactly_the_current_pair() {
        let f = fixture().await;
        f.db.open_namespace("app-static-v0").await.unwrap();
        f.db.open_namespace("app-dynamic-v0").await.unwrap();
        f.db.open_namespace("someone-else").await.unwrap();
        f.lifecycle.install().await.unwrap();

        let report = f.lifecycle.activate().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.deletions.len(), 3);
        let mut names = f.db.list_namespaces().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["app-dynamic-v1", "app-static-v1"]);
        assert_eq!(f.lifecycle.state(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_activate_keeps_reserved_namespaces() {
        let config = AppConfig { reserved_namespaces: vec!["app-v1".into()], ..test_config() };
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        db.open_namespace("app-v1").await.unwrap();
        db.open_namespace("app-v0").await.unwrap();
        let lifecycle = LifecycleManager::new(
            db.clone(),
            Arc::new(MockOrigin::new()),
            Arc::new(ClientRegistry::new()),
            AssetManifest { static_assets: Vec::new(), cdn_assets: Vec::new(), precache_count: 0 },
            NamespacePair::from_config(&config),
        );
        lifecycle.install().await.unwrap();
        lifecycle.activate().await.unwrap();

        let names = db.list_namespaces().await.unwrap();
        assert!(names.contains(&"app-v1".to_string()));
        assert!(!names.contains(&"app-v0".to_string()));
    }

    #[tokio::test]
    async fn test_activate_claims_and_notifies_clients() {
        let f = fixture().await;
        let mut session = f.clients.connect();
        let mut watcher = f.lifecycle.subscribe();
        f.lifecycle.install().await.unwrap();

        let report = f.lifecycle.activate().await.unwrap();

        assert_eq!(report.clients_claimed, 1);
        assert_eq!(report.clients_notified, 1);
        assert!(session.is_controlled());
        assert_eq!(session.recv().await, Some(ClientMessage::SwActivated));
        assert!(watcher.has_changed().unwrap());
        assert_eq!(*watcher.borrow_and_update(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let f = fixture().await;
        assert!(matches!(f.lifecycle.activate().await, Err(Error::Lifecycle(_))));
        assert_eq!(f.lifecycle.state(), LifecycleState::Uninitialized);
    }

    #[tokio::test]
    async fn test_skip_waiting_only_acts_when_waiting() {
        let f = fixture().await;
        assert!(f.lifecycle.skip_waiting().await.unwrap().is_none());

        f.lifecycle.install().await.unwrap();
        assert!(f.lifecycle.skip_waiting().await.unwrap().is_some());
        assert_eq!(f.lifecycle.state(), LifecycleState::Active);

        assert!(f.lifecycle.skip_waiting().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activate_isolates_deletion_failures() {
        let config = test_config();
        let inner = CacheDb::open_in_memory().await.unwrap();
        inner.open_namespace("old-a").await.unwrap();
        inner.open_namespace("old-b").await.unwrap();
        inner.open_namespace("old-c").await.unwrap();
        let store = Arc::new(FaultyStore { inner: inner.clone(), broken: Some("old-b"), ghost: None });
        let lifecycle = LifecycleManager::new(
            store,
            Arc::new(MockOrigin::new()),
            Arc::new(ClientRegistry::new()),
            AssetManifest { static_assets: Vec::new(), cdn_assets: Vec::new(), precache_count: 0 },
            NamespacePair::from_config(&config),
        );
        lifecycle.install().await.unwrap();

        let report = lifecycle.activate().await.unwrap();

        assert!(!report.is_clean());
        let failed: Vec<_> = report.failures().map(|d| d.name.as_str()).collect();
        assert_eq!(failed, vec!["old-b"]);
        assert_eq!(lifecycle.state(), LifecycleState::Active);
        let names = inner.list_namespaces().await.unwrap();
        assert!(names.contains(&"old-b".to_string()));
        assert!(!names.contains(&"old-a".to_string()));
        assert!(!names.contains(&"old-c".to_string()));
    }
}
