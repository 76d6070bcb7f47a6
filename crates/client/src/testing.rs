//! In-process doubles shared by the engine tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use offcache_core::{AppConfig, CacheDb, CacheStore, Error, Namespace, RequestDescriptor, ResponseSnapshot};
use tokio::sync::Semaphore;

use crate::fetch::Origin;

pub(crate) fn test_config() -> AppConfig {
    AppConfig { scope: "https://app.example/".into(), ..Default::default() }
}

/// Origin that answers from a route table and counts every call.
///
/// Unknown URLs answer 404. Offline or failing URLs raise a network error.
pub(crate) struct MockOrigin {
    routes: Mutex<HashMap<String, (u16, String)>>,
    failing: Mutex<Vec<String>>,
    log: Mutex<Vec<String>>,
    offline: AtomicBool,
    gated: AtomicBool,
    gate: Arc<Semaphore>,
    calls: AtomicUsize,
}

impl MockOrigin {
    pub(crate) fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            gate: Arc::new(Semaphore::new(0)),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn route(&self, url: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), (status, body.to_string()));
    }

    pub(crate) fn fail(&self, url: &str) {
        self.failing.lock().unwrap().push(url.to_string());
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Block every later fetch until a permit is added to the returned gate.
    pub(crate) fn hold(&self) -> Arc<Semaphore> {
        self.gated.store(true, Ordering::SeqCst);
        self.gate.clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl Origin for MockOrigin {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        let url = request.url.to_string();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(url.clone());

        if self.gated.load(Ordering::SeqCst) {
            let permit = self.gate.acquire().await.map_err(|e| Error::Network(e.to_string()))?;
            permit.forget();
        }

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&url) {
            return Err(Error::Network(format!("unreachable: {url}")));
        }

        let route = self.routes.lock().unwrap().get(&url).cloned();
        Ok(match route {
            Some((status, body)) => ResponseSnapshot::new(status, Vec::new(), body),
            None => ResponseSnapshot::new(404, Vec::new(), "not found"),
        })
    }
}

/// Store over an in-memory `CacheDb` with scripted faults.
///
/// Deletes of `broken` fail. `ghost` is still listed after it is gone, the
/// way a listing taken just before a concurrent delete would be.
pub(crate) struct FaultyStore {
    pub(crate) inner: CacheDb,
    pub(crate) broken: Option<&'static str>,
    pub(crate) ghost: Option<&'static str>,
}

#[async_trait]
impl CacheStore for FaultyStore {
    async fn open(&self, name: &str) -> Result<Namespace, Error> {
        self.inner.open_namespace(name).await
    }

    async fn match_request(
        &self, namespace: &Namespace, request: &RequestDescriptor,
    ) -> Result<Option<ResponseSnapshot>, Error> {
        self.inner.match_entry(namespace, request).await
    }

    async fn put(
        &self, namespace: &Namespace, request: &RequestDescriptor, response: &ResponseSnapshot,
    ) -> Result<(), Error> {
        self.inner.put_entry(namespace, request, response).await
    }

    async fn put_all(
        &self, namespace: &Namespace, entries: &[(RequestDescriptor, ResponseSnapshot)],
    ) -> Result<usize, Error> {
        self.inner.put_entries(namespace, entries).await
    }

    async fn keys(&self, namespace: &Namespace) -> Result<Vec<RequestDescriptor>, Error> {
        self.inner.entry_keys(namespace).await
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        let mut names = self.inner.list_namespaces().await?;
        names.extend(self.ghost.map(String::from));
        Ok(names)
    }

    async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        if self.broken == Some(name) {
            return Err(Error::NamespaceMissing(name.to_string()));
        }
        self.inner.delete_namespace(name).await
    }

    async fn body_size(&self, namespace: &Namespace) -> Result<u64, Error> {
        self.inner.body_size(namespace).await
    }

    async fn total_body_size(&self) -> Result<u64, Error> {
        self.inner.total_body_size().await
    }
}

/// Poll `check` until it holds, giving detached tasks time to run.
pub(crate) async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
