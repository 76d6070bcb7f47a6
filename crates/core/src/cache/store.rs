//! The store capability the engine consumes.
//!
//! Every operation may fail with a store error; implementations never
//! swallow failures, callers decide how to recover.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::entries::ResponseSnapshot;
use super::namespaces::Namespace;
use crate::{Error, RequestDescriptor};

/// Named, versioned key/value stores of request fingerprint to response snapshot.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a namespace, creating it if absent.
    async fn open(&self, name: &str) -> Result<Namespace, Error>;

    /// Look up the entry for a request.
    async fn match_request(
        &self, namespace: &Namespace, request: &RequestDescriptor,
    ) -> Result<Option<ResponseSnapshot>, Error>;

    /// Store a response, overwriting any entry with the same fingerprint.
    async fn put(&self, namespace: &Namespace, request: &RequestDescriptor, response: &ResponseSnapshot)
    -> Result<(), Error>;

    /// Store a batch atomically.
    async fn put_all(
        &self, namespace: &Namespace, entries: &[(RequestDescriptor, ResponseSnapshot)],
    ) -> Result<usize, Error>;

    /// Requests with an entry in the namespace.
    async fn keys(&self, namespace: &Namespace) -> Result<Vec<RequestDescriptor>, Error>;

    /// Every enumerable namespace name.
    async fn list_namespaces(&self) -> Result<Vec<String>, Error>;

    /// Delete a namespace wholesale; true if it existed.
    async fn delete_namespace(&self, name: &str) -> Result<bool, Error>;

    /// Total body bytes stored in the namespace.
    async fn body_size(&self, namespace: &Namespace) -> Result<u64, Error>;

    /// Total body bytes across every namespace, without creating any.
    async fn total_body_size(&self) -> Result<u64, Error>;
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, name: &str) -> Result<Namespace, Error> {
        self.open_namespace(name).await
    }

    async fn match_request(
        &self, namespace: &Namespace, request: &RequestDescriptor,
    ) -> Result<Option<ResponseSnapshot>, Error> {
        self.match_entry(namespace, request).await
    }

    async fn put(
        &self, namespace: &Namespace, request: &RequestDescriptor, response: &ResponseSnapshot,
    ) -> Result<(), Error> {
        self.put_entry(namespace, request, response).await
    }

    async fn put_all(
        &self, namespace: &Namespace, entries: &[(RequestDescriptor, ResponseSnapshot)],
    ) -> Result<usize, Error> {
        self.put_entries(namespace, entries).await
    }

    async fn keys(&self, namespace: &Namespace) -> Result<Vec<RequestDescriptor>, Error> {
        self.entry_keys(namespace).await
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        CacheDb::list_namespaces(self).await
    }

    async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        CacheDb::delete_namespace(self, name).await
    }

    async fn body_size(&self, namespace: &Namespace) -> Result<u64, Error> {
        CacheDb::body_size(self, namespace).await
    }

    async fn total_body_size(&self) -> Result<u64, Error> {
        CacheDb::total_body_size(self).await
    }
}
