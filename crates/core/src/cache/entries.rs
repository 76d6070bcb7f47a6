//! Entry CRUD within a namespace.
//!
//! An entry maps a request fingerprint to a response snapshot. Writes are
//! last-write-wins per fingerprint; only 2xx snapshots are accepted.

use super::connection::CacheDb;
use super::namespaces::Namespace;
use crate::{Error, RequestDescriptor};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored (or storable) response: status, headers and the full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Set when the snapshot was read back from the store.
    pub stored_at: Option<DateTime<Utc>>,
}

impl ResponseSnapshot {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into(), stored_at: None }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

struct EntryRow {
    fingerprint: String,
    method: String,
    url: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn encode(request: &RequestDescriptor, response: &ResponseSnapshot, now: &str) -> Result<Self, Error> {
        if !response.is_success() {
            return Err(Error::InvalidInput(format!(
                "refusing to store status {} for {}",
                response.status, request.url
            )));
        }
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::InvalidInput(format!("headers: {e}")))?;
        Ok(Self {
            fingerprint: request.fingerprint(),
            method: request.method.clone(),
            url: request.url.to_string(),
            status: response.status,
            headers_json,
            body: response.body.to_vec(),
            stored_at: now.to_string(),
        })
    }

    fn upsert(&self, conn: &rusqlite::Connection, namespace_id: i64) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT INTO entries (
                namespace_id, fingerprint, method, url, status_code, headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(namespace_id, fingerprint) DO UPDATE SET
                method = excluded.method,
                url = excluded.url,
                status_code = excluded.status_code,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                namespace_id,
                &self.fingerprint,
                &self.method,
                &self.url,
                self.status,
                &self.headers_json,
                &self.body,
                &self.stored_at,
            ],
        )?;
        Ok(())
    }
}

fn decode(status: u16, headers_json: &str, body: Vec<u8>, stored_at: &str) -> Result<ResponseSnapshot, Error> {
    let headers: Vec<(String, String)> =
        serde_json::from_str(headers_json).map_err(|e| Error::Corrupt(format!("headers: {e}")))?;
    let stored_at = DateTime::parse_from_rfc3339(stored_at)
        .map_err(|e| Error::Corrupt(format!("stored_at: {e}")))?
        .with_timezone(&Utc);
    Ok(ResponseSnapshot { status, headers, body: Bytes::from(body), stored_at: Some(stored_at) })
}

impl CacheDb {
    /// Look up the snapshot stored for a request.
    ///
    /// Returns None if the namespace has no entry for the request's fingerprint.
    pub async fn match_entry(
        &self, namespace: &Namespace, request: &RequestDescriptor,
    ) -> Result<Option<ResponseSnapshot>, Error> {
        let namespace_id = namespace.id;
        let fingerprint = request.fingerprint();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status_code, headers_json, body, stored_at
                     FROM entries WHERE namespace_id = ?1 AND fingerprint = ?2",
                )?;

                let result = stmt.query_row(params![namespace_id, fingerprint], |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                });

                match result {
                    Ok((status, headers_json, body, stored_at)) => {
                        decode(status, &headers_json, body, &stored_at).map(Some)
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite the entry for a request.
    pub async fn put_entry(
        &self, namespace: &Namespace, request: &RequestDescriptor, response: &ResponseSnapshot,
    ) -> Result<(), Error> {
        let row = EntryRow::encode(request, response, &Utc::now().to_rfc3339())?;
        let namespace = namespace.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_namespace(&tx, &namespace)?;
                row.upsert(&tx, namespace.id)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store every pair in one transaction: either all land or none do.
    ///
    /// Returns the number of entries written.
    pub async fn put_entries(
        &self, namespace: &Namespace, entries: &[(RequestDescriptor, ResponseSnapshot)],
    ) -> Result<usize, Error> {
        let now = Utc::now().to_rfc3339();
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::encode(request, response, &now))
            .collect::<Result<Vec<_>, _>>()?;
        let namespace = namespace.clone();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                ensure_namespace(&tx, &namespace)?;
                for row in &rows {
                    row.upsert(&tx, namespace.id)?;
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Requests that have an entry in the namespace, in insertion order.
    pub async fn entry_keys(&self, namespace: &Namespace) -> Result<Vec<RequestDescriptor>, Error> {
        let namespace_id = namespace.id;
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, String)>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE namespace_id = ?1 ORDER BY rowid")?;
                let rows = stmt
                    .query_map(params![namespace_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(method, url)| RequestDescriptor::parse(&method, &url).map_err(|e| Error::Corrupt(e.to_string())))
            .collect()
    }

    /// Sum of body lengths across the namespace's entries.
    pub async fn body_size(&self, namespace: &Namespace) -> Result<u64, Error> {
        let namespace_id = namespace.id;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let size: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(LENGTH(body)), 0) FROM entries WHERE namespace_id = ?1",
                    params![namespace_id],
                    |row| row.get(0),
                )?;
                Ok(size as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Sum of body lengths across every namespace. Reads only, never opens one.
    pub async fn total_body_size(&self) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let size: i64 =
                    conn.query_row("SELECT COALESCE(SUM(LENGTH(body)), 0) FROM entries", [], |row| row.get(0))?;
                Ok(size as u64)
            })
            .await
            .map_err(Error::from)
    }
}

fn ensure_namespace(conn: &rusqlite::Connection, namespace: &Namespace) -> Result<(), Error> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM namespaces WHERE id = ?1)",
        params![namespace.id],
        |row| row.get(0),
    )?;
    if exists { Ok(()) } else { Err(Error::NamespaceMissing(namespace.name.clone())) }
}
