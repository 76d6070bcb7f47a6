//! Namespace lifecycle: open-or-create, enumerate, delete wholesale.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

/// Handle to an opened namespace.
///
/// Holding a handle does not keep the namespace alive; a concurrent delete
/// makes later writes through the handle fail with `NamespaceMissing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub(crate) id: i64,
    pub name: String,
}

impl CacheDb {
    /// Open a namespace by name, creating it if absent.
    pub async fn open_namespace(&self, name: &str) -> Result<Namespace, Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<Namespace, Error> {
                conn.execute(
                    "INSERT INTO namespaces (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![&name, now],
                )?;
                let id: i64 = conn.query_row("SELECT id FROM namespaces WHERE name = ?1", params![&name], |row| {
                    row.get(0)
                })?;
                Ok(Namespace { id, name })
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every namespace, oldest first.
    pub async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and every entry in it.
    ///
    /// Returns whether the namespace existed.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
