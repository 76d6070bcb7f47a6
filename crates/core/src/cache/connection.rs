//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

/// Cache store handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Cloning shares the same connection.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a store at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).await.map_err(|e| Error::Database(e.into()))?;
        tracing::debug!(path = %path.display(), "opened cache store");
        Self::prepare(conn).await
    }

    /// Open an in-memory store for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;
                 PRAGMA foreign_keys=ON;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}
