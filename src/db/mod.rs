use crate::error::{RagQueryError, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;

/// Vector store table: one row per retrievable document.
///
/// `embedding` is a little-endian f32 array; rows without one are never returned.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    doc_id TEXT PRIMARY KEY,
    page_content TEXT NOT NULL,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    embedding BLOB
);
";

/// Handle to the SQLite vector store
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;

        // WAL lets an external indexer write while queries read
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA temp_store = MEMORY; \
             PRAGMA cache_size = -65536;",
        )?;

        Ok(conn)
    }

    /// Execute a closure with a fresh connection on the blocking pool
    ///
    /// # Arguments
    ///
    /// * `f` - Work to run against the connection; its error is returned as is
    ///
    /// # Returns
    ///
    /// The closure's result, or a `Retrieval` error if the blocking task panicked
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Self::open(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RagQueryError::Retrieval(format!("vector store task failed: {}", e)))?
    }

    /// Create the documents table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
    }

    pub async fn count_documents(&self) -> Result<usize> {
        self.with_connection(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}
