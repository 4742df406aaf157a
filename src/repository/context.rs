//! Database context: connection factory plus repository access.

use std::path::{Path, PathBuf};

use diesel_async::SimpleAsyncConnection;
use tracing::{debug, error, info};

use super::diesel_pool::{AsyncSqlitePool, DieselError};
use super::document::DocumentRepository;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    ocr_text TEXT NOT NULL DEFAULT '',
    layout_json TEXT NOT NULL DEFAULT '[]',
    ocr_confidence REAL,
    agent_reasoning TEXT,
    confidence_score REAL,
    flag TEXT,
    intelligence TEXT,
    embedding TEXT,
    status TEXT NOT NULL DEFAULT 'ocr_complete',
    error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_content_hash ON documents(content_hash);
CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at);
CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
"#;

/// Entry point for database access. Create one per command or service.
#[derive(Clone)]
pub struct DbContext {
    pool: AsyncSqlitePool,
    db_path: PathBuf,
}

impl DbContext {
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
            db_path: db_path.to_path_buf(),
        }
    }

    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn documents(&self) -> DocumentRepository {
        DocumentRepository::new(self.pool.clone())
    }

    /// Create the documents table and its indexes if missing.
    ///
    /// Running against an existing database leaves its data untouched.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        if self.db_path.exists() {
            debug!("Connecting to existing database {}", self.db_path.display());
        } else {
            info!("Creating database {}", self.db_path.display());
        }

        let mut conn = self.pool.get().await.map_err(|e| {
            error!("Failed to open {}: {}", self.db_path.display(), e);
            e
        })?;
        conn.batch_execute(SCHEMA_SQL).await.map_err(|e| {
            error!("Failed to create schema: {}", e);
            e
        })?;
        Ok(())
    }

    /// Check that the database can be opened and queried.
    pub async fn test_connection(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute("SELECT 1;").await
    }
}
