//! SQLite store with FTS5 (trigram) indexes over documents and schema elements
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub mod documents;
pub mod elements;
pub mod models;
pub mod search;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    keywords_json TEXT NOT NULL DEFAULT '[]',
    category TEXT NOT NULL,
    subcategory TEXT,
    content_type TEXT NOT NULL,
    headers_json TEXT NOT NULL DEFAULT '[]',
    searchable_text TEXT NOT NULL,
    content_md TEXT NOT NULL,
    last_modified DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category);
CREATE INDEX IF NOT EXISTS idx_documents_subcategory ON documents(subcategory);
CREATE INDEX IF NOT EXISTS idx_documents_content_type ON documents(content_type);

CREATE TABLE IF NOT EXISTS code_blocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL,
    language TEXT NOT NULL,
    code TEXT NOT NULL,
    context TEXT,
    line_number INTEGER NOT NULL,
    FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_code_blocks_document ON code_blocks(document_id);
CREATE INDEX IF NOT EXISTS idx_code_blocks_language ON code_blocks(language);

CREATE TABLE IF NOT EXISTS graphql_elements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL,
    element_type TEXT NOT NULL,
    name TEXT NOT NULL,
    fields_json TEXT NOT NULL DEFAULT '[]',
    parameters_json TEXT NOT NULL DEFAULT '[]',
    return_type TEXT,
    description TEXT,
    searchable_text TEXT NOT NULL,
    FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_elements_document ON graphql_elements(document_id);
CREATE INDEX IF NOT EXISTS idx_elements_type ON graphql_elements(element_type);
CREATE INDEX IF NOT EXISTS idx_elements_name ON graphql_elements(name COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    fingerprint TEXT NOT NULL,
    total_documents INTEGER NOT NULL,
    ingested_at DATETIME NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
    searchable_text,
    content='documents',
    content_rowid='id',
    tokenize='trigram'
);

CREATE VIRTUAL TABLE IF NOT EXISTS graphql_elements_fts USING fts5(
    searchable_text,
    content='graphql_elements',
    content_rowid='id',
    tokenize='trigram'
);
"#;

/// Errors raised by the store. Any of them means the current operation failed;
/// the recovery for a damaged store is a forced re-ingest.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Owns the single SQLite connection. Ingestion is the only writer.
pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    /// Open a database connection at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing database: {}", path.display());

        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        info!("journal_mode: {}", mode);
        Self::init(conn)
    }

    /// Open an in-memory database connection (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        let sqlite_version: String =
            conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
        info!("SQLite version: {}", sqlite_version);

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Close the connection, surfacing any error SQLite reports on shutdown.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| DbError::Sqlite(e))
    }

    /// Row count of one of the store's tables.
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        if !matches!(
            table,
            "documents" | "code_blocks" | "graphql_elements" | "metadata"
        ) {
            return Err(DbError::InvalidQuery(format!("unknown table: {table}")));
        }
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(n as usize)
    }
}

/// Decode a JSON string-array column.
pub(crate) fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
