//! Vector store backed by SQLite and sqlite-vec.
//!
//! Entries live in named collections inside one database file. Each entry
//! carries its chunk text, a JSON metadata record and an embedding in the
//! `vec_entries` virtual table, joined on rowid.
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Once};

use rusqlite::{Connection, OptionalExtension, params};
use sqlite_vec::sqlite3_vec_init;
use thiserror::Error;
use tracing::info;

pub mod collection;
pub mod models;
pub mod search;

pub use collection::Collection;
pub use models::{ChunkMetadata, NewEntry, QueryResult};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    entry_id TEXT NOT NULL,
    document TEXT NOT NULL,
    metadata TEXT NOT NULL,
    added_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(collection, entry_id)
);

CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection);
"#;

/// Errors raised by the vector store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot create index directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("embedding dimension mismatch: store expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{entries} entries but {embeddings} embeddings")]
    LengthMismatch { entries: usize, embeddings: usize },

    #[error("invalid metadata for entry {id}: {reason}")]
    InvalidMetadata { id: String, reason: String },

    #[error("malformed query result: {0}")]
    MalformedResult(String),

    #[error("connection lock poisoned")]
    Poisoned,
}

/// Collection-level operations the indexing pipeline needs from a store.
///
/// Implementations make no atomicity promise across calls: a reader may
/// observe the collection between `delete_all` and `add_all`.
pub trait VectorStore: Send + Sync {
    /// Adds entries with their embeddings; an existing id is replaced.
    fn add_all(&self, entries: &[NewEntry<'_>], embeddings: &[Vec<f32>]) -> Result<(), StoreError>;

    /// Removes every entry, returning how many were removed.
    fn delete_all(&self) -> Result<usize, StoreError>;

    /// Nearest entries for each query vector, closest first.
    fn query(&self, query_vectors: &[Vec<f32>], top_k: usize) -> Result<QueryResult, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A SQLite connection initialized with sqlite-vec and the store schema.
pub struct Db {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl Db {
    /// Open (or create) the index file at `path` for vectors of `dimensions`.
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening vector index: {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        init_sqlite_vec();
        let conn = Connection::open(path)?;
        Self::init(conn, dimensions)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory(dimensions: usize) -> Result<Self, StoreError> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self, StoreError> {
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch(SCHEMA_SQL)?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'dimensions'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(value) => {
                let expected: usize = value.parse().map_err(|_| {
                    StoreError::MalformedResult(format!("stored dimensions `{value}`"))
                })?;
                if expected != dimensions {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        actual: dimensions,
                    });
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO store_meta (key, value) VALUES ('dimensions', ?)",
                    params![dimensions.to_string()],
                )?;
            }
        }

        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_entries USING vec0(embedding FLOAT[{dimensions}]);"
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Handle to the named collection, created lazily on first insert.
    #[must_use]
    pub fn collection(self: &Arc<Self>, name: &str) -> Collection {
        Collection::new(Arc::clone(self), name)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub(crate) fn check_dimensions(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Helper to serialize a float32 vector into bytes for vec0 virtual table
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
