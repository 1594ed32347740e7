use std::sync::Arc;

use rusqlite::params;
use tracing::debug;

use super::{Db, NewEntry, QueryResult, StoreError, VectorStore, serialize_vector};

/// A named collection inside a [`Db`].
#[derive(Clone)]
pub struct Collection {
    db: Arc<Db>,
    name: String,
}

impl Collection {
    pub(crate) fn new(db: Arc<Db>, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    /// All entry ids in the collection, sorted.
    pub fn ids(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.db.lock()?;
        let mut stmt =
            conn.prepare("SELECT entry_id FROM entries WHERE collection = ? ORDER BY entry_id")?;
        let rows = stmt.query_map(params![self.name], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

impl VectorStore for Collection {
    fn add_all(&self, entries: &[NewEntry<'_>], embeddings: &[Vec<f32>]) -> Result<(), StoreError> {
        if entries.len() != embeddings.len() {
            return Err(StoreError::LengthMismatch {
                entries: entries.len(),
                embeddings: embeddings.len(),
            });
        }
        for embedding in embeddings {
            self.db.check_dimensions(embedding)?;
        }

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        for (entry, embedding) in entries.iter().zip(embeddings) {
            let metadata = serde_json::to_string(entry.metadata).map_err(|e| {
                StoreError::InvalidMetadata {
                    id: entry.id.to_string(),
                    reason: e.to_string(),
                }
            })?;

            let row_id: i64 = tx.query_row(
                r#"
                INSERT INTO entries (collection, entry_id, document, metadata, added_at)
                VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
                ON CONFLICT(collection, entry_id) DO UPDATE SET
                    document = excluded.document,
                    metadata = excluded.metadata,
                    added_at = CURRENT_TIMESTAMP
                RETURNING id
                "#,
                params![self.name, entry.id, entry.document, metadata],
                |row| row.get(0),
            )?;

            // vec0 has no upsert; replace the vector by hand
            tx.execute("DELETE FROM vec_entries WHERE rowid = ?", params![row_id])?;
            tx.execute(
                "INSERT INTO vec_entries (rowid, embedding) VALUES (?, ?)",
                params![row_id, serialize_vector(embedding)],
            )?;
        }

        tx.commit()?;
        debug!("Added {} entries to collection {}", entries.len(), self.name);
        Ok(())
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        // Virtual table has no cascade
        tx.execute(
            "DELETE FROM vec_entries WHERE rowid IN (SELECT id FROM entries WHERE collection = ?)",
            params![self.name],
        )?;
        let removed = tx.execute("DELETE FROM entries WHERE collection = ?", params![self.name])?;

        tx.commit()?;
        Ok(removed)
    }

    fn query(&self, query_vectors: &[Vec<f32>], top_k: usize) -> Result<QueryResult, StoreError> {
        self.search(query_vectors, top_k)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection = ?",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
