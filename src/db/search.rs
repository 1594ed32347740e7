use rusqlite::params;

use super::{ChunkMetadata, Collection, QueryResult, StoreError, serialize_vector};

struct RawRow {
    id: String,
    document: String,
    metadata: String,
    distance: f64,
}

fn decode_metadata(id: &str, raw: &str) -> Result<ChunkMetadata, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::InvalidMetadata {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

impl Collection {
    /// Cosine-distance search, one result list per query vector.
    pub fn search(
        &self,
        query_vectors: &[Vec<f32>],
        top_k: usize,
    ) -> Result<QueryResult, StoreError> {
        for q in query_vectors {
            self.db().check_dimensions(q)?;
        }

        let mut result = QueryResult::default();
        let conn = self.db().lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                e.entry_id,
                e.document,
                e.metadata,
                vec_distance_cosine(v.embedding, ?) AS distance
            FROM vec_entries v
            JOIN entries e ON v.rowid = e.id
            WHERE e.collection = ?
            ORDER BY distance ASC
            LIMIT ?
            "#,
        )?;

        for q in query_vectors {
            let rows = stmt.query_map(
                params![serialize_vector(q), self.name(), top_k as i64],
                |row| {
                    Ok(RawRow {
                        id: row.get(0)?,
                        document: row.get(1)?,
                        metadata: row.get(2)?,
                        distance: row.get(3)?,
                    })
                },
            )?;

            let mut ids = Vec::new();
            let mut documents = Vec::new();
            let mut metadatas = Vec::new();
            let mut distances = Vec::new();
            for row in rows {
                let row = row?;
                metadatas.push(decode_metadata(&row.id, &row.metadata)?);
                ids.push(row.id);
                documents.push(row.document);
                distances.push(row.distance);
            }

            result.ids.push(ids);
            result.documents.push(documents);
            result.metadatas.push(metadatas);
            result.distances.push(distances);
        }

        Ok(result)
    }
}
