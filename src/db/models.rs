use serde::{Deserialize, Serialize};

/// Metadata stored alongside every indexed chunk.
///
/// Decoded strictly at the store boundary: a row missing any field is an
/// error, never a silently defaulted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub document_title: String,
    pub chunk_index: usize,
}

/// An entry to be written into a collection.
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub id: &'a str,
    pub document: &'a str,
    pub metadata: &'a ChunkMetadata,
}

/// Parallel result lists, one inner list per query vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<ChunkMetadata>>,
    pub distances: Vec<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_rejects_missing_field() {
        let json = r#"{"document_id": "faq", "chunk_index": 0}"#;
        assert!(serde_json::from_str::<ChunkMetadata>(json).is_err());
    }

    #[test]
    fn test_metadata_rejects_negative_index() {
        let json = r#"{"document_id": "faq", "document_title": "faq", "chunk_index": -1}"#;
        assert!(serde_json::from_str::<ChunkMetadata>(json).is_err());
    }

    #[test]
    fn test_metadata_wire_shape() {
        let meta = ChunkMetadata {
            document_id: "refunds".into(),
            document_title: "refunds".into(),
            chunk_index: 2,
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "document_id": "refunds",
                "document_title": "refunds",
                "chunk_index": 2
            })
        );
    }
}
