//! Full index rebuilds: load, chunk, embed, replace.
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::Config;
use crate::db::{ChunkMetadata, NewEntry, VectorStore};
use crate::embedder::{Embedder, EmbedderError};
use crate::error::{RagError, Result};
use crate::indexer::chunker::{ChunkSettings, chunk_text};
use crate::loader::{Document, load_documents};

/// A chunk ready to be embedded and written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChunk {
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    /// Entries removed from the previous build.
    pub replaced: usize,
    pub finished_at: DateTime<Utc>,
}

/// Deterministic chunk id: `{document_id}_chunk_{index}`.
#[must_use]
pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
    format!("{document_id}_chunk_{chunk_index}")
}

/// Chunks every document, tagging chunks with their per-document index.
#[must_use]
pub fn prepare_chunks(docs: &[Document], settings: ChunkSettings) -> Vec<PreparedChunk> {
    let mut prepared = Vec::new();
    for doc in docs {
        let chunks = chunk_text(&doc.content, settings);
        debug!("{}: {} chunk(s)", doc.id, chunks.len());
        for (idx, text) in chunks.into_iter().enumerate() {
            prepared.push(PreparedChunk {
                chunk_id: chunk_id(&doc.id, idx),
                text,
                metadata: ChunkMetadata {
                    document_id: doc.id.clone(),
                    document_title: doc.title.clone(),
                    chunk_index: idx,
                },
            });
        }
    }
    prepared
}

/// Rebuilds the whole vector index from the documents directory.
///
/// Every build is a full replace. Builds must not run concurrently with
/// each other; retrieval during a build may see an empty collection.
pub struct IndexBuilder {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    documents_dir: PathBuf,
    extensions: Vec<String>,
    settings: ChunkSettings,
}

impl IndexBuilder {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        documents_dir: impl Into<PathBuf>,
        extensions: Vec<String>,
        settings: ChunkSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            documents_dir: documents_dir.into(),
            extensions,
            settings,
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        Ok(Self::new(
            store,
            embedder,
            config.documents_dir.clone(),
            config.extensions.clone(),
            config.chunk_settings()?,
        ))
    }

    /// Load → chunk → embed → replace the collection contents.
    ///
    /// Embeddings are computed before anything is deleted, so an embedding
    /// failure leaves the previous index in place. A store failure after the
    /// delete leaves the collection empty until the next successful build.
    pub fn build_index(&self) -> Result<BuildReport> {
        let docs = load_documents(&self.documents_dir, &self.extensions)?;
        let chunks = prepare_chunks(&docs, self.settings);

        if chunks.is_empty() {
            return Err(RagError::EmptyIndex {
                documents: docs.len(),
            });
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        info!(
            "Embedding {} chunk(s) from {} document(s)",
            texts.len(),
            docs.len()
        );
        let embeddings = self.embedder.embed_batch(&texts)?;
        if embeddings.len() != chunks.len() {
            return Err(EmbedderError::InvalidResponse(format!(
                "asked for {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            ))
            .into());
        }

        let replaced = if self.store.count()? > 0 {
            self.store.delete_all()?
        } else {
            0
        };

        let entries: Vec<NewEntry<'_>> = chunks
            .iter()
            .map(|c| NewEntry {
                id: &c.chunk_id,
                document: &c.text,
                metadata: &c.metadata,
            })
            .collect();
        self.store.add_all(&entries, &embeddings)?;

        let report = BuildReport {
            documents: docs.len(),
            chunks: chunks.len(),
            replaced,
            finished_at: Utc::now(),
        };
        info!(
            "Index built: {} chunk(s) indexed, {} previous entr(ies) replaced",
            report.chunks, report.replaced
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Db, QueryResult, StoreError};
    use crate::embedder::mock::MockEmbedder;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn doc(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            title: id.to_string(),
            source_path: PathBuf::from(format!("{id}.md")),
            content: content.to_string(),
        }
    }

    fn builder_for(dir: &std::path::Path, store: Arc<dyn VectorStore>) -> IndexBuilder {
        IndexBuilder::new(
            store,
            Arc::new(MockEmbedder::new(8)),
            dir,
            vec!["txt".into(), "md".into()],
            ChunkSettings::default(),
        )
    }

    /// Embedder that always fails, to check the previous index survives.
    struct DownEmbedder;

    impl Embedder for DownEmbedder {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbedderError> {
            Err(EmbedderError::Status {
                status: 429,
                body: "quota exceeded".into(),
            })
        }

        fn embed_batch(&self, _texts: &[&str]) -> std::result::Result<Vec<Vec<f32>>, EmbedderError> {
            self.embed("").map(|v| vec![v])
        }

        fn dimensions(&self) -> usize {
            8
        }
    }

    /// Store whose add fails after delete succeeded.
    #[derive(Default)]
    struct BrokenAddStore {
        entries: AtomicUsize,
    }

    impl VectorStore for BrokenAddStore {
        fn add_all(
            &self,
            _entries: &[NewEntry<'_>],
            _embeddings: &[Vec<f32>],
        ) -> std::result::Result<(), StoreError> {
            Err(StoreError::MalformedResult("disk full".into()))
        }

        fn delete_all(&self) -> std::result::Result<usize, StoreError> {
            Ok(self.entries.swap(0, Ordering::SeqCst))
        }

        fn query(
            &self,
            query_vectors: &[Vec<f32>],
            _top_k: usize,
        ) -> std::result::Result<QueryResult, StoreError> {
            Ok(QueryResult {
                ids: vec![Vec::new(); query_vectors.len()],
                documents: vec![Vec::new(); query_vectors.len()],
                metadatas: vec![Vec::new(); query_vectors.len()],
                distances: vec![Vec::new(); query_vectors.len()],
            })
        }

        fn count(&self) -> std::result::Result<usize, StoreError> {
            Ok(self.entries.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id("intro", 0), "intro_chunk_0");
        assert_eq!(chunk_id("faq", 12), "faq_chunk_12");
    }

    #[test]
    fn test_prepare_chunks_indices_and_ids() {
        let docs = vec![doc("a", &"x".repeat(1200)), doc("b", "short")];
        let chunks = prepare_chunks(&docs, ChunkSettings::default());

        // a: 1200 chars -> starts 0, 400, 800
        let a: Vec<&PreparedChunk> = chunks
            .iter()
            .filter(|c| c.metadata.document_id == "a")
            .collect();
        assert_eq!(a.len(), 3);
        for (i, c) in a.iter().enumerate() {
            assert_eq!(c.metadata.chunk_index, i);
            assert_eq!(c.chunk_id, format!("a_chunk_{i}"));
        }

        let ids: HashSet<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids.len(), chunks.len());
        assert_eq!(chunks.last().unwrap().text, "short");
    }

    #[test]
    fn test_build_index_into_sqlite() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("intro.md"), "y".repeat(550)).unwrap();
        fs::write(dir.path().join("faq.txt"), "Refunds within 30 days.").unwrap();

        let db = Arc::new(Db::open_in_memory(8).unwrap());
        let collection = db.collection("documents");
        let builder = builder_for(dir.path(), Arc::new(collection.clone()));

        let report = builder.build_index().unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.replaced, 0);
        assert_eq!(
            collection.ids().unwrap(),
            vec!["faq_chunk_0", "intro_chunk_0", "intro_chunk_1"]
        );

        let again = builder.build_index().unwrap();
        assert_eq!(again.replaced, 3);
        assert_eq!(collection.ids().unwrap().len(), 3);
    }

    #[test]
    fn test_build_index_drops_removed_documents() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("keep.md"), "keep").unwrap();
        fs::write(dir.path().join("gone.md"), "gone").unwrap();

        let db = Arc::new(Db::open_in_memory(8).unwrap());
        let collection = db.collection("documents");
        let builder = builder_for(dir.path(), Arc::new(collection.clone()));
        builder.build_index().unwrap();

        fs::remove_file(dir.path().join("gone.md")).unwrap();
        builder.build_index().unwrap();
        assert_eq!(collection.ids().unwrap(), vec!["keep_chunk_0"]);
    }

    #[test]
    fn test_empty_documents_yield_empty_index_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "").unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();

        let db = Arc::new(Db::open_in_memory(8).unwrap());
        let builder = builder_for(dir.path(), Arc::new(db.collection("documents")));
        let err = builder.build_index().unwrap_err();
        assert!(matches!(err, RagError::EmptyIndex { documents: 2 }));
    }

    #[test]
    fn test_embedding_failure_keeps_previous_index() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "alpha").unwrap();

        let db = Arc::new(Db::open_in_memory(8).unwrap());
        let collection = db.collection("documents");
        builder_for(dir.path(), Arc::new(collection.clone()))
            .build_index()
            .unwrap();

        let failing = IndexBuilder::new(
            Arc::new(collection.clone()),
            Arc::new(DownEmbedder),
            dir.path(),
            vec!["md".into()],
            ChunkSettings::default(),
        );
        let err = failing.build_index().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Dependency);
        assert_eq!(collection.count().unwrap(), 1);
    }

    #[test]
    fn test_store_failure_after_delete_leaves_empty_collection() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "alpha").unwrap();

        let store = Arc::new(BrokenAddStore {
            entries: AtomicUsize::new(4),
        });
        let builder = builder_for(dir.path(), store.clone());

        let err = builder.build_index().unwrap_err();
        assert!(matches!(err, RagError::Dependency(_)));
        // The known rebuild window: delete went through, add did not.
        assert_eq!(store.count().unwrap(), 0);
    }
}
