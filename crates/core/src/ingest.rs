use crate::chunking::{chunk_pages, ChunkerConfig};
use crate::embeddings::EmbedderCache;
use crate::error::IngestError;
use crate::extractor::extract_document_pages;
use crate::models::{
    BatchReport, ChunkPayload, DocumentReport, IngestionOptions, PageChunk,
};
use crate::sparse::Bm25Encoder;
use crate::traits::HybridIndex;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Ingestion and retrieval context: the injected index backend, the
/// embedder registry, and the sparse encoder, constructed once at startup
/// and shared across documents and queries.
pub struct Pipeline<I: HybridIndex> {
    pub(crate) index: Arc<I>,
    pub(crate) embedders: Arc<EmbedderCache>,
    pub(crate) sparse: Bm25Encoder,
}

impl<I: HybridIndex> Clone for Pipeline<I> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            embedders: Arc::clone(&self.embedders),
            sparse: self.sparse.clone(),
        }
    }
}

impl<I: HybridIndex + 'static> Pipeline<I> {
    pub fn new(index: I, embedders: EmbedderCache) -> Self {
        Self {
            index: Arc::new(index),
            embedders: Arc::new(embedders),
            sparse: Bm25Encoder::new(),
        }
    }

    /// Substitute a differently configured sparse encoder, e.g. one pinned
    /// to a fitted corpus vocabulary.
    pub fn with_sparse_encoder(mut self, sparse: Bm25Encoder) -> Self {
        self.sparse = sparse;
        self
    }

    /// Run one document through extract, chunk, encode, and upsert. Every
    /// failure is folded into the returned report; this never escalates, so
    /// sibling documents in a batch proceed regardless.
    pub async fn process_document(
        &self,
        path: &Path,
        collection: &str,
        options: &IngestionOptions,
    ) -> DocumentReport {
        let filename = display_filename(path);

        match self.ingest_inner(path, collection, options).await {
            Ok(chunks) => {
                info!(filename = %filename, chunks, collection, "document ingested");
                DocumentReport::success(filename, chunks)
            }
            Err(error) => {
                warn!(filename = %filename, error = %error, "document ingestion failed");
                DocumentReport::error(filename, error.to_string())
            }
        }
    }

    async fn ingest_inner(
        &self,
        path: &Path,
        collection: &str,
        options: &IngestionOptions,
    ) -> Result<usize, IngestError> {
        let pages = extract_document_pages(path).await?;
        if pages.iter().all(|page| page.text.trim().is_empty()) {
            return Err(IngestError::InvalidArgument(
                "No text extracted from PDF".to_string(),
            ));
        }

        let config = ChunkerConfig {
            chunk_size: options.chunk_size,
            chunk_overlap: options.chunk_overlap,
        };
        let chunks = chunk_pages(&pages, config)?;
        if chunks.is_empty() {
            return Err(IngestError::InvalidArgument(
                "No chunks generated".to_string(),
            ));
        }

        self.index_chunks(path, collection, options.model_name.as_deref(), &chunks)
            .await
    }

    /// Encode a document's chunks both ways and write them to the index.
    /// The collection is created lazily, sized to the dense vectors this
    /// batch produced.
    pub async fn index_chunks(
        &self,
        source: &Path,
        collection: &str,
        model_name: Option<&str>,
        chunks: &[PageChunk],
    ) -> Result<usize, IngestError> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();

        let embedder = self.embedders.resolve(model_name);
        let dense_vectors = embedder.embed(&texts).await?;
        let sparse_vectors = self.sparse.encode(&texts);

        let Some(first) = dense_vectors.first() else {
            return Err(IngestError::InvalidArgument(
                "No vectors generated".to_string(),
            ));
        };

        self.index
            .ensure_collection(collection, first.len())
            .await?;

        let payloads = build_payloads(source, chunks)?;
        let written = self
            .index
            .upsert_chunks(collection, &dense_vectors, &sparse_vectors, &payloads)
            .await?;

        Ok(written)
    }

    /// Ingest a batch of documents, one task per document. Reports come
    /// back in submission order; per-document failures never abort the
    /// batch.
    pub async fn process_documents(
        &self,
        paths: &[PathBuf],
        collection: &str,
        options: &IngestionOptions,
    ) -> BatchReport {
        let mut tasks = Vec::with_capacity(paths.len());
        for path in paths {
            let pipeline = self.clone();
            let path = path.clone();
            let collection = collection.to_string();
            let options = options.clone();
            tasks.push(tokio::spawn(async move {
                pipeline.process_document(&path, &collection, &options).await
            }));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for (task, path) in tasks.into_iter().zip(paths) {
            match task.await {
                Ok(report) => reports.push(report),
                Err(join_error) => {
                    reports.push(DocumentReport::error(
                        display_filename(path),
                        join_error.to_string(),
                    ));
                }
            }
        }

        BatchReport::new(reports)
    }
}

/// Recursively collect `.pdf` files under a folder, sorted for stable
/// batch order.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"))
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort_unstable();
    files
}

/// Stable document id derived from the source path.
pub fn document_id_for(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn display_filename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_payloads(source: &Path, chunks: &[PageChunk]) -> Result<Vec<ChunkPayload>, IngestError> {
    let filename = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", source.display()))
        })?;

    let document_id = document_id_for(source);
    let ingested_at = Utc::now();

    Ok(chunks
        .iter()
        .enumerate()
        .map(|(chunk_index, chunk)| ChunkPayload {
            document_id: document_id.clone(),
            source_path: source.to_string_lossy().to_string(),
            filename: filename.to_string(),
            chunk_index,
            page_number: chunk.page_number,
            page_numbers: chunk.page_numbers.clone(),
            text: chunk.text.clone(),
            ingested_at,
        })
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::models::{IngestStatus, ScoredPoint, SparseVector};
    use async_trait::async_trait;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// In-memory stand-in for the index backend: real cosine ranking over
    /// stored points, collection bookkeeping, no network.
    #[derive(Default)]
    pub(crate) struct InMemoryIndex {
        pub collections: Mutex<HashMap<String, usize>>,
        pub points: Mutex<HashMap<String, Vec<(String, Vec<f32>, SparseVector, ChunkPayload)>>>,
        pub ensure_calls: Mutex<usize>,
    }

    #[async_trait]
    impl HybridIndex for InMemoryIndex {
        async fn ensure_collection(
            &self,
            collection: &str,
            vector_size: usize,
        ) -> Result<(), SearchError> {
            *self.ensure_calls.lock().unwrap() += 1;
            self.collections
                .lock()
                .unwrap()
                .entry(collection.to_string())
                .or_insert(vector_size);
            Ok(())
        }

        async fn upsert_chunks(
            &self,
            collection: &str,
            dense_vectors: &[Vec<f32>],
            sparse_vectors: &[SparseVector],
            payloads: &[ChunkPayload],
        ) -> Result<usize, SearchError> {
            if dense_vectors.len() != sparse_vectors.len()
                || dense_vectors.len() != payloads.len()
            {
                return Err(SearchError::Request("length mismatch".to_string()));
            }

            let mut points = self.points.lock().unwrap();
            let stored = points.entry(collection.to_string()).or_default();
            for ((dense, sparse), payload) in dense_vectors
                .iter()
                .zip(sparse_vectors.iter())
                .zip(payloads.iter())
            {
                stored.push((
                    uuid::Uuid::new_v4().to_string(),
                    dense.clone(),
                    sparse.clone(),
                    payload.clone(),
                ));
            }
            Ok(dense_vectors.len())
        }

        async fn query_hybrid(
            &self,
            collection: &str,
            dense_query: &[f32],
            _sparse_query: &SparseVector,
            limit: usize,
        ) -> Result<Vec<ScoredPoint>, SearchError> {
            let points = self.points.lock().unwrap();
            let Some(stored) = points.get(collection) else {
                return Ok(Vec::new());
            };

            let mut scored: Vec<ScoredPoint> = stored
                .iter()
                .map(|(id, dense, _sparse, payload)| ScoredPoint {
                    id: id.clone(),
                    score: cosine(dense_query, dense),
                    payload: payload.clone(),
                })
                .collect();
            scored.sort_by(|left, right| right.score.total_cmp(&left.score));
            scored.truncate(limit);
            Ok(scored)
        }
    }

    fn cosine(left: &[f32], right: &[f32]) -> f32 {
        let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
        let left_norm: f32 = left.iter().map(|a| a * a).sum::<f32>().sqrt();
        let right_norm: f32 = right.iter().map(|b| b * b).sum::<f32>().sqrt();
        if left_norm == 0.0 || right_norm == 0.0 {
            0.0
        } else {
            dot / (left_norm * right_norm)
        }
    }

    pub(crate) fn pipeline() -> Pipeline<InMemoryIndex> {
        Pipeline::new(InMemoryIndex::default(), EmbedderCache::new(None, "test-model"))
    }

    /// Write a small single-page PDF carrying `text`.
    pub(crate) fn write_sample_pdf(path: &Path, text: &str) {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = document.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = document.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        document
            .objects
            .insert(pages_id, Object::Dictionary(pages));
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);
        document.save(path).unwrap();
    }

    fn chunk(text: &str, page: u32) -> PageChunk {
        PageChunk {
            text: text.to_string(),
            page_number: page,
            page_numbers: vec![page],
        }
    }

    #[tokio::test]
    async fn index_chunks_writes_aligned_triples() {
        let pipeline = pipeline();
        let chunks = vec![chunk("pump pressure limits", 1), chunk("seal inspection", 2)];

        let written = pipeline
            .index_chunks(Path::new("/tmp/manual.pdf"), "docs", None, &chunks)
            .await
            .unwrap();
        assert_eq!(written, 2);

        let points = pipeline.index.points.lock().unwrap();
        let stored = points.get("docs").unwrap();
        assert_eq!(stored.len(), 2);
        for (position, (_id, dense, _sparse, payload)) in stored.iter().enumerate() {
            assert_eq!(dense.len(), 384);
            assert_eq!(payload.chunk_index, position);
            assert_eq!(payload.filename, "manual.pdf");
            assert_eq!(payload.page_numbers, vec![payload.page_number]);
        }
    }

    #[tokio::test]
    async fn collection_is_sized_from_the_dense_vectors() {
        let pipeline = pipeline();
        let chunks = vec![chunk("some text", 1)];
        pipeline
            .index_chunks(Path::new("/tmp/a.pdf"), "docs", None, &chunks)
            .await
            .unwrap();

        let collections = pipeline.index.collections.lock().unwrap();
        assert_eq!(collections.get("docs"), Some(&384));
    }

    #[tokio::test]
    async fn empty_chunk_batch_reports_no_vectors() {
        let pipeline = pipeline();
        let result = pipeline
            .index_chunks(Path::new("/tmp/a.pdf"), "docs", None, &[])
            .await;
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn unreadable_document_folds_into_an_error_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken").unwrap();

        let pipeline = pipeline();
        let report = pipeline
            .process_document(&path, "docs", &IngestionOptions::default())
            .await;

        assert_eq!(report.status, IngestStatus::Error);
        assert_eq!(report.filename, "broken.pdf");
        assert_eq!(report.chunks, 0);
        assert!(!report.message.is_empty());
    }

    #[tokio::test]
    async fn readable_document_ingests_end_to_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manual.pdf");
        write_sample_pdf(&path, "Relief valve opens at 210 bar during the bench test.");

        let pipeline = pipeline();
        let report = pipeline
            .process_document(&path, "docs", &IngestionOptions::default())
            .await;

        assert_eq!(report.status, IngestStatus::Success, "{}", report.message);
        assert!(report.chunks >= 1);

        let points = pipeline.index.points.lock().unwrap();
        let stored = points.get("docs").unwrap();
        assert_eq!(stored.len(), report.chunks);
        assert!(stored[0].3.text.contains("Relief valve"));
        assert_eq!(stored[0].3.page_number, 1);
    }

    #[tokio::test]
    async fn misconfigured_overlap_is_a_per_document_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manual.pdf");
        write_sample_pdf(&path, "Some perfectly readable text.");

        let pipeline = pipeline();
        let options = IngestionOptions {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        let report = pipeline.process_document(&path, "docs", &options).await;

        assert_eq!(report.status, IngestStatus::Error);
        assert!(report.message.contains("chunk_overlap"));
    }

    #[tokio::test]
    async fn batch_isolates_per_document_failures() {
        let dir = tempdir().unwrap();
        let good_one = dir.path().join("one.pdf");
        let bad = dir.path().join("two.pdf");
        let good_two = dir.path().join("three.pdf");
        write_sample_pdf(&good_one, "Torque the head bolts in three passes.");
        fs::write(&bad, b"%PDF-1.4\n%broken").unwrap();
        write_sample_pdf(&good_two, "Bleed the hydraulic line before restart.");

        let pipeline = pipeline();
        let batch = pipeline
            .process_documents(
                &[good_one, bad, good_two],
                "docs",
                &IngestionOptions::default(),
            )
            .await;

        assert_eq!(batch.attempted, 3);
        assert_eq!(batch.succeeded, 2);
        assert_eq!(batch.reports.len(), 3);
        assert_eq!(batch.reports[0].status, IngestStatus::Success);
        assert_eq!(batch.reports[1].status, IngestStatus::Error);
        assert_eq!(batch.reports[2].status, IngestStatus::Success);
        assert_eq!(batch.reports[1].filename, "two.pdf");
    }

    #[tokio::test]
    async fn reingesting_duplicates_rather_than_updating() {
        let pipeline = pipeline();
        let chunks = vec![chunk("identical chunk", 1)];

        pipeline
            .index_chunks(Path::new("/tmp/a.pdf"), "docs", None, &chunks)
            .await
            .unwrap();
        pipeline
            .index_chunks(Path::new("/tmp/a.pdf"), "docs", None, &chunks)
            .await
            .unwrap();

        let points = pipeline.index.points.lock().unwrap();
        assert_eq!(points.get("docs").unwrap().len(), 2);

        // existence is re-checked per call, never cached locally
        assert_eq!(*pipeline.index.ensure_calls.lock().unwrap(), 2);
        assert_eq!(
            pipeline.index.collections.lock().unwrap().get("docs"),
            Some(&384)
        );
    }

    #[test]
    fn discover_pdf_files_is_recursive_and_sorted() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("a.PDF"), b"%PDF").unwrap();
        fs::write(nested.join("c.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("notes.txt"), b"text").unwrap();

        let files = discover_pdf_files(dir.path());
        assert_eq!(files.len(), 3);
        assert!(files.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn document_ids_are_stable_per_path() {
        let first = document_id_for(Path::new("/tmp/a.pdf"));
        let second = document_id_for(Path::new("/tmp/a.pdf"));
        let other = document_id_for(Path::new("/tmp/b.pdf"));
        assert_eq!(first, second);
        assert_ne!(first, other);
    }
}
