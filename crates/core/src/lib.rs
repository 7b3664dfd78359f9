pub mod answer;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod search;
pub mod sparse;
pub mod stores;
pub mod traits;

pub use answer::{AnswerGenerator, OpenRouterGenerator, DEFAULT_ANSWER_MODEL};
pub use chunking::{chunk_pages, split_text, ChunkerConfig, SEPARATORS};
pub use config::{
    AppConfig, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENROUTER_API_BASE, DEFAULT_QDRANT_URL,
    DEFAULT_RESULT_LIMIT,
};
pub use embeddings::{
    Embedder, EmbedderCache, HashEmbedder, RemoteEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{IngestError, SearchError};
pub use extractor::{extract_document_pages, ocr_to_searchable, LopdfExtractor, PageExtractor};
pub use ingest::{discover_pdf_files, document_id_for, Pipeline};
pub use models::{
    BatchReport, ChunkPayload, DocumentReport, IngestStatus, IngestionOptions, Page, PageChunk,
    ScoredPoint, SearchSource, SparseVector,
};
pub use search::SNIPPET_CHARS;
pub use sparse::{Bm25Encoder, CorpusVocabulary, VocabularyMode, DEFAULT_B, DEFAULT_K1};
pub use stores::QdrantStore;
pub use traits::HybridIndex;
