use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of extracted text, numbered from 1 in reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

/// A bounded slice of page text with provenance. Chunks never span a page
/// boundary, so `page_numbers` currently always holds exactly `page_number`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageChunk {
    pub text: String,
    pub page_number: u32,
    pub page_numbers: Vec<u32>,
}

/// Sparse lexical vector: explicit non-zero (term id, weight) pairs,
/// positionally matched between `indices` and `values`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Payload stored with every indexed point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub document_id: String,
    pub source_path: String,
    pub filename: String,
    pub chunk_index: usize,
    pub page_number: u32,
    pub page_numbers: Vec<u32>,
    pub text: String,
    pub ingested_at: DateTime<Utc>,
}

/// A point returned by the index backend for one query.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: ChunkPayload,
}

/// One ranked retrieval hit, shaped for downstream answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSource {
    pub url: String,
    pub filename: String,
    pub source_path: String,
    pub page_number: u32,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
    Error,
}

/// Terminal record for one document's ingestion run. Per-document failures
/// are folded into this record instead of propagating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub filename: String,
    pub chunks: usize,
    pub status: IngestStatus,
    pub message: String,
}

impl DocumentReport {
    pub fn success(filename: impl Into<String>, chunks: usize) -> Self {
        Self {
            filename: filename.into(),
            chunks,
            status: IngestStatus::Success,
            message: format!("Processed {chunks} chunks"),
        }
    }

    pub fn error(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            chunks: 0,
            status: IngestStatus::Error,
            message: message.into(),
        }
    }
}

/// Outcome of ingesting a batch of documents; `reports` preserves the
/// order the files were submitted in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub reports: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn new(reports: Vec<DocumentReport>) -> Self {
        let succeeded = reports
            .iter()
            .filter(|report| report.status == IngestStatus::Success)
            .count();
        Self {
            attempted: reports.len(),
            succeeded,
            reports,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub model_name: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            model_name: None,
            chunk_size: 1_000,
            chunk_overlap: 200,
        }
    }
}
