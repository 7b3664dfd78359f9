use crate::error::SearchError;
use crate::models::{ChunkPayload, ScoredPoint, SparseVector};
use async_trait::async_trait;

/// Durable dual-vector index: named collections of points carrying a dense
/// vector, a sparse vector, and a chunk payload.
#[async_trait]
pub trait HybridIndex: Send + Sync {
    /// Create the collection if absent: a dense sub-space of `vector_size`
    /// dimensions under cosine distance plus an unconstrained sparse
    /// sub-space. Must be a no-op when the collection already exists.
    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> Result<(), SearchError>;

    /// Write one point per (dense, sparse, payload) triple in a single
    /// batch, assigning each a freshly generated id. Returns the number of
    /// points written.
    async fn upsert_chunks(
        &self,
        collection: &str,
        dense_vectors: &[Vec<f32>],
        sparse_vectors: &[SparseVector],
        payloads: &[ChunkPayload],
    ) -> Result<usize, SearchError>;

    /// Top-`limit` points ranked against the dense sub-space. The sparse
    /// query vector travels with the call as the fusion extension point but
    /// does not participate in ranking yet. A missing collection yields an
    /// empty result, not an error.
    async fn query_hybrid(
        &self,
        collection: &str,
        dense_query: &[f32],
        sparse_query: &SparseVector,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, SearchError>;
}
