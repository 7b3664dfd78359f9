use crate::error::SearchError;
use crate::ingest::Pipeline;
use crate::models::{ScoredPoint, SearchSource};
use crate::traits::HybridIndex;
use tracing::debug;

/// Snippet budget for the `text` field of a search hit.
pub const SNIPPET_CHARS: usize = 300;

const MISSING_URL: &str = "N/A";

impl<I: HybridIndex + 'static> Pipeline<I> {
    /// Encode the query once densely and once sparsely, rank against the
    /// index, and shape each hit with its provenance. No matches and a
    /// missing collection both yield an empty list; callers must read that
    /// as "no relevant information", not as failure.
    pub async fn search(
        &self,
        collection: &str,
        query_text: &str,
        model_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchSource>, SearchError> {
        let query = vec![query_text.to_string()];

        let embedder = self.embedders.resolve(model_name);
        let dense_vectors = embedder
            .embed(&query)
            .await
            .map_err(|error| SearchError::Request(error.to_string()))?;
        let Some(dense_query) = dense_vectors.first() else {
            return Err(SearchError::Request(
                "embedder returned no query vector".to_string(),
            ));
        };

        // The query is encoded as its own single-text batch, the same
        // contract the corpus side uses. Under batch-local statistics its
        // IDF is degenerate; a fitted encoder lines both sides up.
        let sparse_query = self
            .sparse
            .encode(&query)
            .into_iter()
            .next()
            .unwrap_or_default();

        let points = self
            .index
            .query_hybrid(collection, dense_query, &sparse_query, limit)
            .await?;
        debug!(collection, hits = points.len(), "query ranked");

        Ok(points.into_iter().map(shape_source).collect())
    }
}

fn shape_source(point: ScoredPoint) -> SearchSource {
    let payload = point.payload;
    let url = if payload.source_path.is_empty() {
        MISSING_URL.to_string()
    } else {
        format!("file://{}", payload.source_path)
    };

    SearchSource {
        url,
        filename: payload.filename,
        source_path: payload.source_path,
        page_number: payload.page_number,
        text: truncate_chars(&payload.text, SNIPPET_CHARS),
        score: point.score,
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
