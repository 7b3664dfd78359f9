use crate::error::SearchError;
use crate::models::{ChunkPayload, ScoredPoint, SparseVector};
use crate::traits::HybridIndex;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

pub const DENSE_VECTOR_NAME: &str = "dense";
pub const SPARSE_VECTOR_NAME: &str = "sparse";

/// Qdrant-backed hybrid index over the REST API.
pub struct QdrantStore {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl QdrantStore {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, SearchError> {
        let parsed = Url::parse(endpoint)?;
        Ok(Self {
            endpoint: parsed.as_str().trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, SearchError> {
        let response = self
            .authorize(self.client.get(format!(
                "{}/collections/{}/exists",
                self.endpoint, collection
            )))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result/exists")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }
}

fn collection_body(vector_size: usize) -> Value {
    json!({
        "vectors": {
            DENSE_VECTOR_NAME: { "size": vector_size, "distance": "Cosine" },
        },
        "sparse_vectors": {
            SPARSE_VECTOR_NAME: {},
        },
    })
}

fn build_points(
    dense_vectors: &[Vec<f32>],
    sparse_vectors: &[SparseVector],
    payloads: &[ChunkPayload],
) -> Result<Vec<Value>, SearchError> {
    if dense_vectors.len() != sparse_vectors.len() || dense_vectors.len() != payloads.len() {
        return Err(SearchError::Request(format!(
            "point batch lengths differ: {} dense, {} sparse, {} payloads",
            dense_vectors.len(),
            sparse_vectors.len(),
            payloads.len()
        )));
    }

    dense_vectors
        .iter()
        .zip(sparse_vectors.iter())
        .zip(payloads.iter())
        .map(|((dense, sparse), payload)| {
            Ok(json!({
                "id": Uuid::new_v4().to_string(),
                "vector": {
                    DENSE_VECTOR_NAME: dense,
                    SPARSE_VECTOR_NAME: {
                        "indices": sparse.indices,
                        "values": sparse.values,
                    },
                },
                "payload": serde_json::to_value(payload)?,
            }))
        })
        .collect()
}

#[async_trait]
impl HybridIndex for QdrantStore {
    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> Result<(), SearchError> {
        if self.collection_exists(collection).await? {
            return Ok(());
        }

        let response = self
            .authorize(
                self.client
                    .put(format!("{}/collections/{}", self.endpoint, collection)),
            )
            .json(&collection_body(vector_size))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn upsert_chunks(
        &self,
        collection: &str,
        dense_vectors: &[Vec<f32>],
        sparse_vectors: &[SparseVector],
        payloads: &[ChunkPayload],
    ) -> Result<usize, SearchError> {
        let points = build_points(dense_vectors, sparse_vectors, payloads)?;
        if points.is_empty() {
            return Ok(0);
        }

        let written = points.len();
        let response = self
            .authorize(self.client.put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, collection
            )))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(written)
    }

    async fn query_hybrid(
        &self,
        collection: &str,
        dense_query: &[f32],
        _sparse_query: &SparseVector,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, SearchError> {
        let response = self
            .authorize(self.client.post(format!(
                "{}/collections/{}/points/query",
                self.endpoint, collection
            )))
            .json(&json!({
                "query": dense_query,
                "using": DENSE_VECTOR_NAME,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result/points")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut result = Vec::new();
        for hit in hits {
            let id = match hit.pointer("/id") {
                Some(Value::String(id)) => id.clone(),
                Some(Value::Number(id)) => id.to_string(),
                _ => String::new(),
            };
            let score = hit
                .pointer("/score")
                .and_then(Value::as_f64)
                .unwrap_or(0.0) as f32;
            let payload = hit
                .pointer("/payload")
                .cloned()
                .unwrap_or(Value::Null);
            let payload: ChunkPayload =
                serde_json::from_value(payload).map_err(|error| SearchError::BackendResponse {
                    backend: "qdrant".to_string(),
                    details: format!("unreadable point payload: {error}"),
                })?;

            result.push(ScoredPoint { id, score, payload });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn payload(index: usize) -> ChunkPayload {
        ChunkPayload {
            document_id: "doc".to_string(),
            source_path: "/tmp/manual.pdf".to_string(),
            filename: "manual.pdf".to_string(),
            chunk_index: index,
            page_number: 1,
            page_numbers: vec![1],
            text: "chunk text".to_string(),
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn collection_body_declares_both_subspaces() {
        let body = collection_body(384);
        assert_eq!(body.pointer("/vectors/dense/size").unwrap(), 384);
        assert_eq!(
            body.pointer("/vectors/dense/distance").unwrap(),
            "Cosine"
        );
        assert!(body.pointer("/sparse_vectors/sparse").is_some());
    }

    #[test]
    fn points_get_fresh_unique_ids() {
        let dense = vec![vec![0.1, 0.2], vec![0.3, 0.4]];
        let sparse = vec![SparseVector::default(), SparseVector::default()];
        let payloads = vec![payload(0), payload(1)];

        let first = build_points(&dense, &sparse, &payloads).unwrap();
        let second = build_points(&dense, &sparse, &payloads).unwrap();

        let ids: Vec<&str> = first
            .iter()
            .chain(second.iter())
            .map(|point| point.pointer("/id").and_then(Value::as_str).unwrap())
            .collect();
        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn point_carries_named_vectors_and_payload() {
        let dense = vec![vec![0.5, 0.5]];
        let sparse = vec![SparseVector {
            indices: vec![3, 7],
            values: vec![0.9, 0.1],
        }];
        let payloads = vec![payload(0)];

        let points = build_points(&dense, &sparse, &payloads).unwrap();
        let point = &points[0];

        assert_eq!(
            point.pointer("/vector/sparse/indices").unwrap(),
            &json!([3, 7])
        );
        assert_eq!(
            point.pointer("/payload/chunk_index").and_then(Value::as_u64),
            Some(0)
        );
        assert_eq!(
            point.pointer("/payload/page_numbers").unwrap(),
            &json!([1])
        );
    }

    #[test]
    fn mismatched_batch_lengths_are_rejected() {
        let dense = vec![vec![0.1]];
        let sparse = vec![];
        let payloads = vec![payload(0)];
        assert!(build_points(&dense, &sparse, &payloads).is_err());
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        assert!(QdrantStore::new("not a url", None).is_err());
    }
}
