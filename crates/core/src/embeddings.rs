use crate::error::IngestError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Dense embedding model: one fixed-length vector per input text,
/// deterministic for a fixed model name.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError>;
}

/// Offline character-trigram hashing embedder. Deterministic and cheap;
/// the default when no embedding endpoint is configured, and the test
/// double everywhere else.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl HashEmbedder {
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    inputs: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for an HTTP embedding server hosting named models such as
/// `BAAI/bge-m3`.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl RemoteEmbedder {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embed", self.endpoint))
            .json(&EmbedRequest {
                model: &self.model,
                inputs: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IngestError::Embedding(format!(
                "embedding request for model {} returned {}",
                self.model,
                response.status()
            )));
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|error| IngestError::Embedding(error.to_string()))?;

        if payload.embeddings.len() != texts.len() {
            return Err(IngestError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                payload.embeddings.len()
            )));
        }

        Ok(payload.embeddings)
    }
}

/// Construct-once registry resolving model names to shared embedder
/// instances. Replaces process-wide memoized singletons with an explicit
/// object owned by the pipeline context.
pub struct EmbedderCache {
    endpoint: Option<String>,
    default_model: String,
    cache: RwLock<HashMap<String, Arc<dyn Embedder>>>,
}

impl EmbedderCache {
    pub fn new(endpoint: Option<String>, default_model: impl Into<String>) -> Self {
        Self {
            endpoint,
            default_model: default_model.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Resolve a model name (`None` selects the default model) to a shared
    /// embedder, constructing it at most once per name.
    pub fn resolve(&self, model_name: Option<&str>) -> Arc<dyn Embedder> {
        let name = model_name.unwrap_or(&self.default_model).to_string();

        {
            let cache = self
                .cache
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(found) = cache.get(&name) {
                return Arc::clone(found);
            }
        }

        let embedder: Arc<dyn Embedder> = match &self.endpoint {
            Some(endpoint) => Arc::new(RemoteEmbedder::new(endpoint, &name)),
            None => Arc::new(HashEmbedder::default()),
        };

        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(cache.entry(name).or_insert(embedder))
    }
}
