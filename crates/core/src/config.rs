use std::env;

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_EMBEDDING_MODEL: &str = "BAAI/bge-m3";
pub const DEFAULT_OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_RESULT_LIMIT: usize = 5;

/// Process configuration consumed by the pipeline. Constructed once at
/// startup and handed to the components that need it; nothing reads the
/// environment after this point.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    /// HTTP embedding server; unset selects the offline hashing embedder.
    pub embedding_endpoint: Option<String>,
    pub embedding_model: String,
    pub openrouter_api_base: String,
    pub openrouter_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            qdrant_api_key: None,
            embedding_endpoint: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            openrouter_api_base: DEFAULT_OPENROUTER_API_BASE.to_string(),
            openrouter_api_key: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            qdrant_url: env_nonempty("QDRANT_URL")
                .unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
            qdrant_api_key: env_nonempty("QDRANT_API_KEY"),
            embedding_endpoint: env_nonempty("EMBEDDING_ENDPOINT"),
            embedding_model: env_nonempty("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            openrouter_api_base: env_nonempty("OPENROUTER_API_BASE")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_API_BASE.to_string()),
            openrouter_api_key: env_nonempty("OPENROUTER_API_KEY"),
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
