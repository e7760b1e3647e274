use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::search::metric::DistanceMetric;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the knowledge store is persisted
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Retrieval and pipeline tuning
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answers and structured extraction
    pub chat_model: String,
    /// Model used for query expansion. Falls back to `chat_model`.
    pub expansion_model: Option<String>,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

impl LlmConfig {
    pub fn expansion_model(&self) -> &str {
        self.expansion_model.as_deref().unwrap_or(&self.chat_model)
    }
}

/// Per-pipeline retrieval depth: how many hits each entity type may
/// contribute per query, and how many merged hits reach the formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalProfile {
    pub per_type_limit: usize,
    pub cap: usize,
}

impl RetrievalProfile {
    pub const SEARCH: Self = Self {
        per_type_limit: 5,
        cap: 20,
    };
    pub const EXTRACTION: Self = Self {
        per_type_limit: 10,
        cap: 30,
    };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Metric used by every similarity source and by score normalization
    pub metric: DistanceMetric,
    /// Profile for the free-text search answer
    pub search: RetrievalProfile,
    /// Profile for idea / requirement / change-request extraction
    pub extraction: RetrievalProfile,
    /// Upper bound on a whole pipeline invocation
    pub pipeline_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            expansion_model: None,
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Cosine,
            search: RetrievalProfile::SEARCH,
            extraction: RetrievalProfile::EXTRACTION,
            pipeline_timeout_secs: 180,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("PROJECT_RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("PROJECT_RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Some(model) = lookup("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Some(model) = lookup("LLM_EXPANSION_MODEL") {
            config.llm.expansion_model = Some(model);
        }
        if let Some(model) = lookup("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        parse_into(&lookup, "LLM_EMBEDDING_DIM", &mut config.llm.embedding_dim);

        parse_into(&lookup, "PROJECT_RAG_DISTANCE_METRIC", &mut config.retrieval.metric);
        parse_into(
            &lookup,
            "PROJECT_RAG_SEARCH_PER_TYPE",
            &mut config.retrieval.search.per_type_limit,
        );
        parse_into(&lookup, "PROJECT_RAG_SEARCH_CAP", &mut config.retrieval.search.cap);
        parse_into(
            &lookup,
            "PROJECT_RAG_EXTRACTION_PER_TYPE",
            &mut config.retrieval.extraction.per_type_limit,
        );
        parse_into(
            &lookup,
            "PROJECT_RAG_EXTRACTION_CAP",
            &mut config.retrieval.extraction.cap,
        );
        parse_into(
            &lookup,
            "PROJECT_RAG_PIPELINE_TIMEOUT_SECS",
            &mut config.retrieval.pipeline_timeout_secs,
        );

        config
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("knowledge.json")
    }
}

fn parse_into<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!("Ignoring invalid {key}={raw:?}, keeping default"),
        }
    }
}
