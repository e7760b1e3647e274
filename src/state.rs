use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::llm::query_expand::QueryExpander;
use crate::llm::{Embedder, LlmClient, StructuredGenerator, TextGenerator};
use crate::pipeline::RagEngine;
use crate::search::retriever::Retriever;
use crate::search::source::SourceSet;
use crate::search::store::KnowledgeStore;

/// The model services the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub embedder: Arc<dyn Embedder>,
    /// Generator used for query expansion
    pub expansion: Arc<dyn TextGenerator>,
    /// Generator used for free-text answers
    pub text: Arc<dyn TextGenerator>,
    pub structured: Arc<dyn StructuredGenerator>,
}

impl Collaborators {
    pub fn from_client(client: LlmClient) -> Self {
        let expansion = Arc::new(client.for_expansion());
        let client = Arc::new(client);
        Self {
            embedder: client.clone(),
            expansion,
            text: client.clone(),
            structured: client,
        }
    }
}

/// Shared application state. Constructed once with [`AppState::open`] and
/// passed to every handler; nothing here is a global.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<KnowledgeStore>,
    pub embedder: Arc<dyn Embedder>,
    pub engine: Arc<RagEngine>,
}

impl AppState {
    /// Load the knowledge store from the data directory and connect to the
    /// configured model provider.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = KnowledgeStore::open_or_create(&config.store_path())?;
        let stats = store.stats();
        tracing::info!(
            "Loaded knowledge store: {} documents, {} ideas, {} requirement versions ({} embedded records)",
            stats.documents,
            stats.ideas,
            stats.requirement_versions,
            stats.embedded
        );

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        let client = LlmClient::new(http, config.llm.clone());

        Ok(Self::assemble(
            config,
            Arc::new(store),
            Collaborators::from_client(client),
        ))
    }

    /// Wire the retriever and pipelines over an existing store.
    pub fn assemble(config: Config, store: Arc<KnowledgeStore>, collab: Collaborators) -> Self {
        let retriever = Retriever::new(
            collab.embedder.clone(),
            SourceSet::from_backend(store.clone()),
            config.retrieval.metric,
        );
        let engine = RagEngine::new(
            QueryExpander::new(collab.expansion),
            Arc::new(retriever),
            collab.text,
            collab.structured,
            config.retrieval.clone(),
        );

        Self {
            config,
            store,
            embedder: collab.embedder,
            engine: Arc::new(engine),
        }
    }

    /// Flush the store to disk.
    pub fn close(&self) -> anyhow::Result<()> {
        self.store.persist()?;
        tracing::info!("Knowledge store persisted");
        Ok(())
    }
}
