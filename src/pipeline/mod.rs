//! Retrieval-augmented generation pipelines.
//!
//! Every pipeline runs the same steps:
//!
//! ```text
//! input ─▶ expand ─▶ aggregate(queries, per_type_limit) ─▶ cap(N) ─▶ format
//!                                                                      │
//!        output ◀─ finish ◀─ generate(system, user prompt + context) ◀─┘
//! ```
//!
//! The tasks in [`tasks`] differ only in prompts, settings, retrieval depth
//! and output type.

pub mod drafts;
pub mod prompts;
pub mod tasks;

use std::sync::Arc;

use crate::config::{RetrievalConfig, RetrievalProfile};
use crate::context::format_context;
use crate::error::{EngineError, Result, Stage};
use crate::llm::query_expand::{QueryExpander, SearchQuery};
use crate::llm::{StructuredGenerator, TextGenerator};
use crate::models::{Idea, RequirementVersion, SearchAnswer};
use crate::search::aggregate::{aggregate_from_queries, cap};
use crate::search::hit::Hit;
use crate::search::retriever::HitSource;

use self::drafts::{ExtractedChangeRequest, ExtractedIdeas, ExtractedRequirements};
use self::tasks::{
    ChangeImpactAnalysis, GenerationTask, IdeaExtraction, RawOutput, RequirementDrafting,
    ResponseFormat, SearchTask,
};

/// Context assembled for one generation call.
#[derive(Debug, Clone)]
pub struct GatheredContext {
    pub queries: Vec<SearchQuery>,
    pub hits: Vec<Hit>,
    pub context: String,
}

pub struct RagEngine {
    expander: QueryExpander,
    retriever: Arc<dyn HitSource>,
    text: Arc<dyn TextGenerator>,
    structured: Arc<dyn StructuredGenerator>,
    retrieval: RetrievalConfig,
}

impl RagEngine {
    pub fn new(
        expander: QueryExpander,
        retriever: Arc<dyn HitSource>,
        text: Arc<dyn TextGenerator>,
        structured: Arc<dyn StructuredGenerator>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            expander,
            retriever,
            text,
            structured,
            retrieval,
        }
    }

    /// Expand `input`, retrieve and merge hits for every query, keep the best
    /// `profile.cap` and render them. With no usable queries nothing is
    /// retrieved and the context is the "no relevant context" sentinel.
    pub async fn gather_context(
        &self,
        input: &str,
        profile: RetrievalProfile,
    ) -> Result<GatheredContext> {
        let queries = self.expander.expand(input).await?;
        let hits = aggregate_from_queries(&*self.retriever, &queries, profile.per_type_limit).await?;
        let hits = cap(hits, profile.cap);
        let context = format_context(&hits);
        Ok(GatheredContext {
            queries,
            hits,
            context,
        })
    }

    pub async fn run<T: GenerationTask>(&self, task: T) -> Result<T::Output> {
        let profile = task.profile(&self.retrieval);
        let gathered = self
            .gather_context(&task.expansion_input(), profile)
            .await?;
        tracing::info!(
            "Running {} with {} context hits from {} queries",
            T::NAME,
            gathered.hits.len(),
            gathered.queries.len()
        );

        let system_prompt = task.system_prompt();
        let user_prompt = task.user_prompt(&gathered.context);
        let settings = task.settings();

        let raw = match task.response_format() {
            ResponseFormat::FreeText => {
                let text = self
                    .text
                    .complete(system_prompt, &user_prompt, settings)
                    .await
                    .map_err(|e| EngineError::upstream(Stage::TextGeneration, e))?;
                RawOutput::Text(text)
            }
            ResponseFormat::Structured { name, schema } => {
                let value = self
                    .structured
                    .complete_structured(system_prompt, &user_prompt, name, &schema, settings)
                    .await
                    .map_err(|e| EngineError::upstream(Stage::StructuredGeneration, e))?;
                RawOutput::Json(value)
            }
        };

        task.finish(raw)
    }

    pub async fn search(&self, query: &str) -> Result<SearchAnswer> {
        self.run(SearchTask {
            query: query.to_string(),
        })
        .await
    }

    pub async fn generate_ideas(&self, text: &str) -> Result<ExtractedIdeas> {
        let ideas = self
            .run(IdeaExtraction {
                text: text.to_string(),
            })
            .await?;
        tracing::info!("Extracted {} ideas", ideas.ideas.len());
        Ok(ideas)
    }

    pub async fn generate_requirements(&self, ideas: &[Idea]) -> Result<ExtractedRequirements> {
        let requirements = self.run(RequirementDrafting::new(ideas)).await?;
        tracing::info!(
            "Drafted {} requirements from {} ideas",
            requirements.requirements.len(),
            ideas.len()
        );
        Ok(requirements)
    }

    pub async fn generate_change_request(
        &self,
        base: &RequirementVersion,
        proposed: &RequirementVersion,
    ) -> Result<ExtractedChangeRequest> {
        self.run(ChangeImpactAnalysis {
            base: base.clone(),
            proposed: proposed.clone(),
        })
        .await
    }
}
