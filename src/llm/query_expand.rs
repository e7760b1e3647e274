use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{EngineError, Result, Stage};
use crate::llm::{sanitize_for_prompt, GenerationSettings, TextGenerator};

/// Queries at or below this many characters carry too little signal to search with.
const MIN_QUERY_CHARS: usize = 10;

const EXPANSION_SETTINGS: GenerationSettings = GenerationSettings::new(0.01, 2048);

const EXPANSION_SYSTEM_PROMPT: &str = "\
You write search queries for a project knowledge base that holds documents, \
requirements, ideas, change requests, projects and stakeholders.
Given a text such as a meeting transcript, write natural-language search queries \
that would surface the context needed to understand it. Assume you know nothing \
about the project or its industry: ask what the project is, what it is for and \
what constrains it, then cover the key topics, technical terms and decisions in \
the text. Include queries that check whether what was discussed is feasible \
given physical limits, existing documentation and product goals.
Return one query per line and nothing else.";

/// A single search query with enough content to be worth embedding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SearchQuery(String);

impl SearchQuery {
    /// Trim surrounding whitespace, bullets, dashes and quotes, then keep the
    /// line only if more than ten characters remain.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '-' | '•' | '*' | '"' | '\'' | '“' | '”')
        });
        (trimmed.chars().count() > MIN_QUERY_CHARS).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a multi-line model response into queries, preserving order.
pub fn parse_search_queries(content: &str) -> Vec<SearchQuery> {
    content.lines().filter_map(SearchQuery::parse).collect()
}

/// Turns a long input text into independent search queries.
pub struct QueryExpander {
    generator: Arc<dyn TextGenerator>,
}

impl QueryExpander {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// The result may be empty; callers treat that as "nothing to search".
    pub async fn expand(&self, text: &str) -> Result<Vec<SearchQuery>> {
        let user_prompt = format!(
            "Generate search queries for this text:\n\n{}",
            sanitize_for_prompt(text)
        );

        let response = self
            .generator
            .complete(EXPANSION_SYSTEM_PROMPT, &user_prompt, EXPANSION_SETTINGS)
            .await
            .map_err(|e| EngineError::upstream(Stage::QueryExpansion, e))?;

        let queries = parse_search_queries(&response);
        if queries.is_empty() {
            tracing::warn!("Query expansion produced no usable queries");
        } else {
            tracing::info!("Expanded input into {} search queries", queries.len());
            tracing::debug!("Expanded queries: {queries:?}");
        }
        Ok(queries)
    }
}
