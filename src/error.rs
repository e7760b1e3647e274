use std::fmt;

use thiserror::Error;

use crate::models::EntityKind;

/// Which collaborator call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedding,
    SimilaritySearch(EntityKind),
    RequirementLookup,
    QueryExpansion,
    TextGeneration,
    StructuredGeneration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Embedding => f.write_str("embedding"),
            Stage::SimilaritySearch(kind) => write!(f, "{kind} similarity search"),
            Stage::RequirementLookup => f.write_str("requirement lookup"),
            Stage::QueryExpansion => f.write_str("query expansion"),
            Stage::TextGeneration => f.write_str("text generation"),
            Stage::StructuredGeneration => f.write_str("structured generation"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// A collaborator (embedding, similarity search, generation) failed.
    /// Never retried here.
    #[error("{stage} failed: {source}")]
    Upstream {
        stage: Stage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// Structured generation returned data that violates its schema.
    #[error("malformed structured output: {reason}")]
    MalformedOutput { reason: String },

    /// An enum value that is neither current nor in a legacy mapping table.
    #[error("invalid value {value:?} for {field}")]
    InvalidEnumValue { field: &'static str, value: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl EngineError {
    pub fn upstream(stage: Stage, source: anyhow::Error) -> Self {
        Self::Upstream {
            stage,
            source: source.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
