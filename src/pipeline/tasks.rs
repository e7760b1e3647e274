//! The four generation tasks. Each one only supplies prompts, sampling
//! settings, a retrieval profile and a way to turn the raw response into
//! its output; [`RagEngine::run`](super::RagEngine::run) does the rest.

use serde_json::Value;

use crate::config::{RetrievalConfig, RetrievalProfile};
use crate::error::{EngineError, Result};
use crate::llm::GenerationSettings;
use crate::models::{Idea, RequirementVersion, SearchAnswer};
use crate::pipeline::drafts::{
    self, ExtractedChangeRequest, ExtractedIdeas, ExtractedRequirements,
};
use crate::pipeline::prompts;

/// What the generation call should return.
pub enum ResponseFormat {
    FreeText,
    Structured { name: &'static str, schema: Value },
}

/// The raw response, matching the requested [`ResponseFormat`].
pub enum RawOutput {
    Text(String),
    Json(Value),
}

impl RawOutput {
    fn into_text(self) -> Result<String> {
        match self {
            RawOutput::Text(s) => Ok(s),
            RawOutput::Json(_) => Err(EngineError::malformed("expected free text, got JSON")),
        }
    }

    fn into_json(self) -> Result<Value> {
        match self {
            RawOutput::Json(v) => Ok(v),
            RawOutput::Text(_) => Err(EngineError::malformed("expected JSON, got free text")),
        }
    }
}

pub trait GenerationTask: Send {
    type Output;

    /// Used in log lines.
    const NAME: &'static str;

    fn profile(&self, retrieval: &RetrievalConfig) -> RetrievalProfile;

    /// Text handed to query expansion.
    fn expansion_input(&self) -> String;

    fn system_prompt(&self) -> &'static str;

    fn user_prompt(&self, context: &str) -> String;

    fn settings(&self) -> GenerationSettings;

    fn response_format(&self) -> ResponseFormat;

    fn finish(self, raw: RawOutput) -> Result<Self::Output>;
}

// ─── Search answer ───────────────────────────────────────

pub struct SearchTask {
    pub query: String,
}

impl GenerationTask for SearchTask {
    type Output = SearchAnswer;
    const NAME: &'static str = "search";

    fn profile(&self, retrieval: &RetrievalConfig) -> RetrievalProfile {
        retrieval.search
    }

    fn expansion_input(&self) -> String {
        self.query.clone()
    }

    fn system_prompt(&self) -> &'static str {
        prompts::SEARCH_SYSTEM
    }

    fn user_prompt(&self, context: &str) -> String {
        prompts::search_user(&self.query, context)
    }

    fn settings(&self) -> GenerationSettings {
        GenerationSettings::new(0.1, 512)
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::FreeText
    }

    fn finish(self, raw: RawOutput) -> Result<SearchAnswer> {
        Ok(SearchAnswer {
            query: self.query,
            answer: raw.into_text()?,
        })
    }
}

// ─── Idea extraction ─────────────────────────────────────

pub struct IdeaExtraction {
    pub text: String,
}

impl GenerationTask for IdeaExtraction {
    type Output = ExtractedIdeas;
    const NAME: &'static str = "idea extraction";

    fn profile(&self, retrieval: &RetrievalConfig) -> RetrievalProfile {
        retrieval.extraction
    }

    fn expansion_input(&self) -> String {
        self.text.clone()
    }

    fn system_prompt(&self) -> &'static str {
        prompts::IDEAS_SYSTEM
    }

    fn user_prompt(&self, context: &str) -> String {
        prompts::ideas_user(&self.text, context)
    }

    fn settings(&self) -> GenerationSettings {
        GenerationSettings::new(0.01, 8192)
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::Structured {
            name: "extracted_ideas",
            schema: ExtractedIdeas::schema(),
        }
    }

    fn finish(self, raw: RawOutput) -> Result<ExtractedIdeas> {
        let ideas: ExtractedIdeas = drafts::from_json(raw.into_json()?)?;
        ideas.validate()?;
        Ok(ideas)
    }
}

// ─── Requirement drafting ────────────────────────────────

pub struct RequirementDrafting {
    ideas_text: String,
}

impl RequirementDrafting {
    pub fn new(ideas: &[Idea]) -> Self {
        Self {
            ideas_text: prompts::ideas_text(ideas),
        }
    }
}

impl GenerationTask for RequirementDrafting {
    type Output = ExtractedRequirements;
    const NAME: &'static str = "requirement drafting";

    fn profile(&self, retrieval: &RetrievalConfig) -> RetrievalProfile {
        retrieval.extraction
    }

    fn expansion_input(&self) -> String {
        self.ideas_text.clone()
    }

    fn system_prompt(&self) -> &'static str {
        prompts::REQUIREMENTS_SYSTEM
    }

    fn user_prompt(&self, context: &str) -> String {
        prompts::requirements_user(&self.ideas_text, context)
    }

    fn settings(&self) -> GenerationSettings {
        GenerationSettings::new(0.01, 8192)
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::Structured {
            name: "extracted_requirements",
            schema: ExtractedRequirements::schema(),
        }
    }

    fn finish(self, raw: RawOutput) -> Result<ExtractedRequirements> {
        let requirements: ExtractedRequirements = drafts::from_json(raw.into_json()?)?;
        requirements.validate()?;
        Ok(requirements)
    }
}

// ─── Change impact analysis ──────────────────────────────

pub struct ChangeImpactAnalysis {
    pub base: RequirementVersion,
    pub proposed: RequirementVersion,
}

impl GenerationTask for ChangeImpactAnalysis {
    type Output = ExtractedChangeRequest;
    const NAME: &'static str = "change impact analysis";

    fn profile(&self, retrieval: &RetrievalConfig) -> RetrievalProfile {
        retrieval.extraction
    }

    fn expansion_input(&self) -> String {
        prompts::change_text(&self.base, &self.proposed)
    }

    fn system_prompt(&self) -> &'static str {
        prompts::CHANGE_REQUEST_SYSTEM
    }

    fn user_prompt(&self, context: &str) -> String {
        prompts::change_request_user(&self.base, &self.proposed, context)
    }

    fn settings(&self) -> GenerationSettings {
        GenerationSettings::new(0.01, 4096)
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::Structured {
            name: "change_request",
            schema: ExtractedChangeRequest::schema(),
        }
    }

    fn finish(self, raw: RawOutput) -> Result<ExtractedChangeRequest> {
        let cr: ExtractedChangeRequest = drafts::from_json(raw.into_json()?)?;
        cr.validate()?;
        Ok(cr)
    }
}
