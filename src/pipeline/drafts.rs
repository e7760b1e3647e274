//! Typed outputs of the structured-generation pipelines.
//!
//! Each draft deserializes strictly from the model's JSON and is then range
//! checked. Nothing is clamped or defaulted past what the schema itself
//! declares; a violation is reported as malformed output.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{EngineError, Result};
use crate::models::{ChangeRequestStatus, IdeaPriority, RequirementStatus, RequirementType};

fn default_priority() -> u8 {
    3
}

fn check_range(field: String, value: u8, min: u8, max: u8) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::malformed(format!(
            "{field} must be within {min}..={max}, got {value}"
        )))
    }
}

fn check_present(field: String, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(EngineError::malformed(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

fn enum_values<T: Copy>(all: &[T], as_str: fn(T) -> &'static str) -> Vec<&'static str> {
    all.iter().map(|v| as_str(*v)).collect()
}

// ─── Ideas ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedIdea {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub conflicts: Option<String>,
    #[serde(default)]
    pub dependencies: Option<String>,
    #[serde(default)]
    pub priority: IdeaPriority,
    pub impact: u8,
    pub confidence: u8,
    pub effort: u8,
}

impl ExtractedIdea {
    pub fn ice_score(&self) -> f32 {
        f32::from(self.impact) * f32::from(self.confidence) / f32::from(self.effort.max(1))
    }

    fn validate(&self, at: &str) -> Result<()> {
        check_present(format!("{at}.title"), &self.title)?;
        check_range(format!("{at}.impact"), self.impact, 0, 10)?;
        check_range(format!("{at}.confidence"), self.confidence, 0, 10)?;
        check_range(format!("{at}.effort"), self.effort, 1, 10)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedIdeas {
    pub ideas: Vec<ExtractedIdea>,
}

impl ExtractedIdeas {
    pub fn validate(&self) -> Result<()> {
        for (i, idea) in self.ideas.iter().enumerate() {
            idea.validate(&format!("ideas[{i}]"))?;
        }
        Ok(())
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "ideas": {
                    "type": "array",
                    "description": "Actionable ideas extracted from the text",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "category": { "type": "string" },
                            "conflicts": { "type": ["string", "null"] },
                            "dependencies": { "type": ["string", "null"] },
                            "priority": {
                                "type": "string",
                                "enum": enum_values(IdeaPriority::ALL, IdeaPriority::as_str),
                            },
                            "impact": { "type": "integer", "minimum": 0, "maximum": 10 },
                            "confidence": { "type": "integer", "minimum": 0, "maximum": 10 },
                            "effort": { "type": "integer", "minimum": 1, "maximum": 10 },
                        },
                        "required": ["title", "description", "category", "impact", "confidence", "effort"],
                    },
                },
            },
            "required": ["ideas"],
        })
    }
}

// ─── Requirements ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRequirement {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(rename = "type")]
    pub req_type: RequirementType,
    #[serde(default)]
    pub conflicts: Option<String>,
    #[serde(default)]
    pub dependencies: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub status: RequirementStatus,
}

impl ExtractedRequirement {
    fn validate(&self, at: &str) -> Result<()> {
        check_present(format!("{at}.title"), &self.title)?;
        check_range(format!("{at}.priority"), self.priority, 1, 5)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRequirements {
    pub requirements: Vec<ExtractedRequirement>,
}

impl ExtractedRequirements {
    pub fn validate(&self) -> Result<()> {
        for (i, req) in self.requirements.iter().enumerate() {
            req.validate(&format!("requirements[{i}]"))?;
        }
        Ok(())
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "requirements": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "category": { "type": "string" },
                            "type": {
                                "type": "string",
                                "enum": enum_values(RequirementType::ALL, RequirementType::as_str),
                            },
                            "conflicts": { "type": ["string", "null"] },
                            "dependencies": { "type": ["string", "null"] },
                            "priority": { "type": "integer", "minimum": 1, "maximum": 5 },
                            "status": {
                                "type": "string",
                                "enum": enum_values(RequirementStatus::ALL, RequirementStatus::as_str),
                            },
                        },
                        "required": ["title", "description", "category", "type"],
                    },
                },
            },
            "required": ["requirements"],
        })
    }
}

// ─── Change requests ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedChangeRequest {
    pub title: String,
    pub cost: String,
    pub benefit: String,
    pub summary: String,
    #[serde(default)]
    pub status: ChangeRequestStatus,
}

impl ExtractedChangeRequest {
    pub fn validate(&self) -> Result<()> {
        check_present("title".to_string(), &self.title)?;
        check_present("summary".to_string(), &self.summary)
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "cost": { "type": "string", "description": "Cost and effort analysis of the change" },
                "benefit": { "type": "string", "description": "Expected benefits" },
                "summary": { "type": "string", "description": "Impact summary and recommendation" },
                "status": {
                    "type": "string",
                    "enum": enum_values(ChangeRequestStatus::ALL, ChangeRequestStatus::as_str),
                },
            },
            "required": ["title", "cost", "benefit", "summary"],
        })
    }
}

/// Deserialize a structured response, reporting any schema violation as
/// malformed output.
pub fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| EngineError::malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idea_json(impact: i64, effort: i64) -> Value {
        json!({
            "title": "Social login",
            "description": "Let users sign in with an existing account",
            "category": "onboarding",
            "priority": "HIGH",
            "impact": impact,
            "confidence": 7,
            "effort": effort,
        })
    }

    #[test]
    fn test_valid_ideas_parse() {
        let ideas: ExtractedIdeas = from_json(json!({ "ideas": [idea_json(8, 2)] })).unwrap();
        ideas.validate().unwrap();
        assert_eq!(ideas.ideas[0].priority, IdeaPriority::High);
        assert!((ideas.ideas[0].ice_score() - 28.0).abs() < 1e-6);
    }

    #[test]
    fn test_idea_priority_defaults_to_medium() {
        let mut raw = idea_json(5, 5);
        raw.as_object_mut().unwrap().remove("priority");
        let idea: ExtractedIdea = from_json(raw).unwrap();
        assert_eq!(idea.priority, IdeaPriority::Medium);
    }

    #[test]
    fn test_out_of_range_values_are_rejected_not_clamped() {
        let ideas: ExtractedIdeas = from_json(json!({ "ideas": [idea_json(11, 2)] })).unwrap();
        let err = ideas.validate().unwrap_err();
        assert!(err.to_string().contains("ideas[0].impact"));

        let ideas: ExtractedIdeas = from_json(json!({ "ideas": [idea_json(5, 0)] })).unwrap();
        assert!(matches!(
            ideas.validate(),
            Err(EngineError::MalformedOutput { .. })
        ));

        let negative = from_json::<ExtractedIdeas>(json!({ "ideas": [idea_json(-1, 2)] }));
        assert!(matches!(negative, Err(EngineError::MalformedOutput { .. })));
    }

    #[test]
    fn test_unknown_enum_is_malformed() {
        let mut raw = idea_json(5, 5);
        raw["priority"] = json!("URGENT");
        let err = from_json::<ExtractedIdea>(raw).unwrap_err();
        assert!(matches!(err, EngineError::MalformedOutput { .. }));
        assert!(err.to_string().contains("URGENT"));
    }

    #[test]
    fn test_requirement_defaults_and_legacy_type() {
        let req: ExtractedRequirement = from_json(json!({
            "title": "The system shall support SSO",
            "description": "Users sign in via the company identity provider",
            "category": "auth",
            "type": "CONSTRAINT",
        }))
        .unwrap();
        assert_eq!(req.req_type, RequirementType::Functional);
        assert_eq!(req.priority, 3);
        assert_eq!(req.status, RequirementStatus::Draft);
    }

    #[test]
    fn test_requirement_priority_range() {
        let reqs: ExtractedRequirements = from_json(json!({
            "requirements": [{
                "title": "t", "description": "d", "category": "c",
                "type": "SECURITY", "priority": 6,
            }]
        }))
        .unwrap();
        let err = reqs.validate().unwrap_err();
        assert!(err.to_string().contains("requirements[0].priority"));
    }

    #[test]
    fn test_change_request_requires_summary() {
        let cr: ExtractedChangeRequest = from_json(json!({
            "title": "Switch to OAuth", "cost": "3 sprints", "benefit": "fewer tickets", "summary": "  ",
        }))
        .unwrap();
        assert_eq!(cr.status, ChangeRequestStatus::Pending);
        assert!(cr.validate().is_err());

        let missing = from_json::<ExtractedChangeRequest>(json!({ "title": "x" }));
        assert!(missing.is_err());
    }

    #[test]
    fn test_schemas_list_enum_values() {
        let schema = ExtractedIdeas::schema();
        let priorities = &schema["properties"]["ideas"]["items"]["properties"]["priority"]["enum"];
        assert_eq!(priorities, &json!(["LOW", "MEDIUM", "HIGH", "CRITICAL"]));

        let schema = ExtractedRequirements::schema();
        let types = schema["properties"]["requirements"]["items"]["properties"]["type"]["enum"]
            .as_array()
            .unwrap();
        assert!(types.contains(&json!("NON_FUNCTIONAL")));
        assert!(!types.contains(&json!("CONSTRAINT")));
    }
}
