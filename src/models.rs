use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::EngineError;

/// The six record types the knowledge base holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Stakeholder,
    Document,
    Idea,
    Requirement,
    ChangeRequest,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Project => "Project",
            EntityKind::Stakeholder => "Stakeholder",
            EntityKind::Document => "Document",
            EntityKind::Idea => "Idea",
            EntityKind::Requirement => "Requirement",
            EntityKind::ChangeRequest => "Change Request",
        })
    }
}

/// String-backed enum with strict parsing plus an explicit table of legacy
/// spellings. Anything not in either set is rejected.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
        legacy {
            $($old:literal => $mapped:ident),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Retired spellings still found in stored data.
            pub const LEGACY: &'static [(&'static str, $name)] = &[$(($old, $name::$mapped)),*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EngineError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                if let Some(v) = Self::ALL.iter().find(|v| v.as_str() == raw) {
                    return Ok(*v);
                }
                if let Some((_, mapped)) = Self::LEGACY.iter().find(|(old, _)| *old == raw) {
                    tracing::warn!("Mapping legacy {} {raw:?} to {}", $field, mapped);
                    return Ok(*mapped);
                }
                Err(EngineError::InvalidEnumValue {
                    field: $field,
                    value: raw.to_string(),
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_enum! {
    ProjectStatus, "project status" {
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        Archived => "ARCHIVED",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
    }
    legacy {}
}

string_enum! {
    DocumentType, "document type" {
        PlanningDocuments => "PLANNING_DOCUMENTS",
        RequirementsDocuments => "REQUIREMENTS_DOCUMENTS",
        DesignDocuments => "DESIGN_DOCUMENTS",
        TechnicalDocuments => "TECHNICAL_DOCUMENTS",
        TestingDocuments => "TESTING_DOCUMENTS",
        ManagementReports => "MANAGEMENT_REPORTS",
        MeetingNotes => "MEETING_NOTES",
        ContractDocuments => "CONTRACT_DOCUMENTS",
        UserGuides => "USER_GUIDES",
        ReleaseNotes => "RELEASE_NOTES",
    }
    legacy {
        "SPECIFICATION" => RequirementsDocuments,
        "EMAIL" => MeetingNotes,
        "REPORT" => ManagementReports,
        "OTHER" => TechnicalDocuments,
    }
}

string_enum! {
    IdeaStatus, "idea status" {
        Proposed => "PROPOSED",
        Accepted => "ACCEPTED",
        Rejected => "REJECTED",
        Implemented => "IMPLEMENTED",
        Archived => "ARCHIVED",
    }
    legacy {}
}

string_enum! {
    IdeaPriority, "idea priority" {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
    legacy {}
}

string_enum! {
    RequirementType, "requirement type" {
        Business => "BUSINESS",
        Stakeholder => "STAKEHOLDER",
        Functional => "FUNCTIONAL",
        NonFunctional => "NON_FUNCTIONAL",
        System => "SYSTEM",
        Transition => "TRANSITION",
        Interface => "INTERFACE",
        User => "USER",
        Regulatory => "REGULATORY",
        Operational => "OPERATIONAL",
        Security => "SECURITY",
        Performance => "PERFORMANCE",
    }
    legacy {
        "CONSTRAINT" => Functional,
    }
}

string_enum! {
    RequirementStatus, "requirement status" {
        Draft => "DRAFT",
        Review => "REVIEW",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Implemented => "IMPLEMENTED",
        Archived => "ARCHIVED",
        Deprecated => "DEPRECATED",
    }
    legacy {}
}

string_enum! {
    ChangeRequestStatus, "change request status" {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Implemented => "IMPLEMENTED",
        Archived => "ARCHIVED",
    }
    legacy {}
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl Default for IdeaStatus {
    fn default() -> Self {
        Self::Proposed
    }
}

impl Default for IdeaPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Default for RequirementStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl Default for ChangeRequestStatus {
    fn default() -> Self {
        Self::Pending
    }
}

fn default_requirement_priority() -> u8 {
    3
}

// ─── Records ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stakeholder {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub stakeholder_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    pub id: Uuid,
    pub project_id: Uuid,
    pub stakeholder_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub conflicts: Option<String>,
    #[serde(default)]
    pub dependencies: Option<String>,
    pub category: String,
    #[serde(default)]
    pub status: IdeaStatus,
    #[serde(default)]
    pub priority: IdeaPriority,
    #[serde(default)]
    pub impact: Option<u8>,
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub effort: Option<u8>,
    #[serde(default)]
    pub ice_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Idea {
    /// ICE = impact × confidence / effort. Zero when effort is missing or zero.
    pub fn compute_ice_score(&self) -> f32 {
        match self.effort {
            Some(effort) if effort > 0 => {
                let impact = f32::from(self.impact.unwrap_or(0));
                let confidence = f32::from(self.confidence.unwrap_or(0));
                impact * confidence / f32::from(effort)
            }
            _ => 0.0,
        }
    }

    pub fn refresh_ice_score(&mut self) {
        self.ice_score = Some(self.compute_ice_score());
    }

    /// Impact and confidence lie in 0..=10, effort in 1..=10.
    pub fn validate(&self) -> Result<(), EngineError> {
        check_range("idea impact", self.impact, 0..=10)?;
        check_range("idea confidence", self.confidence, 0..=10)?;
        check_range("idea effort", self.effort, 1..=10)
    }
}

fn check_range(
    field: &str,
    value: Option<u8>,
    range: RangeInclusive<u8>,
) -> Result<(), EngineError> {
    match value {
        Some(v) if !range.contains(&v) => Err(EngineError::InvalidInput(format!(
            "{field} must be between {} and {}, got {v}",
            range.start(),
            range.end()
        ))),
        _ => Ok(()),
    }
}

impl fmt::Display for Idea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Idea: {}", self.title.as_deref().unwrap_or("Untitled"))?;
        writeln!(f, "Category: {}", self.category)?;
        writeln!(f, "Status: {}, Priority: {}", self.status, self.priority)?;
        if let Some(score) = self.ice_score {
            writeln!(f, "ICE Score: {score:.2}")?;
        }
        if let Some(desc) = &self.description {
            writeln!(f, "Description: {desc}")?;
        }
        if let Some(deps) = &self.dependencies {
            writeln!(f, "Dependencies: {deps}")?;
        }
        if let Some(conflicts) = &self.conflicts {
            writeln!(f, "Conflicts: {conflicts}")?;
        }
        Ok(())
    }
}

/// A requirement is a stable identity; its content lives in versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(default)]
    pub current_version_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementVersion {
    pub id: Uuid,
    pub requirement_id: Uuid,
    pub stakeholder_id: Uuid,
    pub version_number: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub conflicts: Option<String>,
    #[serde(default)]
    pub dependencies: Option<String>,
    pub category: String,
    #[serde(rename = "type")]
    pub req_type: RequirementType,
    #[serde(default)]
    pub status: RequirementStatus,
    #[serde(default = "default_requirement_priority")]
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl RequirementVersion {
    pub fn validate(&self) -> Result<(), EngineError> {
        check_range("requirement priority", Some(self.priority), 1..=5)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: Uuid,
    pub requirement_id: Uuid,
    pub stakeholder_id: Uuid,
    #[serde(default)]
    pub status: ChangeRequestStatus,
    pub base_version_id: Uuid,
    #[serde(default)]
    pub next_version_id: Option<Uuid>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub benefit: Option<String>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Records that can carry an embedding. Records without one never take part
/// in similarity search.
pub trait Embedded {
    fn embedding(&self) -> Option<&[f32]>;

    fn set_embedding(&mut self, embedding: Vec<f32>);

    /// Text that represents the record when it is embedded.
    fn embedding_text(&self) -> String;
}

fn join_present(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

impl Embedded for Project {
    fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = Some(embedding);
    }

    fn embedding_text(&self) -> String {
        join_present(&[self.title.as_deref(), self.description.as_deref()])
    }
}

impl Embedded for Stakeholder {
    fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = Some(embedding);
    }

    fn embedding_text(&self) -> String {
        join_present(&[Some(self.name.as_str()), Some(self.role.as_str())])
    }
}

impl Embedded for Document {
    fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = Some(embedding);
    }

    fn embedding_text(&self) -> String {
        join_present(&[self.title.as_deref(), self.text.as_deref()])
    }
}

impl Embedded for Idea {
    fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = Some(embedding);
    }

    fn embedding_text(&self) -> String {
        join_present(&[
            self.title.as_deref(),
            self.description.as_deref(),
            Some(self.category.as_str()),
        ])
    }
}

impl Embedded for RequirementVersion {
    fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = Some(embedding);
    }

    fn embedding_text(&self) -> String {
        join_present(&[
            self.title.as_deref(),
            self.description.as_deref(),
            Some(self.category.as_str()),
        ])
    }
}

impl Embedded for ChangeRequest {
    fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = Some(embedding);
    }

    fn embedding_text(&self) -> String {
        join_present(&[
            self.title.as_deref(),
            Some(self.summary.as_str()),
            self.benefit.as_deref(),
        ])
    }
}

/// Any record accepted by the ingestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Project(Project),
    Stakeholder(Stakeholder),
    Document(Document),
    Idea(Idea),
    Requirement(Requirement),
    RequirementVersion(RequirementVersion),
    ChangeRequest(ChangeRequest),
}

impl Record {
    pub fn id(&self) -> Uuid {
        match self {
            Record::Project(r) => r.id,
            Record::Stakeholder(r) => r.id,
            Record::Document(r) => r.id,
            Record::Idea(r) => r.id,
            Record::Requirement(r) => r.id,
            Record::RequirementVersion(r) => r.id,
            Record::ChangeRequest(r) => r.id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Record::Project(_) => "project",
            Record::Stakeholder(_) => "stakeholder",
            Record::Document(_) => "document",
            Record::Idea(_) => "idea",
            Record::Requirement(_) => "requirement",
            Record::RequirementVersion(_) => "requirement_version",
            Record::ChangeRequest(_) => "change_request",
        }
    }

    /// Range checks that serde cannot express.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            Record::Idea(r) => r.validate(),
            Record::RequirementVersion(r) => r.validate(),
            _ => Ok(()),
        }
    }

    /// The embeddable part of the record. Requirements themselves carry no
    /// text; their versions do.
    pub fn embeddable_mut(&mut self) -> Option<&mut dyn Embedded> {
        match self {
            Record::Project(r) => Some(r),
            Record::Stakeholder(r) => Some(r),
            Record::Document(r) => Some(r),
            Record::Idea(r) => Some(r),
            Record::Requirement(_) => None,
            Record::RequirementVersion(r) => Some(r),
            Record::ChangeRequest(r) => Some(r),
        }
    }
}

// ─── API types ───────────────────────────────────────────

/// Search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// Free-text answer to a search question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchAnswer {
    pub query: String,
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateIdeasRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequirementsRequest {
    pub idea_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateChangeRequestRequest {
    pub requirement_id: Uuid,
    pub base_version_id: Uuid,
    pub next_version_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub kind: &'static str,
    pub id: Uuid,
    pub embedded: bool,
}

/// Record counts per table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub projects: usize,
    pub stakeholders: usize,
    pub documents: usize,
    pub ideas: usize,
    pub requirements: usize,
    pub requirement_versions: usize,
    pub change_requests: usize,
    /// Records of any kind that have an embedding
    pub embedded: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_type_strict_parse() {
        assert_eq!(
            "MEETING_NOTES".parse::<DocumentType>().unwrap(),
            DocumentType::MeetingNotes
        );
    }

    #[test]
    fn test_document_type_legacy_table() {
        assert_eq!(
            "SPECIFICATION".parse::<DocumentType>().unwrap(),
            DocumentType::RequirementsDocuments
        );
        assert_eq!(
            "EMAIL".parse::<DocumentType>().unwrap(),
            DocumentType::MeetingNotes
        );
        assert_eq!(
            "OTHER".parse::<DocumentType>().unwrap(),
            DocumentType::TechnicalDocuments
        );
    }

    #[test]
    fn test_unknown_document_type_is_rejected_not_defaulted() {
        let err = "MEMO".parse::<DocumentType>().unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidEnumValue { field: "document type", .. }
        ));
    }

    #[test]
    fn test_requirement_type_constraint_maps_to_functional() {
        let t: RequirementType = serde_json::from_str("\"CONSTRAINT\"").unwrap();
        assert_eq!(t, RequirementType::Functional);
    }

    #[test]
    fn test_status_has_no_legacy_fallback() {
        assert!("DONE".parse::<RequirementStatus>().is_err());
        assert!(serde_json::from_str::<IdeaPriority>("\"URGENT\"").is_err());
    }

    #[test]
    fn test_enum_serializes_as_screaming_snake() {
        let json = serde_json::to_value(RequirementType::NonFunctional).unwrap();
        assert_eq!(json, "NON_FUNCTIONAL");
    }

    fn idea(impact: Option<u8>, confidence: Option<u8>, effort: Option<u8>) -> Idea {
        Idea {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            stakeholder_id: Uuid::new_v4(),
            title: Some("Offline mode".into()),
            description: None,
            conflicts: None,
            dependencies: None,
            category: "mobile".into(),
            status: IdeaStatus::default(),
            priority: IdeaPriority::default(),
            impact,
            confidence,
            effort,
            ice_score: None,
            embedding: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_ice_score() {
        assert_eq!(idea(Some(8), Some(5), Some(4)).compute_ice_score(), 10.0);
        assert_eq!(idea(Some(8), Some(5), None).compute_ice_score(), 0.0);
        assert_eq!(idea(Some(8), Some(5), Some(0)).compute_ice_score(), 0.0);
    }

    #[test]
    fn test_idea_ranges() {
        assert!(idea(Some(10), Some(0), Some(1)).validate().is_ok());
        assert!(idea(None, None, None).validate().is_ok());

        let err = idea(Some(5), Some(5), Some(0)).validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(ref m) if m.contains("effort")));
        let err = idea(Some(11), Some(5), Some(3)).validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(ref m) if m.contains("impact")));
        assert!(idea(Some(5), Some(12), Some(3)).validate().is_err());
        assert!(idea(Some(5), Some(5), Some(11)).validate().is_err());
    }

    #[test]
    fn test_requirement_priority_range() {
        let json = |priority: u8| {
            serde_json::json!({
                "kind": "requirement_version",
                "id": Uuid::new_v4(),
                "requirement_id": Uuid::new_v4(),
                "stakeholder_id": Uuid::new_v4(),
                "version_number": 1,
                "category": "core",
                "type": "FUNCTIONAL",
                "priority": priority,
            })
        };
        let ok: Record = serde_json::from_value(json(5)).unwrap();
        assert!(ok.validate().is_ok());
        for bad in [0, 6] {
            let record: Record = serde_json::from_value(json(bad)).unwrap();
            assert!(record.validate().is_err());
        }
    }

    #[test]
    fn test_record_tagged_deserialization() {
        let json = serde_json::json!({
            "kind": "document",
            "id": Uuid::new_v4(),
            "project_id": Uuid::new_v4(),
            "type": "REPORT",
            "title": "Q3 status",
            "text": "Rollout is on track."
        });
        let record: Record = serde_json::from_value(json).unwrap();
        match record {
            Record::Document(doc) => {
                assert_eq!(doc.doc_type, DocumentType::ManagementReports);
                assert!(doc.embedding.is_none());
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_embedding_text_skips_missing_fields() {
        let mut i = idea(None, None, None);
        i.description = Some("Cache tiles locally".into());
        assert_eq!(i.embedding_text(), "Offline mode Cache tiles locally mobile");
    }
}
