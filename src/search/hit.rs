use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    ChangeRequest, Document, EntityKind, Idea, Project, Requirement, RequirementVersion,
    Stakeholder,
};
use crate::search::metric::DistanceMetric;

/// A requirement version matched by similarity search, together with the
/// requirement that owns it when that could be resolved.
#[derive(Debug, Clone, Serialize)]
pub struct RequirementMatch {
    pub requirement: Option<Requirement>,
    pub version: RequirementVersion,
}

impl RequirementMatch {
    /// Identity of the hit: the owning requirement, or the version itself when
    /// the back-reference could not be resolved.
    pub fn id(&self) -> Uuid {
        self.requirement
            .as_ref()
            .map_or(self.version.id, |r| r.id)
    }

    pub fn is_resolved(&self) -> bool {
        self.requirement.is_some()
    }
}

/// Point-in-time snapshot of the matched record. Embeddings are stripped.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HitData {
    Project(Project),
    Stakeholder(Stakeholder),
    Document(Document),
    Idea(Idea),
    Requirement(RequirementMatch),
    ChangeRequest(ChangeRequest),
}

impl HitData {
    pub fn kind(&self) -> EntityKind {
        match self {
            HitData::Project(_) => EntityKind::Project,
            HitData::Stakeholder(_) => EntityKind::Stakeholder,
            HitData::Document(_) => EntityKind::Document,
            HitData::Idea(_) => EntityKind::Idea,
            HitData::Requirement(_) => EntityKind::Requirement,
            HitData::ChangeRequest(_) => EntityKind::ChangeRequest,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            HitData::Project(r) => r.id,
            HitData::Stakeholder(r) => r.id,
            HitData::Document(r) => r.id,
            HitData::Idea(r) => r.id,
            HitData::Requirement(m) => m.id(),
            HitData::ChangeRequest(r) => r.id,
        }
    }

    fn strip_embedding(&mut self) {
        match self {
            HitData::Project(r) => r.embedding = None,
            HitData::Stakeholder(r) => r.embedding = None,
            HitData::Document(r) => r.embedding = None,
            HitData::Idea(r) => r.embedding = None,
            HitData::Requirement(m) => m.version.embedding = None,
            HitData::ChangeRequest(r) => r.embedding = None,
        }
    }
}

impl From<Project> for HitData {
    fn from(r: Project) -> Self {
        HitData::Project(r)
    }
}

impl From<Stakeholder> for HitData {
    fn from(r: Stakeholder) -> Self {
        HitData::Stakeholder(r)
    }
}

impl From<Document> for HitData {
    fn from(r: Document) -> Self {
        HitData::Document(r)
    }
}

impl From<Idea> for HitData {
    fn from(r: Idea) -> Self {
        HitData::Idea(r)
    }
}

impl From<RequirementMatch> for HitData {
    fn from(m: RequirementMatch) -> Self {
        HitData::Requirement(m)
    }
}

impl From<ChangeRequest> for HitData {
    fn from(r: ChangeRequest) -> Self {
        HitData::ChangeRequest(r)
    }
}

/// A single ranked retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub kind: EntityKind,
    pub id: Uuid,
    pub distance: f32,
    pub score: f32,
    pub data: HitData,
}

impl Hit {
    pub fn new(data: impl Into<HitData>, distance: f32, metric: DistanceMetric) -> Self {
        let mut data = data.into();
        data.strip_embedding();
        Self {
            kind: data.kind(),
            id: data.id(),
            distance,
            score: metric.normalize(distance),
            data,
        }
    }

    /// Key used for cross-query deduplication.
    pub fn key(&self) -> (EntityKind, Uuid) {
        (self.kind, self.id)
    }
}

/// Wrap the first `top_k` rows (already ascending by distance) into hits,
/// scoring them with the metric the rows were searched with.
pub fn pack<R: Into<HitData>>(
    rows: Vec<(R, f32)>,
    top_k: usize,
    metric: DistanceMetric,
) -> Vec<Hit> {
    rows.into_iter()
        .take(top_k)
        .map(|(record, distance)| Hit::new(record, distance, metric))
        .collect()
}

/// Stable sort by score descending; equal scores keep insertion order.
pub fn sort_by_score(hits: &mut [Hit]) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
}
