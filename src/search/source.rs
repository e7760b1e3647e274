use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    ChangeRequest, Document, Idea, Project, Requirement, RequirementVersion, Stakeholder,
};
use crate::search::metric::DistanceMetric;

/// Nearest-neighbour lookup over one record type.
///
/// Implementations return at most `limit` `(record, distance)` pairs ordered by
/// ascending distance, skipping records that have no embedding.
#[async_trait]
pub trait SimilaritySource<R>: Send + Sync {
    async fn search_similar(
        &self,
        vector: &[f32],
        limit: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<(R, f32)>>;
}

/// Resolves a requirement version to the requirement that owns it.
#[async_trait]
pub trait RequirementResolver: Send + Sync {
    async fn requirement_for(&self, version: &RequirementVersion) -> Result<Option<Requirement>>;
}

/// The six similarity sources the retriever fans out to.
#[derive(Clone)]
pub struct SourceSet {
    pub projects: Arc<dyn SimilaritySource<Project>>,
    pub stakeholders: Arc<dyn SimilaritySource<Stakeholder>>,
    pub documents: Arc<dyn SimilaritySource<Document>>,
    pub ideas: Arc<dyn SimilaritySource<Idea>>,
    pub requirement_versions: Arc<dyn SimilaritySource<RequirementVersion>>,
    pub change_requests: Arc<dyn SimilaritySource<ChangeRequest>>,
    pub requirements: Arc<dyn RequirementResolver>,
}

impl SourceSet {
    /// Use one backend for every record type.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: SimilaritySource<Project>
            + SimilaritySource<Stakeholder>
            + SimilaritySource<Document>
            + SimilaritySource<Idea>
            + SimilaritySource<RequirementVersion>
            + SimilaritySource<ChangeRequest>
            + RequirementResolver
            + 'static,
    {
        Self {
            projects: backend.clone(),
            stakeholders: backend.clone(),
            documents: backend.clone(),
            ideas: backend.clone(),
            requirement_versions: backend.clone(),
            change_requests: backend.clone(),
            requirements: backend,
        }
    }
}
