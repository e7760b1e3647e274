use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{EngineError, Result, Stage};
use crate::llm::Embedder;
use crate::models::{EntityKind, RequirementVersion};
use crate::search::hit::{pack, sort_by_score, Hit, RequirementMatch};
use crate::search::metric::DistanceMetric;
use crate::search::source::{SimilaritySource, SourceSet};

/// Anything that turns one query into a score-sorted hit list.
#[async_trait]
pub trait HitSource: Send + Sync {
    async fn retrieve(&self, query: &str, top_k_per_type: usize) -> Result<Vec<Hit>>;
}

/// Fans one query out to all six similarity sources and merges the results.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    sources: SourceSet,
    metric: DistanceMetric,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, sources: SourceSet, metric: DistanceMetric) -> Self {
        Self {
            embedder,
            sources,
            metric,
        }
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let vectors = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| EngineError::upstream(Stage::Embedding, e))?;
        vectors.into_iter().next().ok_or_else(|| {
            EngineError::upstream(Stage::Embedding, anyhow::anyhow!("No embedding returned"))
        })
    }

    /// Search every source with an already-embedded query.
    ///
    /// The six searches run concurrently; hits are concatenated in the fixed
    /// order Project, Document, Idea, ChangeRequest, Stakeholder, Requirement
    /// before the stable score sort, so equal scores keep that order.
    pub async fn retrieve_by_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<Hit>> {
        let metric = self.metric;
        let s = &self.sources;

        let (projects, documents, ideas, change_requests, stakeholders, versions) = tokio::try_join!(
            search(&*s.projects, vector, top_k, metric, EntityKind::Project),
            search(&*s.documents, vector, top_k, metric, EntityKind::Document),
            search(&*s.ideas, vector, top_k, metric, EntityKind::Idea),
            search(&*s.change_requests, vector, top_k, metric, EntityKind::ChangeRequest),
            search(&*s.stakeholders, vector, top_k, metric, EntityKind::Stakeholder),
            search(&*s.requirement_versions, vector, top_k, metric, EntityKind::Requirement),
        )?;

        let requirements = self.resolve_versions(versions).await?;

        let mut hits = Vec::new();
        hits.extend(pack(projects, top_k, metric));
        hits.extend(pack(documents, top_k, metric));
        hits.extend(pack(ideas, top_k, metric));
        hits.extend(pack(change_requests, top_k, metric));
        hits.extend(pack(stakeholders, top_k, metric));
        hits.extend(pack(requirements, top_k, metric));

        sort_by_score(&mut hits);
        Ok(hits)
    }

    /// Project each matched version onto its owning requirement. A version
    /// whose requirement cannot be found is kept as-is.
    async fn resolve_versions(
        &self,
        versions: Vec<(RequirementVersion, f32)>,
    ) -> Result<Vec<(RequirementMatch, f32)>> {
        let mut out = Vec::with_capacity(versions.len());
        for (version, distance) in versions {
            let requirement = self
                .sources
                .requirements
                .requirement_for(&version)
                .await
                .map_err(|e| EngineError::upstream(Stage::RequirementLookup, e))?;
            if requirement.is_none() {
                tracing::warn!(
                    "Requirement version {} has no resolvable requirement {}; keeping the version",
                    version.id,
                    version.requirement_id
                );
            }
            out.push((
                RequirementMatch {
                    requirement,
                    version,
                },
                distance,
            ));
        }
        Ok(out)
    }
}

#[async_trait]
impl HitSource for Retriever {
    async fn retrieve(&self, query: &str, top_k_per_type: usize) -> Result<Vec<Hit>> {
        let vector = self.embed_query(query).await?;
        let hits = self.retrieve_by_vector(&vector, top_k_per_type).await?;
        tracing::debug!("Retrieved {} hits for {query:?}", hits.len());
        Ok(hits)
    }
}

async fn search<R>(
    source: &dyn SimilaritySource<R>,
    vector: &[f32],
    limit: usize,
    metric: DistanceMetric,
    kind: EntityKind,
) -> Result<Vec<(R, f32)>> {
    source
        .search_similar(vector, limit, metric)
        .await
        .map_err(|e| EngineError::upstream(Stage::SimilaritySearch(kind), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ChangeRequest, Document, Embedded, Idea, Project, Record, Requirement, Stakeholder,
    };
    use crate::search::hit::fixtures::*;
    use crate::search::hit::HitData;
    use crate::search::source::RequirementResolver;
    use crate::search::store::KnowledgeStore;

    /// Returns the same vector for every text.
    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    /// Serves canned rows regardless of the query vector.
    struct Canned<R>(Vec<(R, f32)>);

    #[async_trait]
    impl<R: Clone + Send + Sync> SimilaritySource<R> for Canned<R> {
        async fn search_similar(
            &self,
            _vector: &[f32],
            limit: usize,
            _metric: DistanceMetric,
        ) -> anyhow::Result<Vec<(R, f32)>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl SimilaritySource<Idea> for Failing {
        async fn search_similar(
            &self,
            _vector: &[f32],
            _limit: usize,
            _metric: DistanceMetric,
        ) -> anyhow::Result<Vec<(Idea, f32)>> {
            anyhow::bail!("index offline")
        }
    }

    struct NoRequirements;

    #[async_trait]
    impl RequirementResolver for NoRequirements {
        async fn requirement_for(
            &self,
            _version: &RequirementVersion,
        ) -> anyhow::Result<Option<Requirement>> {
            Ok(None)
        }
    }

    fn empty_sources() -> SourceSet {
        SourceSet {
            projects: Arc::new(Canned::<Project>(Vec::new())),
            stakeholders: Arc::new(Canned::<Stakeholder>(Vec::new())),
            documents: Arc::new(Canned::<Document>(Vec::new())),
            ideas: Arc::new(Canned::<Idea>(Vec::new())),
            requirement_versions: Arc::new(Canned::<RequirementVersion>(Vec::new())),
            change_requests: Arc::new(Canned::<ChangeRequest>(Vec::new())),
            requirements: Arc::new(NoRequirements),
        }
    }

    fn retriever(sources: SourceSet) -> Retriever {
        Retriever::new(
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            sources,
            DistanceMetric::Cosine,
        )
    }

    #[tokio::test]
    async fn test_single_query_six_sources_ordering() {
        let d1 = document("d1", "first");
        let d2 = document("d2", "second");
        let i1 = idea("i1");
        let mut sources = empty_sources();
        sources.documents = Arc::new(Canned(vec![(d1.clone(), 0.1), (d2.clone(), 0.3)]));
        sources.ideas = Arc::new(Canned(vec![(i1.clone(), 0.05)]));

        let hits = retriever(sources).retrieve("rollout constraints", 5).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![i1.id, d1.id, d2.id]);
        assert!((hits[0].score - 0.952).abs() < 1e-3);
        assert!((hits[1].score - 0.909).abs() < 1e-3);
        assert!((hits[2].score - 0.769).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_output_is_sorted_descending() {
        let mut sources = empty_sources();
        sources.projects = Arc::new(Canned(vec![(project("p"), 0.4)]));
        sources.stakeholders = Arc::new(Canned(vec![(stakeholder("Ana", "PM"), 0.02)]));
        sources.change_requests = Arc::new(Canned(vec![(change_request("swap db"), 0.2)]));
        sources.documents = Arc::new(Canned(vec![
            (document("a", "x"), 0.15),
            (document("b", "y"), 0.9),
        ]));

        let hits = retriever(sources).retrieve("anything at all", 5).await.unwrap();
        assert_eq!(hits.len(), 5);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_equal_scores_keep_source_order() {
        let p = project("p");
        let d = document("d", "t");
        let s = stakeholder("Ana", "PM");
        let mut sources = empty_sources();
        sources.stakeholders = Arc::new(Canned(vec![(s.clone(), 0.2)]));
        sources.documents = Arc::new(Canned(vec![(d.clone(), 0.2)]));
        sources.projects = Arc::new(Canned(vec![(p.clone(), 0.2)]));

        let hits = retriever(sources).retrieve("tie breaking", 5).await.unwrap();
        let kinds: Vec<_> = hits.iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![EntityKind::Project, EntityKind::Document, EntityKind::Stakeholder]
        );
    }

    #[tokio::test]
    async fn test_empty_sources_yield_no_hits() {
        let hits = retriever(empty_sources()).retrieve("nothing here", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_is_upstream_error() {
        let mut sources = empty_sources();
        sources.ideas = Arc::new(Failing);
        let err = retriever(sources).retrieve("boom", 5).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Upstream {
                stage: Stage::SimilaritySearch(EntityKind::Idea),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_requirement_versions_resolve_through_store() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let mut req = requirement();
        let mut ver = version(req.id, "export csv");
        ver.set_embedding(vec![1.0, 0.0]);
        req.current_version_id = Some(ver.id);
        let mut orphan = version(uuid::Uuid::new_v4(), "orphaned");
        orphan.set_embedding(vec![0.9, 0.1]);
        store.upsert(Record::Requirement(req.clone())).unwrap();
        store.upsert(Record::RequirementVersion(ver.clone())).unwrap();
        store.upsert(Record::RequirementVersion(orphan.clone())).unwrap();

        let hits = retriever(SourceSet::from_backend(store))
            .retrieve("csv export", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, req.id);
        assert_eq!(hits[1].id, orphan.id);
        match &hits[1].data {
            HitData::Requirement(m) => assert!(!m.is_resolved()),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_superseded_versions_do_not_crowd_out_requirements() {
        let store = Arc::new(KnowledgeStore::in_memory());
        let mut r1 = requirement();
        let mut old = version(r1.id, "old text");
        old.set_embedding(vec![1.0, 0.0]);
        let mut current = version(r1.id, "current text");
        current.version_number = 2;
        current.set_embedding(vec![0.95, 0.05]);
        r1.current_version_id = Some(current.id);

        let mut r2 = requirement();
        let mut v3 = version(r2.id, "r2 text");
        v3.set_embedding(vec![0.8, 0.2]);
        r2.current_version_id = Some(v3.id);

        for r in [
            Record::Requirement(r1.clone()),
            Record::Requirement(r2.clone()),
            Record::RequirementVersion(old),
            Record::RequirementVersion(current.clone()),
            Record::RequirementVersion(v3.clone()),
        ] {
            store.upsert(r).unwrap();
        }

        let hits = retriever(SourceSet::from_backend(store))
            .retrieve("q", 2)
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![r1.id, r2.id]);
        match &hits[0].data {
            HitData::Requirement(m) => {
                assert_eq!(m.version.id, current.id);
                assert_eq!(m.version.title.as_deref(), Some("current text"));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_per_type_limit_applies() {
        let docs: Vec<(Document, f32)> = (0..8)
            .map(|i| (document(&format!("d{i}"), "t"), i as f32 * 0.1))
            .collect();
        let mut sources = empty_sources();
        sources.documents = Arc::new(Canned(docs));
        let hits = retriever(sources).retrieve("limit check", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
    }
}
