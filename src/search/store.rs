use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{
    ChangeRequest, Document, Embedded, Idea, Project, Record, Requirement, RequirementVersion,
    Stakeholder, StoreStats,
};
use crate::search::metric::DistanceMetric;
use crate::search::source::{RequirementResolver, SimilaritySource};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    stakeholders: Vec<Stakeholder>,
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    ideas: Vec<Idea>,
    #[serde(default)]
    requirements: Vec<Requirement>,
    #[serde(default)]
    requirement_versions: Vec<RequirementVersion>,
    #[serde(default)]
    change_requests: Vec<ChangeRequest>,
}

/// In-memory knowledge base with JSON persistence and brute-force
/// nearest-neighbour search over each record table.
pub struct KnowledgeStore {
    tables: RwLock<Tables>,
    persist_path: Option<PathBuf>,
}

impl KnowledgeStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            persist_path: None,
        }
    }

    pub fn open_or_create(persist_path: &Path) -> Result<Self> {
        if let Some(parent) = persist_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tables = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path)
                .context("Failed to read knowledge store")?;
            serde_json::from_str(&data).context("Failed to parse knowledge store")?
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            persist_path: Some(persist_path.to_path_buf()),
        })
    }

    /// Validate, insert or replace a record by id, then persist.
    pub fn upsert(&self, record: Record) -> Result<()> {
        record.validate()?;
        {
            let mut tables = self.tables.write();
            match record {
                Record::Project(r) => replace_or_push(&mut tables.projects, r, |x| x.id),
                Record::Stakeholder(r) => replace_or_push(&mut tables.stakeholders, r, |x| x.id),
                Record::Document(r) => replace_or_push(&mut tables.documents, r, |x| x.id),
                Record::Idea(mut r) => {
                    r.refresh_ice_score();
                    replace_or_push(&mut tables.ideas, r, |x| x.id)
                }
                Record::Requirement(r) => replace_or_push(&mut tables.requirements, r, |x| x.id),
                Record::RequirementVersion(r) => {
                    replace_or_push(&mut tables.requirement_versions, r, |x| x.id)
                }
                Record::ChangeRequest(r) => {
                    replace_or_push(&mut tables.change_requests, r, |x| x.id)
                }
            }
        }
        self.persist()
    }

    /// Write the store to disk (atomic write via temp file + rename).
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let data = {
            let tables = self.tables.read();
            serde_json::to_string(&*tables)?
        };
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data).context("Failed to write knowledge store")?;
        std::fs::rename(&tmp_path, path).context("Failed to replace knowledge store")?;
        Ok(())
    }

    pub fn ideas_by_ids(&self, ids: &[Uuid]) -> Vec<Idea> {
        let tables = self.tables.read();
        ids.iter()
            .filter_map(|id| tables.ideas.iter().find(|i| &i.id == id).cloned())
            .collect()
    }

    pub fn requirement(&self, id: Uuid) -> Option<Requirement> {
        self.tables
            .read()
            .requirements
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn requirement_version(&self, id: Uuid) -> Option<RequirementVersion> {
        self.tables
            .read()
            .requirement_versions
            .iter()
            .find(|v| v.id == id)
            .cloned()
    }

    pub fn stats(&self) -> StoreStats {
        let t = self.tables.read();
        let embedded = count_embedded(&t.projects)
            + count_embedded(&t.stakeholders)
            + count_embedded(&t.documents)
            + count_embedded(&t.ideas)
            + count_embedded(&t.requirement_versions)
            + count_embedded(&t.change_requests);
        StoreStats {
            projects: t.projects.len(),
            stakeholders: t.stakeholders.len(),
            documents: t.documents.len(),
            ideas: t.ideas.len(),
            requirements: t.requirements.len(),
            requirement_versions: t.requirement_versions.len(),
            change_requests: t.change_requests.len(),
            embedded,
        }
    }
}

fn replace_or_push<T>(table: &mut Vec<T>, record: T, id_of: impl Fn(&T) -> Uuid) {
    let id = id_of(&record);
    match table.iter_mut().find(|existing| id_of(existing) == id) {
        Some(slot) => *slot = record,
        None => table.push(record),
    }
}

fn count_embedded<R: Embedded>(records: &[R]) -> usize {
    records.iter().filter(|r| r.embedding().is_some()).count()
}

/// Brute-force k-nearest records, ascending by distance. Records without an
/// embedding or with a mismatched dimension are skipped.
fn nearest<'a, R: Embedded + Clone + 'a>(
    records: impl IntoIterator<Item = &'a R>,
    vector: &[f32],
    limit: usize,
    metric: DistanceMetric,
) -> Vec<(R, f32)> {
    let mut scored: Vec<(f32, &R)> = records
        .into_iter()
        .filter_map(|r| {
            let embedding = r.embedding()?;
            metric.distance(vector, embedding).map(|d| (d, r))
        })
        .collect();

    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(distance, r)| (r.clone(), distance))
        .collect()
}

macro_rules! similarity_source {
    ($record:ty, $table:ident) => {
        #[async_trait]
        impl SimilaritySource<$record> for KnowledgeStore {
            async fn search_similar(
                &self,
                vector: &[f32],
                limit: usize,
                metric: DistanceMetric,
            ) -> Result<Vec<($record, f32)>> {
                Ok(nearest(&self.tables.read().$table, vector, limit, metric))
            }
        }
    };
}

similarity_source!(Project, projects);
similarity_source!(Stakeholder, stakeholders);
similarity_source!(Document, documents);
similarity_source!(Idea, ideas);
similarity_source!(ChangeRequest, change_requests);

/// Only the current version of each requirement is searchable. Versions whose
/// requirement is not stored are kept so the retriever can report them.
#[async_trait]
impl SimilaritySource<RequirementVersion> for KnowledgeStore {
    async fn search_similar(
        &self,
        vector: &[f32],
        limit: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<(RequirementVersion, f32)>> {
        let tables = self.tables.read();
        let current: HashMap<Uuid, Option<Uuid>> = tables
            .requirements
            .iter()
            .map(|r| (r.id, r.current_version_id))
            .collect();
        let searchable = tables
            .requirement_versions
            .iter()
            .filter(|v| match current.get(&v.requirement_id) {
                Some(current_id) => *current_id == Some(v.id),
                None => true,
            });
        Ok(nearest(searchable, vector, limit, metric))
    }
}

#[async_trait]
impl RequirementResolver for KnowledgeStore {
    async fn requirement_for(&self, version: &RequirementVersion) -> Result<Option<Requirement>> {
        Ok(self.requirement(version.requirement_id))
    }
}
