use std::collections::{BTreeMap, HashSet};

use crate::error::Result;
use crate::llm::query_expand::SearchQuery;
use crate::models::EntityKind;
use crate::search::hit::{sort_by_score, Hit};
use crate::search::retriever::HitSource;

/// Merge the hits of several expanded queries into one deduplicated list.
///
/// Queries run in order. An entity's first occurrence is kept and any later
/// occurrence is dropped, even when a later query scored it higher. The
/// merged list is then stable-sorted by score. The seen-set lives only for
/// this call.
pub async fn aggregate_from_queries(
    source: &dyn HitSource,
    queries: &[SearchQuery],
    top_k_per_type: usize,
) -> Result<Vec<Hit>> {
    let mut seen: HashSet<(EntityKind, uuid::Uuid)> = HashSet::new();
    let mut merged: Vec<Hit> = Vec::new();

    for query in queries {
        let hits = source.retrieve(query.as_str(), top_k_per_type).await?;
        let before = merged.len();
        for hit in hits {
            if seen.insert(hit.key()) {
                merged.push(hit);
            }
        }
        tracing::debug!(
            "Query {:?} contributed {} new hits",
            query.as_str(),
            merged.len() - before
        );
    }

    sort_by_score(&mut merged);

    if !merged.is_empty() {
        tracing::info!(
            "Aggregated {} hits from {} queries ({})",
            merged.len(),
            queries.len(),
            describe_counts(&merged)
        );
    }

    Ok(merged)
}

/// Keep the `n` best hits of an already-sorted list.
pub fn cap(mut hits: Vec<Hit>, n: usize) -> Vec<Hit> {
    hits.truncate(n);
    hits
}

pub fn count_by_kind(hits: &[Hit]) -> BTreeMap<EntityKind, usize> {
    let mut counts = BTreeMap::new();
    for hit in hits {
        *counts.entry(hit.kind).or_insert(0) += 1;
    }
    counts
}

fn describe_counts(hits: &[Hit]) -> String {
    count_by_kind(hits)
        .into_iter()
        .map(|(kind, n)| format!("{kind}: {n}"))
        .collect::<Vec<_>>()
        .join(", ")
}
