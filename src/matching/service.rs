use std::{cmp::Ordering, sync::Arc};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::SimilarityMetric;
use crate::{
    db::{
        models::{ClassPrototype, ReferenceRecord},
        Database,
    },
    vision::FeatureVector,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("reference record {record_id} has dimension {found}, query has {expected}")]
    DimensionMismatch {
        record_id: i64,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// 1-based, contiguous.
    pub rank: u32,
    pub label: String,
    pub similarity_score: f64,
    pub source_path: String,
}

/// Immutable snapshot of the reference corpus. Cloning shares the records.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCorpus {
    records: Arc<[ReferenceRecord]>,
}

impl ReferenceCorpus {
    pub fn new(records: Vec<ReferenceRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Loads every stored reference embedding, ordered by id.
    pub async fn load(db: &Database) -> Result<Self> {
        let records = db
            .load_reference_records()
            .await
            .context("failed to load reference corpus")?;
        Ok(Self::new(records))
    }

    /// Treats each prototype as a record so it can be ranked the same way.
    /// Ids follow the prototype order, starting at 1.
    pub fn from_prototypes(prototypes: &[ClassPrototype]) -> Self {
        let records = prototypes
            .iter()
            .zip(1i64..)
            .map(|(prototype, id)| ReferenceRecord {
                id,
                label: prototype.label.clone(),
                source_path: String::new(),
                vector: prototype.vector.clone(),
            })
            .collect();
        Self::new(records)
    }

    pub fn records(&self) -> &[ReferenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingService {
    metric: SimilarityMetric,
}

impl MatchingService {
    pub fn new(metric: SimilarityMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Ranks `corpus` against `query` and returns the best `k` matches.
    ///
    /// Scores are non-increasing; equal scores are ordered by ascending
    /// record id, so the output is deterministic. A single record whose
    /// dimension differs from the query fails the whole call.
    pub fn find_matches(
        &self,
        query: &FeatureVector,
        corpus: &[ReferenceRecord],
        k: usize,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let mut scored = self.score_all(query, corpus)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);

        Ok(scored
            .into_iter()
            .zip(1u32..)
            .map(|((score, record), rank)| MatchResult {
                rank,
                label: record.label.clone(),
                similarity_score: score,
                source_path: record.source_path.clone(),
            })
            .collect())
    }

    /// Scores every record, in corpus order.
    pub(crate) fn score_all<'a>(
        &self,
        query: &FeatureVector,
        corpus: &'a [ReferenceRecord],
    ) -> Result<Vec<(f64, &'a ReferenceRecord)>, MatchError> {
        let expected = query.len();
        corpus
            .iter()
            .map(|record| {
                if record.vector.len() != expected {
                    return Err(MatchError::DimensionMismatch {
                        record_id: record.id,
                        expected,
                        found: record.vector.len(),
                    });
                }
                Ok((
                    self.metric.score(query.as_slice(), record.vector.as_slice()),
                    record,
                ))
            })
            .collect()
    }
}

fn rank_order(a: &(f64, &ReferenceRecord), b: &(f64, &ReferenceRecord)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id))
}
