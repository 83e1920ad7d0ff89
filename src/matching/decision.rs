//! Dual-threshold accept/reject decision on top of the raw ranking.
//!
//! A best score above `accept_above` is taken as is, and one below
//! `reject_below` is unknown. In between, the best score of each label is
//! compared: the top label is kept only if it is the sole candidate or beats
//! the runner-up label by more than `min_label_gap`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{MatchError, MatchingService};
use crate::{db::models::ReferenceRecord, vision::FeatureVector};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationPolicy {
    pub accept_above: f64,
    pub reject_below: f64,
    pub min_label_gap: f64,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            accept_above: 0.8,
            reject_below: 0.7,
            min_label_gap: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    High,
    MediumAccepted,
    MediumRejected,
    Low,
}

impl Confidence {
    pub fn is_accepted(self) -> bool {
        matches!(self, Confidence::High | Confidence::MediumAccepted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// `None` when the query is judged unknown.
    pub label: Option<String>,
    /// Best score over the whole corpus.
    pub similarity: f64,
    pub confidence: Confidence,
    pub reason: String,
}

impl MatchingService {
    pub fn classify(
        &self,
        query: &FeatureVector,
        corpus: &[ReferenceRecord],
        policy: &ClassificationPolicy,
    ) -> Result<Classification, MatchError> {
        let scored = self.score_all(query, corpus)?;

        let mut best_per_label: HashMap<&str, (f64, i64)> = HashMap::new();
        for (score, record) in &scored {
            let entry = best_per_label
                .entry(record.label.as_str())
                .or_insert((*score, record.id));
            if *score > entry.0 || (*score == entry.0 && record.id < entry.1) {
                *entry = (*score, record.id);
            }
        }

        let mut labels: Vec<(&str, f64, i64)> = best_per_label
            .into_iter()
            .map(|(label, (score, id))| (label, score, id))
            .collect();
        labels.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.2.cmp(&b.2)));

        let Some(&(best_label, best, _)) = labels.first() else {
            return Ok(Classification {
                label: None,
                similarity: 0.0,
                confidence: Confidence::Low,
                reason: "reference corpus is empty".into(),
            });
        };

        let classification = if best > policy.accept_above {
            Classification {
                label: Some(best_label.to_string()),
                similarity: best,
                confidence: Confidence::High,
                reason: format!("similarity {best:.4} > {}", policy.accept_above),
            }
        } else if best < policy.reject_below {
            Classification {
                label: None,
                similarity: best,
                confidence: Confidence::Low,
                reason: format!("similarity {best:.4} < {}", policy.reject_below),
            }
        } else if let Some(&(runner_up, second, _)) = labels.get(1) {
            let gap = best - second;
            if gap > policy.min_label_gap {
                Classification {
                    label: Some(best_label.to_string()),
                    similarity: best,
                    confidence: Confidence::MediumAccepted,
                    reason: format!(
                        "label gap {gap:.4} > {} ({best_label}={best:.4}, {runner_up}={second:.4})",
                        policy.min_label_gap
                    ),
                }
            } else {
                Classification {
                    label: None,
                    similarity: best,
                    confidence: Confidence::MediumRejected,
                    reason: format!(
                        "label gap {gap:.4} <= {} ({best_label}={best:.4}, {runner_up}={second:.4})",
                        policy.min_label_gap
                    ),
                }
            }
        } else {
            Classification {
                label: Some(best_label.to_string()),
                similarity: best,
                confidence: Confidence::MediumAccepted,
                reason: "only one candidate label".into(),
            }
        };

        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_cosine(id: i64, label: &str, cosine: f32) -> ReferenceRecord {
        ReferenceRecord {
            id,
            label: label.to_string(),
            source_path: String::new(),
            vector: FeatureVector::new(vec![cosine, (1.0 - cosine * cosine).sqrt()]),
        }
    }

    fn classify(corpus: &[ReferenceRecord]) -> Classification {
        MatchingService::default()
            .classify(
                &FeatureVector::new(vec![1.0, 0.0]),
                corpus,
                &ClassificationPolicy::default(),
            )
            .unwrap()
    }

    #[test]
    fn high_score_is_accepted_outright() {
        let result = classify(&[at_cosine(1, "hall", 0.95), at_cosine(2, "gate", 0.94)]);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.label.as_deref(), Some("hall"));
    }

    #[test]
    fn low_score_is_unknown() {
        let result = classify(&[at_cosine(1, "hall", 0.5)]);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.label, None);
        assert!((result.similarity - 0.5).abs() < 1e-5);
    }

    #[test]
    fn medium_score_with_single_label_is_accepted() {
        let result = classify(&[at_cosine(1, "hall", 0.75), at_cosine(2, "hall", 0.6)]);
        assert_eq!(result.confidence, Confidence::MediumAccepted);
        assert_eq!(result.label.as_deref(), Some("hall"));
    }

    #[test]
    fn medium_score_uses_label_gap() {
        let clear = classify(&[at_cosine(1, "hall", 0.78), at_cosine(2, "gate", 0.6)]);
        assert_eq!(clear.confidence, Confidence::MediumAccepted);
        assert_eq!(clear.label.as_deref(), Some("hall"));

        let close = classify(&[at_cosine(1, "hall", 0.78), at_cosine(2, "gate", 0.74)]);
        assert_eq!(close.confidence, Confidence::MediumRejected);
        assert_eq!(close.label, None);
        assert!(!close.confidence.is_accepted());
    }

    #[test]
    fn empty_corpus_is_unknown() {
        let result = classify(&[]);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.label, None);
    }
}
