//! Reference corpus data models.
//!
//! A reference record is one labeled embedding computed offline from a
//! known image. Prototypes are per-label means of those records.

use serde::{Deserialize, Serialize};

use crate::vision::FeatureVector;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRecord {
    /// Unique and stable; used to break score ties.
    pub id: i64,
    pub label: String,
    /// Image the embedding was computed from.
    pub source_path: String,
    pub vector: FeatureVector,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassPrototype {
    pub label: String,
    pub vector: FeatureVector,
    pub sample_count: u64,
}
