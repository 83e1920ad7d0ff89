pub mod backend;
pub mod decision;
pub mod prototypes;
pub mod service;
pub mod similarity;
pub mod wire;

pub use crate::db::models::{ClassPrototype, ReferenceRecord};
pub use backend::MatchingBackend;
pub use decision::{Classification, ClassificationPolicy, Confidence};
pub use prototypes::build_prototypes;
pub use service::{MatchError, MatchResult, MatchingService, ReferenceCorpus};
pub use similarity::SimilarityMetric;
pub use wire::{MatchRequest, MatchResponse, WireMatch};
