use serde::{Deserialize, Serialize};

/// How two equal-length vectors are compared. Higher is always more similar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SimilarityMetric {
    /// Cosine of the angle between the vectors, in [-1, 1]. A zero-norm
    /// operand scores 0.0.
    #[default]
    Cosine,
    DotProduct,
    /// Euclidean distance, negated so larger means closer.
    NegativeEuclidean,
}

impl SimilarityMetric {
    /// Callers must pass equal-length slices; extra components are ignored.
    pub fn score(self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            SimilarityMetric::Cosine => cosine(a, b),
            SimilarityMetric::DotProduct => dot(a, b),
            SimilarityMetric::NegativeEuclidean => -euclidean(a, b),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
