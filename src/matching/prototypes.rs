use std::collections::BTreeMap;

use super::MatchError;
use crate::{
    db::models::{ClassPrototype, ReferenceRecord},
    vision::FeatureVector,
};

/// Averages the vectors of each label into one prototype, sorted by label.
///
/// All records must share one dimension; the first record sets it.
pub fn build_prototypes(corpus: &[ReferenceRecord]) -> Result<Vec<ClassPrototype>, MatchError> {
    let Some(first) = corpus.first() else {
        return Ok(Vec::new());
    };
    let dim = first.vector.len();

    let mut sums: BTreeMap<&str, (Vec<f64>, u64)> = BTreeMap::new();
    for record in corpus {
        if record.vector.len() != dim {
            return Err(MatchError::DimensionMismatch {
                record_id: record.id,
                expected: dim,
                found: record.vector.len(),
            });
        }

        let (sum, count) = sums
            .entry(record.label.as_str())
            .or_insert_with(|| (vec![0.0; dim], 0));
        for (acc, value) in sum.iter_mut().zip(record.vector.as_slice()) {
            *acc += f64::from(*value);
        }
        *count += 1;
    }

    Ok(sums
        .into_iter()
        .map(|(label, (sum, count))| ClassPrototype {
            label: label.to_string(),
            vector: FeatureVector::new(sum.into_iter().map(|v| (v / count as f64) as f32).collect()),
            sample_count: count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, label: &str, values: Vec<f32>) -> ReferenceRecord {
        ReferenceRecord {
            id,
            label: label.to_string(),
            source_path: format!("{label}/{id}.jpg"),
            vector: FeatureVector::new(values),
        }
    }

    #[test]
    fn averages_per_label() {
        let corpus = vec![
            record(1, "library", vec![1.0, 0.0]),
            record(2, "gate", vec![0.0, 4.0]),
            record(3, "library", vec![3.0, 2.0]),
        ];

        let prototypes = build_prototypes(&corpus).unwrap();
        assert_eq!(prototypes.len(), 2);
        assert_eq!(prototypes[0].label, "gate");
        assert_eq!(prototypes[0].sample_count, 1);
        assert_eq!(prototypes[1].label, "library");
        assert_eq!(prototypes[1].sample_count, 2);
        assert_eq!(prototypes[1].vector.as_slice(), &[2.0, 1.0]);
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let corpus = vec![record(1, "a", vec![1.0]), record(2, "a", vec![1.0, 2.0])];
        assert!(matches!(
            build_prototypes(&corpus),
            Err(MatchError::DimensionMismatch { record_id: 2, .. })
        ));
        assert!(build_prototypes(&[]).unwrap().is_empty());
    }
}
