use crate::error::{TrainingError, TrainingResult};
use crate::records::{PoseRecord, RecordSet, Split};
use hourglass_config::SplitRatios;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// The three datasets a training run consumes. `validation` and `test` may be
/// empty; `train` never is.
#[derive(Debug, Clone, Default)]
pub struct SplitSets {
    pub train: RecordSet,
    pub validation: RecordSet,
    pub test: RecordSet,
}

impl SplitSets {
    #[must_use]
    pub fn has_validation(&self) -> bool {
        !self.validation.is_empty()
    }

    #[must_use]
    pub fn has_test(&self) -> bool {
        !self.test.is_empty()
    }
}

/// Assigns records to train/validation/test.
///
/// When any record carries an explicit split marker the declared assignment is
/// honored exactly (unmarked records default to train). Otherwise records are
/// split by ratio after an optional seeded shuffle, so the assignment is
/// deterministic for a fixed seed.
pub fn split_records(
    records: RecordSet,
    ratios: &SplitRatios,
    shuffle: bool,
    seed: u64,
) -> TrainingResult<SplitSets> {
    if records.is_empty() {
        return Err(TrainingError::Split("no records to split".to_string()));
    }

    let declared = records.iter().any(|r| r.split.is_some());
    let sets = if declared {
        let mut sets = SplitSets::default();
        for record in records {
            match record.split {
                Some(Split::Validation) => sets.validation.push(record),
                Some(Split::Test) => sets.test.push(record),
                Some(Split::Train) | None => sets.train.push(record),
            }
        }
        sets
    } else {
        split_by_ratio(records, ratios, shuffle, seed)
    };

    if sets.train.is_empty() {
        return Err(TrainingError::Split("train split is empty".to_string()));
    }
    debug!(
        train = sets.train.len(),
        validation = sets.validation.len(),
        test = sets.test.len(),
        "assigned records to splits"
    );
    Ok(sets)
}

fn split_by_ratio(mut records: Vec<PoseRecord>, ratios: &SplitRatios, shuffle: bool, seed: u64) -> SplitSets {
    if shuffle {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        records.shuffle(&mut rng);
    }

    let total = records.len();
    let validation_count = (total as f64 * ratios.validation).round() as usize;
    let test_count = (total as f64 * ratios.test).round() as usize;
    let train_count = total.saturating_sub(validation_count + test_count).max(1);

    let mut iter = records.into_iter();
    let train: Vec<_> = iter.by_ref().take(train_count).collect();
    let validation: Vec<_> = iter.by_ref().take(validation_count).collect();
    let test: Vec<_> = iter.collect();
    SplitSets { train, validation, test }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(n: usize, split: Option<Split>) -> PoseRecord {
        PoseRecord {
            image: PathBuf::from(format!("{n}.png")),
            joints: vec![[1.0, 1.0]],
            visible: vec![],
            split,
        }
    }

    fn ratios(train: f64, validation: f64, test: f64) -> SplitRatios {
        SplitRatios { train, validation, test }
    }

    #[test]
    fn test_declared_splits_are_honored_exactly() {
        let records = vec![
            record(0, Some(Split::Train)),
            record(1, Some(Split::Validation)),
            record(2, Some(Split::Test)),
            record(3, None),
        ];
        let sets = split_records(records, &ratios(0.5, 0.25, 0.25), true, 1).unwrap();
        assert_eq!(sets.train.len(), 2);
        assert_eq!(sets.validation.len(), 1);
        assert_eq!(sets.test.len(), 1);
    }

    #[test]
    fn test_ratio_split_is_deterministic_for_a_seed() {
        let records: Vec<_> = (0..20).map(|n| record(n, None)).collect();
        let a = split_records(records.clone(), &ratios(0.7, 0.2, 0.1), true, 9).unwrap();
        let b = split_records(records, &ratios(0.7, 0.2, 0.1), true, 9).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.validation, b.validation);
        assert_eq!(a.test, b.test);
        assert_eq!(a.train.len(), 14);
        assert_eq!(a.validation.len(), 4);
        assert_eq!(a.test.len(), 2);
    }

    #[test]
    fn test_train_split_never_empty() {
        let records = vec![record(0, None)];
        let sets = split_records(records, &ratios(0.4, 0.3, 0.3), false, 0).unwrap();
        assert_eq!(sets.train.len(), 1);
        assert!(!sets.has_validation());
        assert!(!sets.has_test());
    }

    #[test]
    fn test_empty_record_set_is_an_error() {
        assert!(split_records(Vec::new(), &SplitRatios::default(), false, 0).is_err());
    }
}
