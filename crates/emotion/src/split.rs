use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::record::DatasetRecord;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<DatasetRecord>,
    pub test: Vec<DatasetRecord>,
}

/// Train/test split that keeps each emotion's share in both halves.
///
/// Every label with at least two records contributes at least one test
/// record and keeps at least one for training.
pub fn stratified_split(records: &[DatasetRecord], test_ratio: f64, seed: u64) -> Result<Split> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(Error::Dataset(format!("test ratio {test_ratio} outside (0, 1)")));
    }
    if records.is_empty() {
        return Err(Error::NotEnoughData("cannot split an empty dataset".into()));
    }

    let mut groups: BTreeMap<&str, Vec<&DatasetRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.emotion.as_str()).or_default().push(record);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for members in groups.values_mut() {
        members.shuffle(&mut rng);
        let n = members.len();
        let n_test = if n < 2 {
            0
        } else {
            ((n as f64 * test_ratio).round() as usize).clamp(1, n - 1)
        };
        test.extend(members[..n_test].iter().map(|r| (*r).clone()));
        train.extend(members[n_test..].iter().map(|r| (*r).clone()));
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    info!(train = train.len(), test = test.len(), test_ratio, "dataset split");
    Ok(Split { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn corpus() -> Vec<DatasetRecord> {
        let mut records = Vec::new();
        for (emotion, count) in [("happy", 20), ("sad", 10)] {
            for i in 0..count {
                let tokens = vec![format!("4-{i}")];
                records.push(DatasetRecord::new(&tokens, "minor", emotion));
            }
        }
        records
    }

    #[test]
    fn proportions_per_label() {
        let split = stratified_split(&corpus(), 0.2, 42).unwrap();
        assert_eq!(split.train.len() + split.test.len(), 30);
        assert_eq!(split.test.iter().filter(|r| r.emotion == "happy").count(), 4);
        assert_eq!(split.test.iter().filter(|r| r.emotion == "sad").count(), 2);
    }

    #[test]
    fn halves_are_disjoint() {
        let split = stratified_split(&corpus(), 0.25, 3).unwrap();
        for record in &split.test {
            assert!(!split.train.contains(record));
        }
    }

    #[test]
    fn rejects_bad_ratio() {
        assert!(matches!(stratified_split(&corpus(), 1.0, 1), Err(Error::Dataset(_))));
        assert!(matches!(stratified_split(&corpus(), 0.0, 1), Err(Error::Dataset(_))));
    }
}
