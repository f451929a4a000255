use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::record::DatasetRecord;
use crate::{Error, Result};

/// Undersample every emotion to the size of the rarest one, then shuffle.
///
/// Sampling is without replacement and fully determined by `seed`.
pub fn balance(records: &[DatasetRecord], seed: u64) -> Result<Vec<DatasetRecord>> {
    let mut groups: BTreeMap<&str, Vec<&DatasetRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.emotion.as_str()).or_default().push(record);
    }

    let Some(target) = groups.values().map(Vec::len).min() else {
        return Err(Error::NotEnoughData("cannot balance an empty dataset".into()));
    };

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut balanced = Vec::with_capacity(target * groups.len());
    for members in groups.values_mut() {
        members.shuffle(&mut rng);
        balanced.extend(members.iter().take(target).map(|r| (*r).clone()));
    }
    balanced.shuffle(&mut rng);

    info!(
        labels = groups.len(),
        per_label = target,
        before = records.len(),
        after = balanced.len(),
        "dataset balanced"
    );
    Ok(balanced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn corpus() -> Vec<DatasetRecord> {
        let mut records = Vec::new();
        for (emotion, count) in [("happy", 9), ("sad", 4), ("angry", 6)] {
            for i in 0..count {
                let tokens = vec![format!("3-{}", i + 1)];
                records.push(DatasetRecord::new(&tokens, "major", emotion));
            }
        }
        records
    }

    #[test]
    fn every_label_matches_the_minimum() {
        let balanced = balance(&corpus(), 42).unwrap();
        assert_eq!(balanced.len(), 12);
        for emotion in ["happy", "sad", "angry"] {
            assert_eq!(balanced.iter().filter(|r| r.emotion == emotion).count(), 4);
        }
    }

    #[test]
    fn seeded_and_without_replacement() {
        let a = balance(&corpus(), 7).unwrap();
        let b = balance(&corpus(), 7).unwrap();
        assert_eq!(a, b);

        let mut happy: Vec<&str> = a
            .iter()
            .filter(|r| r.emotion == "happy")
            .map(|r| r.forte_sequence.as_str())
            .collect();
        happy.sort();
        happy.dedup();
        assert_eq!(happy.len(), 4);
    }

    #[test]
    fn empty_is_an_error() {
        assert!(matches!(balance(&[], 1), Err(Error::NotEnoughData(_))));
    }
}
