//! Forte set-class identification.
//!
//! Pitch-class sets are handled as 12-bit masks (bit `n` = pitch class `n`).
//! Identifiers follow the transpositional convention: `3-11A` and `3-11B`
//! distinguish the two inversionally related forms of a set class, and
//! inversionally symmetric classes carry no suffix.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::types::ChordEvent;
use crate::SkipReason;

const FULL: u16 = 0x0FFF;

/// `(number, is_z, prime form)` for one cardinality.
type CatalogRow = (u8, bool, &'static [u8]);

const DYADS: &[CatalogRow] = &[
    (1, false, &[0, 1]),
    (2, false, &[0, 2]),
    (3, false, &[0, 3]),
    (4, false, &[0, 4]),
    (5, false, &[0, 5]),
    (6, false, &[0, 6]),
];

const TRICHORDS: &[CatalogRow] = &[
    (1, false, &[0, 1, 2]),
    (2, false, &[0, 1, 3]),
    (3, false, &[0, 1, 4]),
    (4, false, &[0, 1, 5]),
    (5, false, &[0, 1, 6]),
    (6, false, &[0, 2, 4]),
    (7, false, &[0, 2, 5]),
    (8, false, &[0, 2, 6]),
    (9, false, &[0, 2, 7]),
    (10, false, &[0, 3, 6]),
    (11, false, &[0, 3, 7]),
    (12, false, &[0, 4, 8]),
];

const TETRACHORDS: &[CatalogRow] = &[
    (1, false, &[0, 1, 2, 3]),
    (2, false, &[0, 1, 2, 4]),
    (3, false, &[0, 1, 3, 4]),
    (4, false, &[0, 1, 2, 5]),
    (5, false, &[0, 1, 2, 6]),
    (6, false, &[0, 1, 2, 7]),
    (7, false, &[0, 1, 4, 5]),
    (8, false, &[0, 1, 5, 6]),
    (9, false, &[0, 1, 6, 7]),
    (10, false, &[0, 2, 3, 5]),
    (11, false, &[0, 1, 3, 5]),
    (12, false, &[0, 2, 3, 6]),
    (13, false, &[0, 1, 3, 6]),
    (14, false, &[0, 2, 3, 7]),
    (15, true, &[0, 1, 4, 6]),
    (16, false, &[0, 1, 5, 7]),
    (17, false, &[0, 3, 4, 7]),
    (18, false, &[0, 1, 4, 7]),
    (19, false, &[0, 1, 4, 8]),
    (20, false, &[0, 1, 5, 8]),
    (21, false, &[0, 2, 4, 6]),
    (22, false, &[0, 2, 4, 7]),
    (23, false, &[0, 2, 5, 7]),
    (24, false, &[0, 2, 4, 8]),
    (25, false, &[0, 2, 6, 8]),
    (26, false, &[0, 3, 5, 8]),
    (27, false, &[0, 2, 5, 8]),
    (28, false, &[0, 3, 6, 9]),
    (29, true, &[0, 1, 3, 7]),
];

const PENTACHORDS: &[CatalogRow] = &[
    (1, false, &[0, 1, 2, 3, 4]),
    (2, false, &[0, 1, 2, 3, 5]),
    (3, false, &[0, 1, 2, 4, 5]),
    (4, false, &[0, 1, 2, 3, 6]),
    (5, false, &[0, 1, 2, 3, 7]),
    (6, false, &[0, 1, 2, 5, 6]),
    (7, false, &[0, 1, 2, 6, 7]),
    (8, false, &[0, 2, 3, 4, 6]),
    (9, false, &[0, 1, 2, 4, 6]),
    (10, false, &[0, 1, 3, 4, 6]),
    (11, false, &[0, 2, 3, 4, 7]),
    (12, true, &[0, 1, 3, 5, 6]),
    (13, false, &[0, 1, 2, 4, 8]),
    (14, false, &[0, 1, 2, 5, 7]),
    (15, false, &[0, 1, 2, 6, 8]),
    (16, false, &[0, 1, 3, 4, 7]),
    (17, true, &[0, 1, 3, 4, 8]),
    (18, true, &[0, 1, 4, 5, 7]),
    (19, false, &[0, 1, 3, 6, 7]),
    (20, false, &[0, 1, 3, 7, 8]),
    (21, false, &[0, 1, 4, 5, 8]),
    (22, false, &[0, 1, 4, 7, 8]),
    (23, false, &[0, 2, 3, 5, 7]),
    (24, false, &[0, 1, 3, 5, 7]),
    (25, false, &[0, 2, 3, 5, 8]),
    (26, false, &[0, 2, 4, 5, 8]),
    (27, false, &[0, 1, 3, 5, 8]),
    (28, false, &[0, 2, 3, 6, 8]),
    (29, false, &[0, 1, 3, 6, 8]),
    (30, false, &[0, 1, 4, 6, 8]),
    (31, false, &[0, 1, 3, 6, 9]),
    (32, false, &[0, 1, 4, 6, 9]),
    (33, false, &[0, 2, 4, 6, 8]),
    (34, false, &[0, 2, 4, 6, 9]),
    (35, false, &[0, 2, 4, 7, 9]),
    (36, true, &[0, 1, 2, 4, 7]),
    (37, true, &[0, 3, 4, 5, 8]),
    (38, true, &[0, 1, 2, 5, 8]),
];

const HEXACHORDS: &[CatalogRow] = &[
    (1, false, &[0, 1, 2, 3, 4, 5]),
    (2, false, &[0, 1, 2, 3, 4, 6]),
    (3, true, &[0, 1, 2, 3, 5, 6]),
    (4, true, &[0, 1, 2, 4, 5, 6]),
    (5, false, &[0, 1, 2, 3, 6, 7]),
    (6, true, &[0, 1, 2, 5, 6, 7]),
    (7, false, &[0, 1, 2, 6, 7, 8]),
    (8, false, &[0, 2, 3, 4, 5, 7]),
    (9, false, &[0, 1, 2, 3, 5, 7]),
    (10, true, &[0, 1, 3, 4, 5, 7]),
    (11, true, &[0, 1, 2, 4, 5, 7]),
    (12, true, &[0, 1, 2, 4, 6, 7]),
    (13, true, &[0, 1, 3, 4, 6, 7]),
    (14, false, &[0, 1, 3, 4, 5, 8]),
    (15, false, &[0, 1, 2, 4, 5, 8]),
    (16, false, &[0, 1, 4, 5, 6, 8]),
    (17, true, &[0, 1, 2, 4, 7, 8]),
    (18, false, &[0, 1, 2, 5, 7, 8]),
    (19, true, &[0, 1, 3, 4, 7, 8]),
    (20, false, &[0, 1, 4, 5, 8, 9]),
    (21, false, &[0, 2, 3, 4, 6, 8]),
    (22, false, &[0, 1, 2, 4, 6, 8]),
    (23, true, &[0, 2, 3, 5, 6, 8]),
    (24, true, &[0, 1, 3, 4, 6, 8]),
    (25, true, &[0, 1, 3, 5, 6, 8]),
    (26, true, &[0, 1, 3, 5, 7, 8]),
    (27, false, &[0, 1, 3, 4, 6, 9]),
    (28, true, &[0, 1, 3, 5, 6, 9]),
    (29, true, &[0, 1, 3, 6, 8, 9]),
    (30, false, &[0, 1, 3, 6, 7, 9]),
    (31, false, &[0, 1, 3, 5, 8, 9]),
    (32, false, &[0, 2, 4, 5, 7, 9]),
    (33, false, &[0, 2, 3, 5, 7, 9]),
    (34, false, &[0, 1, 3, 5, 7, 9]),
    (35, false, &[0, 2, 4, 6, 8, 10]),
    (36, true, &[0, 1, 2, 3, 4, 7]),
    (37, true, &[0, 1, 2, 3, 4, 8]),
    (38, true, &[0, 1, 2, 3, 7, 8]),
    (39, true, &[0, 2, 3, 4, 5, 8]),
    (40, true, &[0, 1, 2, 3, 5, 8]),
    (41, true, &[0, 1, 2, 3, 6, 8]),
    (42, true, &[0, 1, 2, 3, 6, 9]),
    (43, true, &[0, 1, 2, 5, 6, 8]),
    (44, true, &[0, 1, 2, 5, 6, 9]),
    (45, true, &[0, 2, 3, 4, 6, 9]),
    (46, true, &[0, 1, 2, 4, 6, 9]),
    (47, true, &[0, 1, 2, 4, 7, 9]),
    (48, true, &[0, 1, 2, 5, 7, 9]),
    (49, true, &[0, 1, 3, 4, 7, 9]),
    (50, true, &[0, 1, 4, 6, 7, 9]),
];

/// Coarse harmonic quality carried alongside the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetQuality {
    Major,
    Minor,
    Symmetric,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForteClass {
    /// Identifier such as "3-11B" or "4-Z15A".
    pub name: String,
    pub cardinality: u8,
    pub number: u8,
    /// Prime form under transposition and inversion.
    pub prime_form: Vec<u8>,
    /// Most compact transposition of the input itself.
    pub tn_form: Vec<u8>,
    pub quality: SetQuality,
}

#[derive(Debug, Clone, Copy)]
struct CatalogEntry {
    cardinality: u8,
    number: u8,
    z: bool,
    prime: u16,
}

fn mask_of(pcs: &[u8]) -> u16 {
    pcs.iter().fold(0u16, |mask, &pc| mask | 1 << (pc % 12))
}

fn members(mask: u16) -> Vec<u8> {
    (0..12u8).filter(|pc| mask & (1 << pc) != 0).collect()
}

/// Transpose down by `t` semitones.
fn rotate(mask: u16, t: u8) -> u16 {
    let t = t % 12;
    ((mask >> t) | (mask << (12 - t))) & FULL
}

fn invert(mask: u16) -> u16 {
    (0..12u8)
        .filter(|pc| mask & (1 << pc) != 0)
        .fold(0u16, |acc, pc| acc | 1 << ((12 - pc) % 12))
}

/// Canonical representative under transposition: the smallest mask among
/// the transpositions that start on pitch class 0.
fn tn_canonical(mask: u16) -> u16 {
    (0..12u8)
        .filter(|t| mask & (1 << t) != 0)
        .map(|t| rotate(mask, t))
        .min()
        .unwrap_or(0)
}

fn tni_canonical(mask: u16) -> u16 {
    tn_canonical(mask).min(tn_canonical(invert(mask)))
}

/// Most compact form over transposition and inversion: smallest span,
/// then lexicographically smallest.
fn packed_prime(mask: u16) -> Vec<u8> {
    (0..12u8)
        .filter(|t| mask & (1 << t) != 0)
        .flat_map(|t| [rotate(mask, t), rotate(invert(mask), (12 - t) % 12)])
        .filter(|m| m & 1 != 0)
        .map(members)
        .min_by(|a, b| a.last().cmp(&b.last()).then_with(|| a.cmp(b)))
        .unwrap_or_default()
}

fn catalog() -> &'static HashMap<u16, CatalogEntry> {
    static CATALOG: OnceLock<HashMap<u16, CatalogEntry>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        let mut map = HashMap::new();
        let mut insert = |cardinality: u8, number: u8, z: bool, prime: u16| {
            map.insert(
                tni_canonical(prime),
                CatalogEntry {
                    cardinality,
                    number,
                    z,
                    prime,
                },
            );
        };

        insert(0, 1, false, 0);
        insert(1, 1, false, 1);
        insert(11, 1, false, FULL & !1);
        insert(12, 1, false, FULL);

        let tables = [
            (2u8, DYADS),
            (3, TRICHORDS),
            (4, TETRACHORDS),
            (5, PENTACHORDS),
            (6, HEXACHORDS),
        ];
        for (cardinality, rows) in tables {
            for &(number, z, pcs) in rows {
                let prime = mask_of(pcs);
                insert(cardinality, number, z, prime);
                if cardinality < 6 {
                    // Complements share the number of the set they complete.
                    let complement = FULL & !prime;
                    insert(12 - cardinality, number, z, mask_of(&packed_prime(complement)));
                }
            }
        }
        map
    })
}

/// Identify the set class of the given pitch classes.
///
/// Octave, order and duplicates are irrelevant: `[0, 4, 7]` and
/// `[7, 16, 4, 0]` give the same result.
pub fn classify(pitch_classes: &[u8]) -> Result<ForteClass, SkipReason> {
    let mask = mask_of(pitch_classes);
    if mask == 0 {
        return Err(SkipReason::Unclassifiable("empty pitch-class set".to_string()));
    }

    let entry = catalog()
        .get(&tni_canonical(mask))
        .copied()
        .ok_or_else(|| {
            SkipReason::Unclassifiable(format!("no set class for {:?}", members(mask)))
        })?;

    let tn = tn_canonical(mask);
    let symmetric = tn == tn_canonical(invert(mask));
    let suffix = if symmetric {
        ""
    } else if tn == tn_canonical(entry.prime) {
        "A"
    } else {
        "B"
    };

    let z = if entry.z { "Z" } else { "" };
    let name = format!("{}-{}{}{}", entry.cardinality, z, entry.number, suffix);

    let quality = match (entry.cardinality, entry.number, suffix) {
        (3, 11, "B") => SetQuality::Major,
        (3, 11, "A") => SetQuality::Minor,
        _ if symmetric => SetQuality::Symmetric,
        _ => SetQuality::Other,
    };

    Ok(ForteClass {
        name,
        cardinality: entry.cardinality,
        number: entry.number,
        prime_form: members(entry.prime),
        tn_form: members(tn),
        quality,
    })
}

/// Forte identifiers for a chord progression, in order, with consecutive
/// repeats collapsed. Chords that cannot be classified are returned
/// separately with their time.
pub fn forte_sequence(chords: &[ChordEvent]) -> (Vec<String>, Vec<(f64, SkipReason)>) {
    let mut sequence: Vec<String> = Vec::new();
    let mut skipped = Vec::new();

    for chord in chords {
        match classify(&chord.pitch_classes) {
            Ok(class) => {
                if sequence.last() != Some(&class.name) {
                    sequence.push(class.name);
                }
            }
            Err(reason) => skipped.push((chord.time, reason)),
        }
    }

    (sequence, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(pcs: &[u8]) -> String {
        classify(pcs).unwrap().name
    }

    #[test]
    fn catalog_covers_every_set_class() {
        // 224 Tn/TnI classes including the empty set.
        let mut counts = [0usize; 13];
        for entry in catalog().values() {
            counts[entry.cardinality as usize] += 1;
        }
        assert_eq!(counts, [1, 1, 6, 12, 29, 38, 50, 38, 29, 12, 6, 1, 1]);
    }

    #[test]
    fn every_mask_resolves() {
        for mask in 1..=FULL {
            assert!(classify(&members(mask)).is_ok(), "mask {mask:#05x}");
        }
    }

    #[test]
    fn triads() {
        assert_eq!(name(&[0, 4, 7]), "3-11B");
        assert_eq!(name(&[9, 0, 4]), "3-11A");
        assert_eq!(name(&[0, 3, 6]), "3-10");
        assert_eq!(name(&[0, 4, 8]), "3-12");
    }

    #[test]
    fn qualities() {
        assert_eq!(classify(&[0, 4, 7]).unwrap().quality, SetQuality::Major);
        assert_eq!(classify(&[2, 5, 9]).unwrap().quality, SetQuality::Minor);
        assert_eq!(classify(&[0, 3, 6, 9]).unwrap().quality, SetQuality::Symmetric);
        assert_eq!(classify(&[0, 1, 3]).unwrap().quality, SetQuality::Other);
    }

    #[test]
    fn voicing_and_octave_do_not_matter() {
        // {C4, E4, G4} and {E5, G4, C6}
        assert_eq!(name(&[60 % 12, 64 % 12, 67 % 12]), name(&[76 % 12, 67 % 12, 84 % 12]));
        assert_eq!(name(&[7, 4, 0, 0, 12]), "3-11B");
    }

    #[test]
    fn seventh_chords() {
        // G7: 4-27B; half-diminished: 4-27A
        assert_eq!(name(&[7, 11, 2, 5]), "4-27B");
        assert_eq!(name(&[11, 2, 5, 9]), "4-27A");
        assert_eq!(name(&[0, 4, 7, 11]), "4-20");
        assert_eq!(name(&[0, 1, 4, 6]), "4-Z15A");
    }

    #[test]
    fn complements_share_numbers() {
        // Diatonic scale: complement of the pentatonic 5-35.
        assert_eq!(name(&[0, 2, 4, 5, 7, 9, 11]), "7-35");
        assert_eq!(
            classify(&[0, 2, 4, 5, 7, 9, 11]).unwrap().prime_form,
            vec![0, 1, 3, 5, 6, 8, 10]
        );
    }

    #[test]
    fn tn_form_is_compact_transposition() {
        assert_eq!(classify(&[7, 0, 4]).unwrap().tn_form, vec![0, 4, 7]);
        assert_eq!(classify(&[7, 0, 4]).unwrap().prime_form, vec![0, 3, 7]);
    }

    #[test]
    fn empty_set_is_unclassifiable() {
        assert!(matches!(classify(&[]), Err(SkipReason::Unclassifiable(_))));
    }
}
