use tracing::debug;

use crate::pitch::{key_tonic_name, pitch_class_of};
use crate::types::{ChordEvent, KeyEstimate, KeyMode};

/// Major tonic → relative minor tonic.
pub const RELATIVE_KEYS: [(&str, &str); 14] = [
    ("C", "A"),
    ("G", "E"),
    ("D", "B"),
    ("A", "F#"),
    ("E", "C#"),
    ("B", "G#"),
    ("F#", "D#"),
    ("C#", "A#"),
    ("F", "D"),
    ("Bb", "G"),
    ("Eb", "C"),
    ("Ab", "F"),
    ("Db", "Bb"),
    ("Gb", "Eb"),
];

/// Relative key of a tonic: the minor key sharing a major key's notes, or
/// the major key sharing a minor key's notes.
///
/// Spelling follows [`RELATIVE_KEYS`], preferring an entry whose tonic is
/// spelled exactly as given.
pub fn relative_key(tonic: &str, mode: KeyMode) -> Option<KeyEstimate> {
    let pc = pitch_class_of(tonic)?;
    let side = |entry: &(&'static str, &'static str)| match mode {
        KeyMode::Major => (entry.0, entry.1),
        KeyMode::Minor => (entry.1, entry.0),
    };

    let exact = RELATIVE_KEYS.iter().map(side).find(|(from, _)| *from == tonic);
    let by_pitch = || {
        RELATIVE_KEYS
            .iter()
            .map(side)
            .find(|(from, _)| pitch_class_of(from) == Some(pc))
    };
    let (_, to) = exact.or_else(by_pitch)?;
    let to_pc = pitch_class_of(to)?;

    Some(KeyEstimate::new(to, to_pc, mode.flipped(), 0.0))
}

/// Resolve major/relative-minor ambiguity using the opening chord as a prior.
///
/// This is a heuristic, not a music-theoretic rule. Profile correlation
/// cannot tell a major key from its relative minor, so the tonal centre the
/// piece opens on decides:
///
/// 1. no chords: the estimate is returned unchanged;
/// 2. first root equals the tonic: unchanged;
/// 3. first root is the relative tonic: the mode flips to the relative key;
/// 4. otherwise the first root becomes the tonic, minor if the chord reads
///    as minor and major otherwise.
///
/// Applying it twice with the same progression gives the same result as
/// applying it once.
pub fn correct_key(estimate: &KeyEstimate, progression: &[ChordEvent]) -> KeyEstimate {
    let Some(first) = progression.first() else {
        return estimate.clone();
    };

    let first_root = first.root_pitch_class % 12;
    if first_root == estimate.tonic_pitch_class {
        return estimate.clone();
    }

    if let Some(mut relative) = relative_key(&estimate.tonic, estimate.mode) {
        if relative.tonic_pitch_class == first_root {
            debug!(
                from = %estimate.display_key,
                to = %relative.display_key,
                "relative key correction"
            );
            relative.confidence = estimate.confidence;
            return relative;
        }
    }

    let mode = if first.is_minor() {
        KeyMode::Minor
    } else {
        KeyMode::Major
    };
    let corrected = KeyEstimate::new(
        key_tonic_name(first_root, mode),
        first_root,
        mode,
        estimate.confidence,
    );
    debug!(from = %estimate.display_key, to = %corrected.display_key, "opening chord correction");
    corrected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChordQuality;
    use pretty_assertions::assert_eq;

    fn chord(root: &str, quality: Option<ChordQuality>, label: &str) -> ChordEvent {
        let pc = pitch_class_of(root).unwrap();
        ChordEvent {
            time: 0.0,
            pitches: vec![],
            pitch_classes: vec![pc],
            label: label.to_string(),
            root: root.to_string(),
            root_pitch_class: pc,
            symbol: root.to_string(),
            quality,
            function: None,
        }
    }

    fn c_major() -> KeyEstimate {
        KeyEstimate::new("C", 0, KeyMode::Major, 0.9)
    }

    #[test]
    fn empty_progression_keeps_estimate() {
        assert_eq!(correct_key(&c_major(), &[]), c_major());
    }

    #[test]
    fn matching_tonic_keeps_estimate() {
        let progression = [chord("C", Some(ChordQuality::Major), "C major triad")];
        assert_eq!(correct_key(&c_major(), &progression), c_major());
    }

    #[test]
    fn relative_minor_opening_flips_mode() {
        let progression = [chord("A", Some(ChordQuality::Minor), "A minor triad")];
        let corrected = correct_key(&c_major(), &progression);
        assert_eq!(corrected.tonic, "A");
        assert_eq!(corrected.mode, KeyMode::Minor);
        assert_eq!(corrected.display_key, "A minor");
        assert_eq!(corrected.confidence, 0.9);
    }

    #[test]
    fn relative_major_from_minor() {
        let estimate = KeyEstimate::new("E", 4, KeyMode::Minor, 0.8);
        let progression = [chord("G", Some(ChordQuality::Major), "G major triad")];
        let corrected = correct_key(&estimate, &progression);
        assert_eq!((corrected.tonic.as_str(), corrected.mode), ("G", KeyMode::Major));
    }

    #[test]
    fn unrelated_opening_takes_over() {
        let progression = [chord("D", Some(ChordQuality::Minor), "D minor triad")];
        let corrected = correct_key(&c_major(), &progression);
        assert_eq!((corrected.tonic.as_str(), corrected.mode), ("D", KeyMode::Minor));

        let progression = [chord("G", None, "G4+A4")];
        let corrected = correct_key(&c_major(), &progression);
        assert_eq!((corrected.tonic.as_str(), corrected.mode), ("G", KeyMode::Major));
    }

    #[test]
    fn correction_is_idempotent() {
        for (root, quality, label) in [
            ("A", Some(ChordQuality::Minor), "A minor triad"),
            ("D", Some(ChordQuality::Minor), "D minor triad"),
            ("F#", None, "F#3+A3+C#4 minor"),
            ("C", Some(ChordQuality::Major), "C major triad"),
        ] {
            let progression = [chord(root, quality, label)];
            let once = correct_key(&c_major(), &progression);
            let twice = correct_key(&once, &progression);
            assert_eq!(once, twice, "first root {root}");
        }
    }

    #[test]
    fn relative_keys_both_ways() {
        let minor = relative_key("Db", KeyMode::Major).unwrap();
        assert_eq!((minor.tonic.as_str(), minor.mode), ("Bb", KeyMode::Minor));
        let major = relative_key("F#", KeyMode::Minor).unwrap();
        assert_eq!((major.tonic.as_str(), major.mode), ("A", KeyMode::Major));
        assert!(relative_key("X", KeyMode::Major).is_none());
    }
}
