use midi_analysis::TimeBucket;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chord_templates::{exact_match, nearest};
use crate::pitch::{note_name, pitch_name};
use crate::types::ChordEvent;
use crate::SkipReason;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChordParams {
    /// Distinct MIDI pitches a bucket needs to count as a chord.
    pub min_distinct_pitches: usize,
}

impl Default for ChordParams {
    fn default() -> Self {
        Self {
            min_distinct_pitches: 2,
        }
    }
}

/// Chords found in a bucket sequence, plus the buckets that were passed over.
#[derive(Debug, Clone, Default)]
pub struct ChordDetection {
    pub chords: Vec<ChordEvent>,
    pub skipped: Vec<(f64, SkipReason)>,
}

/// Turn one bucket into a chord.
pub fn detect_chord(bucket: &TimeBucket, params: &ChordParams) -> Result<ChordEvent, SkipReason> {
    if let Some(&bad) = bucket.pitches.iter().find(|&&p| p > 127) {
        return Err(SkipReason::PitchOutOfRange(bad));
    }

    let mut pitches = bucket.pitches.clone();
    pitches.sort_unstable();
    pitches.dedup();

    if pitches.len() < params.min_distinct_pitches.max(1) {
        return Err(SkipReason::TooFewPitches {
            found: pitches.len(),
            required: params.min_distinct_pitches,
        });
    }

    let bass = pitches[0] % 12;
    let mut pitch_classes: Vec<u8> = pitches.iter().map(|p| p % 12).collect();
    pitch_classes.sort_unstable();
    pitch_classes.dedup();

    let names: Vec<String> = pitches.iter().map(|&p| pitch_name(p)).collect();

    let (root_pitch_class, label, symbol, quality) = match exact_match(&pitch_classes, Some(bass)) {
        Some((root, quality)) => {
            let root_name = note_name(root, false);
            (
                root,
                format!("{root_name} {}", quality.common_name()),
                format!("{root_name}{}", quality.suffix()),
                Some(quality),
            )
        }
        None => {
            let symbol = nearest(&pitch_classes, Some(bass))
                .map(|(root, quality)| format!("{}{}", note_name(root, false), quality.suffix()))
                .unwrap_or_else(|| note_name(bass, false).to_string());
            (bass, names.join("+"), symbol, None)
        }
    };

    Ok(ChordEvent {
        time: bucket.time,
        pitches: names,
        pitch_classes,
        label,
        root: note_name(root_pitch_class, false).to_string(),
        root_pitch_class,
        symbol,
        quality,
        function: None,
    })
}

/// Detect chords across buckets, dropping any chord whose label repeats the
/// previous kept chord.
pub fn detect_chords(buckets: &[TimeBucket], params: &ChordParams) -> ChordDetection {
    let mut detection = ChordDetection::default();

    for bucket in buckets {
        match detect_chord(bucket, params) {
            Ok(chord) => {
                let repeat = detection
                    .chords
                    .last()
                    .is_some_and(|prev| prev.label == chord.label);
                if !repeat {
                    detection.chords.push(chord);
                }
            }
            Err(reason) => {
                debug!(time = bucket.time, %reason, "skipping bucket");
                detection.skipped.push((bucket.time, reason));
            }
        }
    }

    detection
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bucket(time: f64, pitches: &[u8]) -> TimeBucket {
        TimeBucket {
            time,
            pitches: pitches.to_vec(),
        }
    }

    #[test]
    fn c_major_triad_label() {
        let chord = detect_chord(&bucket(0.0, &[60, 64, 67]), &ChordParams::default()).unwrap();
        assert_eq!(chord.label, "C major triad");
        assert_eq!(chord.symbol, "C");
        assert_eq!(chord.root, "C");
        assert_eq!(chord.pitches, vec!["C4", "E4", "G4"]);
        assert_eq!(chord.function_label(), "Unknown");
    }

    #[test]
    fn inversion_keeps_template_root() {
        let chord = detect_chord(&bucket(0.0, &[64, 67, 72]), &ChordParams::default()).unwrap();
        assert_eq!(chord.label, "C major triad");
        assert_eq!(chord.pitch_classes, vec![0, 4, 7]);
    }

    #[test]
    fn unisons_collapse_to_names() {
        let chord = detect_chord(&bucket(0.0, &[57, 57, 60, 64]), &ChordParams::default()).unwrap();
        assert_eq!(chord.pitches, vec!["A3", "C4", "E4"]);
        assert_eq!(chord.symbol, "Am");
        assert!(chord.is_minor());
    }

    #[test]
    fn cluster_falls_back_to_pitch_names() {
        let chord = detect_chord(&bucket(0.0, &[60, 61, 62]), &ChordParams::default()).unwrap();
        assert_eq!(chord.label, "C4+C#4+D4");
        assert_eq!(chord.root, "C");
        assert_eq!(chord.quality, None);
    }

    #[test]
    fn single_pitch_is_too_few() {
        let err = detect_chord(&bucket(0.0, &[60, 60]), &ChordParams::default()).unwrap_err();
        assert_eq!(err, SkipReason::TooFewPitches { found: 1, required: 2 });
    }

    #[test]
    fn out_of_range_pitch_is_skipped() {
        let err = detect_chord(&bucket(0.0, &[60, 200]), &ChordParams::default()).unwrap_err();
        assert_eq!(err, SkipReason::PitchOutOfRange(200));
    }

    #[test]
    fn adjacent_duplicates_are_collapsed() {
        let buckets = vec![
            bucket(0.0, &[60, 64, 67]),
            bucket(0.2, &[48, 64, 67, 72]),
            bucket(0.4, &[60]),
            bucket(0.6, &[60, 64, 67]),
            bucket(0.8, &[65, 69, 72]),
            bucket(1.0, &[60, 64, 67]),
        ];
        let detection = detect_chords(&buckets, &ChordParams::default());
        let labels: Vec<&str> = detection.chords.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["C major triad", "F major triad", "C major triad"]);
        assert!(labels.windows(2).all(|w| w[0] != w[1]));
        assert_eq!(detection.skipped.len(), 1);
    }

    #[test]
    fn single_note_passages_yield_nothing() {
        let buckets = vec![bucket(0.0, &[60]), bucket(0.2, &[62]), bucket(0.4, &[64])];
        let detection = detect_chords(&buckets, &ChordParams::default());
        assert!(detection.chords.is_empty());
        assert_eq!(detection.skipped.len(), 3);
    }
}
