//! Key-profile correlation over a duration-weighted pitch-class histogram.

use midi_analysis::NoteEvent;

use crate::pitch::key_tonic_name;
use crate::types::{KeyEstimate, KeyMode};

/// Krumhansl-Kessler key profile ratings, tonic first.
const PROFILES: [(KeyMode, [f64; 12]); 2] = [
    (
        KeyMode::Major,
        [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88],
    ),
    (
        KeyMode::Minor,
        [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17],
    ),
];

/// Every note counts for at least this many seconds.
const MIN_WEIGHT: f64 = 0.01;

/// Best-fitting tonic and mode for a whole note collection.
///
/// Percussive notes do not vote. An empty collection is C major with zero
/// confidence. Relative keys share a pitch collection, so the result is
/// often ambiguous between them; see [`crate::correct_key`].
pub fn estimate_key(notes: &[NoteEvent]) -> KeyEstimate {
    let mut histogram = [0.0_f64; 12];
    for note in notes.iter().filter(|n| !n.instrument_is_percussive) {
        histogram[usize::from(note.pitch % 12)] += note.duration().max(MIN_WEIGHT);
    }
    estimate_from_histogram(&histogram)
}

/// [`estimate_key`] for a histogram indexed by pitch class.
pub fn estimate_from_histogram(histogram: &[f64; 12]) -> KeyEstimate {
    if histogram.iter().sum::<f64>() <= 0.0 {
        return KeyEstimate::new("C", 0, KeyMode::Major, 0.0);
    }

    // Earlier candidates win ties: C before C#, major before minor.
    let mut best = (0u8, KeyMode::Major, f64::NEG_INFINITY);
    for tonic in 0..12u8 {
        for (mode, profile) in &PROFILES {
            let fit = correlation(|i| histogram[(i + usize::from(tonic)) % 12], profile);
            if fit > best.2 {
                best = (tonic, *mode, fit);
            }
        }
    }

    let (tonic, mode, fit) = best;
    KeyEstimate::new(key_tonic_name(tonic, mode), tonic, mode, (fit * 1e4).round() / 1e4)
}

/// Pearson correlation of `sample(0..12)` against `profile`. Zero when
/// either side is flat.
fn correlation(sample: impl Fn(usize) -> f64, profile: &[f64; 12]) -> f64 {
    let xs: [f64; 12] = std::array::from_fn(sample);
    let mean = |v: &[f64; 12]| v.iter().sum::<f64>() / 12.0;
    let (mx, my) = (mean(&xs), mean(profile));

    let (cov, vx, vy) = xs.iter().zip(profile).fold((0.0, 0.0, 0.0), |(c, a, b), (x, y)| {
        let (dx, dy) = (x - mx, y - my);
        (c + dx * dy, a + dx * dx, b + dy * dy)
    });

    let spread = (vx * vy).sqrt();
    if spread < 1e-10 {
        0.0
    } else {
        cov / spread
    }
}
