//! Chord qualities as interval bitmasks above a root.

use crate::types::ChordQuality;

struct Template {
    quality: ChordQuality,
    /// Bit `i` set when the chord contains the interval of `i` semitones.
    tones: u16,
}

const fn tones(intervals: &[u8]) -> u16 {
    let mut bits = 0u16;
    let mut i = 0;
    while i < intervals.len() {
        bits |= 1 << intervals[i];
        i += 1;
    }
    bits
}

/// Four-note qualities before triads, so a full seventh chord is never
/// reported as its triad.
static TEMPLATES: [Template; 16] = [
    Template { quality: ChordQuality::Dominant7, tones: tones(&[0, 4, 7, 10]) },
    Template { quality: ChordQuality::Major7, tones: tones(&[0, 4, 7, 11]) },
    Template { quality: ChordQuality::Minor7, tones: tones(&[0, 3, 7, 10]) },
    Template { quality: ChordQuality::MinorMajor7, tones: tones(&[0, 3, 7, 11]) },
    Template { quality: ChordQuality::Diminished7, tones: tones(&[0, 3, 6, 9]) },
    Template { quality: ChordQuality::HalfDiminished7, tones: tones(&[0, 3, 6, 10]) },
    Template { quality: ChordQuality::Major6, tones: tones(&[0, 4, 7, 9]) },
    Template { quality: ChordQuality::Minor6, tones: tones(&[0, 3, 7, 9]) },
    Template { quality: ChordQuality::Add9, tones: tones(&[0, 2, 4, 7]) },
    Template { quality: ChordQuality::Major, tones: tones(&[0, 4, 7]) },
    Template { quality: ChordQuality::Minor, tones: tones(&[0, 3, 7]) },
    Template { quality: ChordQuality::Diminished, tones: tones(&[0, 3, 6]) },
    Template { quality: ChordQuality::Augmented, tones: tones(&[0, 4, 8]) },
    Template { quality: ChordQuality::Suspended4, tones: tones(&[0, 5, 7]) },
    Template { quality: ChordQuality::Suspended2, tones: tones(&[0, 2, 7]) },
    Template { quality: ChordQuality::Power, tones: tones(&[0, 7]) },
];

/// The pitch-class set as intervals above `root`.
fn above(pitch_classes: &[u8], root: u8) -> u16 {
    pitch_classes
        .iter()
        .fold(0, |bits, pc| bits | 1 << ((pc % 12 + 12 - root) % 12))
}

/// Every `(root, template)` pairing, templates outermost.
fn candidates() -> impl Iterator<Item = (u8, &'static Template)> {
    TEMPLATES.iter().flat_map(|t| (0..12u8).map(move |root| (root, t)))
}

/// Find a template whose tones are exactly the given pitch classes.
///
/// Returns `(root_pc, quality)`. When several roots fit (C6 and Am7 share
/// their notes), a root equal to `bass` wins; otherwise the first template
/// in table order.
pub fn exact_match(pitch_classes: &[u8], bass: Option<u8>) -> Option<(u8, ChordQuality)> {
    let bass = bass.map(|b| b % 12);
    let mut first = None;
    let fits = |(root, t): &(u8, &Template)| above(pitch_classes, *root) == t.tones;
    for (root, template) in candidates().filter(fits) {
        if bass == Some(root) {
            return Some((root, template.quality));
        }
        first.get_or_insert((root, template.quality));
    }
    first
}

/// Closest template for a set that matches none exactly.
///
/// A candidate must cover at least two of the set's tones and lack at most
/// one of its own. Ranking: most covered tones, then fewest foreign tones,
/// then fewest missing tones, then a root on the bass. Remaining ties go to
/// table order.
pub fn nearest(pitch_classes: &[u8], bass: Option<u8>) -> Option<(u8, ChordQuality)> {
    let bass = bass.map(|b| b % 12);
    let mut best: Option<((u32, i32, i32, bool), u8, ChordQuality)> = None;

    for (root, template) in candidates() {
        let set = above(pitch_classes, root);
        let covered = (set & template.tones).count_ones();
        let missing = (template.tones & !set).count_ones();
        let foreign = (set & !template.tones).count_ones();
        if covered < 2 || missing > 1 {
            continue;
        }
        let rank = (covered, -(foreign as i32), -(missing as i32), bass == Some(root));
        if best.as_ref().map_or(true, |(top, _, _)| rank > *top) {
            best = Some((rank, root, template.quality));
        }
    }

    best.map(|(_, root, quality)| (root, quality))
}
