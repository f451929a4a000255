//! Pitch and pitch-class naming.

use crate::types::KeyMode;

pub const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
pub const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Major keys conventionally spelled with flats.
pub const FLAT_MAJOR_ROOTS: [u8; 6] = [1, 3, 5, 6, 8, 10]; // Db, Eb, F, Gb, Ab, Bb

/// Minor keys conventionally spelled with flats.
const FLAT_MINOR_ROOTS: [u8; 4] = [0, 2, 5, 7];
const FLAT_MINOR_TONICS: [u8; 2] = [3, 10]; // Eb, Bb

pub fn note_name(pitch_class: u8, use_flats: bool) -> &'static str {
    let idx = (pitch_class % 12) as usize;
    if use_flats {
        NOTE_NAMES_FLAT[idx]
    } else {
        NOTE_NAMES_SHARP[idx]
    }
}

/// Scientific pitch name, sharp spelling: 60 → "C4".
pub fn pitch_name(pitch: u8) -> String {
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES_SHARP[(pitch % 12) as usize], octave)
}

/// Conventional spelling of a key's tonic.
pub fn key_tonic_name(pitch_class: u8, mode: KeyMode) -> &'static str {
    let pc = pitch_class % 12;
    let use_flats = match mode {
        KeyMode::Major => FLAT_MAJOR_ROOTS.contains(&pc),
        KeyMode::Minor => FLAT_MINOR_TONICS.contains(&pc),
    };
    note_name(pc, use_flats)
}

/// Whether scale members of this key are spelled with flats.
pub fn key_uses_flats(pitch_class: u8, mode: KeyMode) -> bool {
    let pc = pitch_class % 12;
    match mode {
        KeyMode::Major => FLAT_MAJOR_ROOTS.contains(&pc),
        KeyMode::Minor => FLAT_MINOR_ROOTS.contains(&pc) || FLAT_MINOR_TONICS.contains(&pc),
    }
}

/// Letter index (C=0 … B=6) and semitone offset of a note letter.
pub(crate) fn letter(c: char) -> Option<(usize, i32)> {
    match c.to_ascii_uppercase() {
        'C' => Some((0, 0)),
        'D' => Some((1, 2)),
        'E' => Some((2, 4)),
        'F' => Some((3, 5)),
        'G' => Some((4, 7)),
        'A' => Some((5, 9)),
        'B' => Some((6, 11)),
        _ => None,
    }
}

pub(crate) const LETTERS: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];
pub(crate) const LETTER_PCS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// A parsed note name: letter plus accidental offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spelling {
    pub letter: usize,
    pub accidental: i32,
}

impl Spelling {
    pub fn pitch_class(&self) -> u8 {
        (LETTER_PCS[self.letter] + self.accidental).rem_euclid(12) as u8
    }
}

/// Parse a note name such as `"C"`, `"F#"`, `"Bb"`, `"E♭"`, `"B-"` or `"G#4"`.
///
/// Trailing octave digits are accepted and ignored.
pub fn parse_spelling(name: &str) -> Option<Spelling> {
    let name = name.trim();
    let first = name.chars().next()?;
    let (letter, _) = letter(first)?;
    let mut accidental = 0;
    let mut rest = name[first.len_utf8()..].chars().peekable();
    while let Some(&c) = rest.peek() {
        match c {
            '#' | '♯' => accidental += 1,
            'b' | '♭' => accidental -= 1,
            '-' if rest.clone().nth(1).map_or(true, |n| !n.is_ascii_digit()) => accidental -= 1,
            _ => break,
        }
        rest.next();
    }
    let remainder: String = rest.collect();
    let octave_ok = remainder.is_empty()
        || remainder
            .strip_prefix('-')
            .unwrap_or(&remainder)
            .chars()
            .all(|c| c.is_ascii_digit());
    octave_ok.then_some(Spelling { letter, accidental })
}

/// Pitch class of a note name, or `None` when the name does not parse.
pub fn pitch_class_of(name: &str) -> Option<u8> {
    parse_spelling(name).map(|s| s.pitch_class())
}

/// Render a spelling, e.g. letter 3 with +1 → "F#".
pub fn spell(spelling: Spelling) -> String {
    let accidental = if spelling.accidental >= 0 {
        "#".repeat(spelling.accidental as usize)
    } else {
        "b".repeat((-spelling.accidental) as usize)
    };
    format!("{}{}", LETTERS[spelling.letter], accidental)
}
