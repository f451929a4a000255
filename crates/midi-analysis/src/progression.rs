//! Render a typed chord progression such as `"C - G - Am - F"` as MIDI.

use crate::midi_writer::{notes_to_midi, ExportOptions};
use crate::note::NoteEvent;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Chord qualities recognised after the root, longest suffixes first.
const QUALITIES: &[(&str, &[u8])] = &[
    ("m7b5", &[0, 3, 6, 10]),
    ("mmaj7", &[0, 3, 7, 11]),
    ("maj7", &[0, 4, 7, 11]),
    ("dim7", &[0, 3, 6, 9]),
    ("add9", &[0, 4, 7, 14]),
    ("sus2", &[0, 2, 7]),
    ("sus4", &[0, 5, 7]),
    ("min7", &[0, 3, 7, 10]),
    ("maj", &[0, 4, 7]),
    ("min", &[0, 3, 7]),
    ("dim", &[0, 3, 6]),
    ("aug", &[0, 4, 8]),
    ("sus", &[0, 5, 7]),
    ("M7", &[0, 4, 7, 11]),
    ("m7", &[0, 3, 7, 10]),
    ("m6", &[0, 3, 7, 9]),
    ("m9", &[0, 3, 7, 10, 14]),
    ("o7", &[0, 3, 6, 9]),
    ("7", &[0, 4, 7, 10]),
    ("6", &[0, 4, 7, 9]),
    ("9", &[0, 4, 7, 10, 14]),
    ("5", &[0, 7]),
    ("m", &[0, 3, 7]),
    ("o", &[0, 3, 6]),
    ("+", &[0, 4, 8]),
    ("", &[0, 4, 7]),
];

/// Chord roots are voiced from C3 upwards.
const CHORD_BASE: u8 = 48;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionOptions {
    pub bpm: f64,
    /// Length of each chord in quarter notes.
    pub beats_per_chord: f64,
    pub velocity: u8,
}

impl Default for ProgressionOptions {
    fn default() -> Self {
        Self {
            bpm: 90.0,
            beats_per_chord: 1.0,
            velocity: 90,
        }
    }
}

/// Parse a letter name plus accidentals. Returns the pitch class and the
/// unconsumed remainder.
fn parse_root(text: &str) -> Option<(u8, &str)> {
    let letter = text.chars().next()?;
    let mut pc: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let mut rest = &text[letter.len_utf8()..];
    loop {
        if let Some(r) = rest.strip_prefix('#').or_else(|| rest.strip_prefix('♯')) {
            pc += 1;
            rest = r;
        } else if let Some(r) = rest.strip_prefix('b').or_else(|| rest.strip_prefix('♭')) {
            pc -= 1;
            rest = r;
        } else {
            break;
        }
    }
    Some((pc.rem_euclid(12) as u8, rest))
}

/// MIDI pitches for one chord symbol, or `None` if it is not a chord symbol.
pub fn chord_symbol_pitches(symbol: &str) -> Option<Vec<u8>> {
    let (body, bass) = match symbol.split_once('/') {
        Some((body, bass)) => (body, Some(bass)),
        None => (symbol, None),
    };

    let (root, suffix) = parse_root(body)?;
    let (_, intervals) = QUALITIES.iter().find(|(name, _)| *name == suffix)?;

    let mut pitches: Vec<u8> = intervals.iter().map(|i| CHORD_BASE + root + i).collect();

    if let Some(bass) = bass {
        let (bass_pc, rest) = parse_root(bass)?;
        if !rest.is_empty() {
            return None;
        }
        pitches.insert(0, CHORD_BASE - 12 + bass_pc);
    }
    Some(pitches)
}

/// A single note name like `"E"`, `"F#3"` or `"Bb5"`. Octave defaults to 4.
pub fn note_name_pitch(name: &str) -> Option<u8> {
    let (pc, rest) = parse_root(name)?;
    let octave: i32 = if rest.is_empty() { 4 } else { rest.parse().ok()? };
    let pitch = (octave + 1) * 12 + pc as i32;
    u8::try_from(pitch).ok().filter(|p| *p <= 127)
}

/// Split a `-`-separated progression into pitch groups, one per step.
///
/// Steps that are not chord symbols fall back to single note names.
pub fn parse_progression(text: &str) -> Result<Vec<Vec<u8>>> {
    let steps: Vec<&str> = text
        .split('-')
        .map(|s| s.trim().trim_matches('"'))
        .filter(|s| !s.is_empty())
        .collect();

    if steps.is_empty() {
        return Err(Error::InvalidProgression(
            "progression must contain at least one chord".to_string(),
        ));
    }

    steps
        .into_iter()
        .map(|step| {
            chord_symbol_pitches(step)
                .or_else(|| note_name_pitch(step).map(|p| vec![p]))
                .ok_or_else(|| Error::InvalidProgression(format!("unrecognised chord '{step}'")))
        })
        .collect()
}

/// Render a progression as notes, one step after another.
pub fn progression_to_notes(text: &str, options: &ProgressionOptions) -> Result<Vec<NoteEvent>> {
    let step_seconds = options.beats_per_chord * 60.0 / options.bpm;
    if !step_seconds.is_finite() || step_seconds <= 0.0 {
        return Err(Error::InvalidParams(format!(
            "bpm {} with {} beats per chord",
            options.bpm, options.beats_per_chord
        )));
    }

    let mut notes = Vec::new();
    for (index, pitches) in parse_progression(text)?.into_iter().enumerate() {
        let start = index as f64 * step_seconds;
        for pitch in pitches {
            notes.push(NoteEvent::new(
                pitch,
                start,
                start + step_seconds,
                options.velocity,
            ));
        }
    }
    Ok(notes)
}

/// Render a progression as Standard MIDI File bytes.
pub fn progression_to_midi(text: &str, options: &ProgressionOptions) -> Result<Vec<u8>> {
    let notes = progression_to_notes(text, options)?;
    notes_to_midi(
        &notes,
        &ExportOptions {
            bpm: options.bpm,
            track_name: Some("Progression".to_string()),
            ..Default::default()
        },
    )
}
