//! MIDI-level building blocks for harmonic analysis.
//!
//! Decodes Standard MIDI Files into per-instrument [`NoteEvent`]s with
//! times in seconds, groups notes into quantized [`TimeBucket`]s, and
//! writes note collections or typed chord progressions back out as SMF bytes.

pub mod decode;
pub mod midi_writer;
pub mod note;
pub mod progression;
pub mod quantize;

pub use decode::{decode, DecodedMidi, InstrumentTrack, TempoChange, TempoMap};
pub use midi_writer::{notes_to_midi, ExportOptions};
pub use note::{sort_chronologically, NoteEvent};
pub use progression::{progression_to_midi, progression_to_notes, ProgressionOptions};
pub use quantize::{quantize, QuantizeParams, TimeBucket};

/// Errors from MIDI decoding, quantization and export.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("MIDI file contains no notes")]
    EmptyFile,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("invalid chord progression: {0}")]
    InvalidProgression(String),

    #[error("failed to write MIDI: {0}")]
    MidiWrite(String),
}

pub type Result<T> = std::result::Result<T, Error>;
