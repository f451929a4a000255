//! Harmonic analysis of note collections.
//!
//! Quantized buckets become chords, chords become Forte set-class tokens,
//! and the whole collection yields a key estimate that is corrected against
//! the opening chord and expanded into a diatonic scale with a function
//! label for every chord. [`ProgressionAnalyzer`] runs the complete pass
//! and assembles a [`ProgressionResult`].

pub mod analyzer;
pub mod chord_templates;
pub mod chords;
pub mod correction;
pub mod forte;
pub mod key;
pub mod pitch;
pub mod scale;
pub mod tempo;
pub mod types;

pub use analyzer::{
    AnalysisParams, ChordSummary, EmotionClassifier, EmotionReading, ProgressionAnalyzer,
    ProgressionReport, ProgressionResult, RelativeScale, ScaleChord, ScaleSummary,
};
pub use chords::{detect_chord, detect_chords, ChordDetection, ChordParams};
pub use correction::{correct_key, relative_key, RELATIVE_KEYS};
pub use forte::{classify, forte_sequence, ForteClass, SetQuality};
pub use key::estimate_key;
pub use scale::{HarmonicFunction, ScaleInfo, TriadQuality};
pub use tempo::{TempoDescriptor, TempoMarking};
pub use types::{ChordEvent, ChordQuality, KeyEstimate, KeyMode};

/// Why a single bucket or chord was left out. Never aborts a sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("{found} distinct pitches, need {required}")]
    TooFewPitches { found: usize, required: usize },

    #[error("pitch {0} outside the MIDI range")]
    PitchOutOfRange(u8),

    #[error("unclassifiable chord: {0}")]
    Unclassifiable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Midi(#[from] midi_analysis::Error),

    #[error("could not extract a chord progression")]
    NoProgression,

    #[error("unknown pitch name '{0}'")]
    UnknownPitchName(String),

    #[error("emotion classifier failed: {0}")]
    Classifier(String),
}

pub type Result<T> = std::result::Result<T, Error>;
