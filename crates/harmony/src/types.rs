use serde::{Deserialize, Serialize};

use crate::scale::HarmonicFunction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl KeyMode {
    pub fn flipped(self) -> Self {
        match self {
            KeyMode::Major => KeyMode::Minor,
            KeyMode::Minor => KeyMode::Major,
        }
    }
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

impl std::str::FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(KeyMode::Major),
            "minor" => Ok(KeyMode::Minor),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Tonic and mode for a whole piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// Tonic name: "C", "Db", "F#", etc.
    pub tonic: String,
    pub tonic_pitch_class: u8,
    pub mode: KeyMode,
    /// Human-readable key, e.g. "A minor".
    pub display_key: String,
    /// Pearson correlation with the best-matching key profile. Corrected
    /// estimates keep the value of the estimate they replaced.
    pub confidence: f64,
}

impl KeyEstimate {
    pub fn new(
        tonic: impl Into<String>,
        tonic_pitch_class: u8,
        mode: KeyMode,
        confidence: f64,
    ) -> Self {
        let tonic = tonic.into();
        Self {
            display_key: format!("{tonic} {mode}"),
            tonic,
            tonic_pitch_class: tonic_pitch_class % 12,
            mode,
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended4,
    Suspended2,
    Dominant7,
    Major7,
    Minor7,
    MinorMajor7,
    Diminished7,
    HalfDiminished7,
    Major6,
    Minor6,
    Add9,
    Power,
}

impl ChordQuality {
    /// Suffix for chord symbol display
    pub fn suffix(&self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Suspended4 => "sus4",
            ChordQuality::Suspended2 => "sus2",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::MinorMajor7 => "m(maj7)",
            ChordQuality::Diminished7 => "dim7",
            ChordQuality::HalfDiminished7 => "m7b5",
            ChordQuality::Major6 => "6",
            ChordQuality::Minor6 => "m6",
            ChordQuality::Add9 => "add9",
            ChordQuality::Power => "5",
        }
    }

    /// Descriptive name used in chord labels: "major triad", "dominant seventh chord".
    pub fn common_name(&self) -> &'static str {
        match self {
            ChordQuality::Major => "major triad",
            ChordQuality::Minor => "minor triad",
            ChordQuality::Diminished => "diminished triad",
            ChordQuality::Augmented => "augmented triad",
            ChordQuality::Suspended4 => "suspended fourth chord",
            ChordQuality::Suspended2 => "suspended second chord",
            ChordQuality::Dominant7 => "dominant seventh chord",
            ChordQuality::Major7 => "major seventh chord",
            ChordQuality::Minor7 => "minor seventh chord",
            ChordQuality::MinorMajor7 => "minor-major seventh chord",
            ChordQuality::Diminished7 => "diminished seventh chord",
            ChordQuality::HalfDiminished7 => "half-diminished seventh chord",
            ChordQuality::Major6 => "major sixth chord",
            ChordQuality::Minor6 => "minor sixth chord",
            ChordQuality::Add9 => "added ninth chord",
            ChordQuality::Power => "power chord",
        }
    }

    pub fn is_minor(&self) -> bool {
        matches!(
            self,
            ChordQuality::Minor
                | ChordQuality::Minor7
                | ChordQuality::MinorMajor7
                | ChordQuality::Minor6
        )
    }
}

/// One detected chord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    /// Bucket time in seconds.
    pub time: f64,
    /// Distinct pitch names, lowest first: ["C4", "E4", "G4"].
    pub pitches: Vec<String>,
    /// Distinct pitch classes, ascending.
    pub pitch_classes: Vec<u8>,
    /// Full label: "C major triad", or the joined pitch names when no
    /// template fits exactly.
    pub label: String,
    /// Root pitch name without octave.
    pub root: String,
    pub root_pitch_class: u8,
    /// Compact symbol: "C", "Am", "G7".
    pub symbol: String,
    pub quality: Option<ChordQuality>,
    /// Diatonic function once a key is known.
    pub function: Option<HarmonicFunction>,
}

impl ChordEvent {
    /// Whether the chord reads as minor, by template quality or by label.
    pub fn is_minor(&self) -> bool {
        match self.quality {
            Some(quality) => quality.is_minor(),
            None => self.label.contains("minor"),
        }
    }

    /// Function label, "Unknown" until assigned.
    pub fn function_label(&self) -> &'static str {
        self.function.map_or("Unknown", |f| f.numeral())
    }
}
