//! Diatonic scales, degree triads and harmonic functions.

use serde::{Deserialize, Serialize};

use crate::correction::relative_key;
use crate::pitch::{parse_spelling, pitch_class_of, spell, Spelling, LETTER_PCS};
use crate::types::{KeyEstimate, KeyMode};

const MAJOR_STEPS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
const NATURAL_MINOR_STEPS: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];

const MAJOR_TRIADS: [TriadQuality; 7] = [
    TriadQuality::Major,
    TriadQuality::Minor,
    TriadQuality::Minor,
    TriadQuality::Major,
    TriadQuality::Major,
    TriadQuality::Minor,
    TriadQuality::Diminished,
];

const MINOR_TRIADS: [TriadQuality; 7] = [
    TriadQuality::Minor,
    TriadQuality::Diminished,
    TriadQuality::Major,
    TriadQuality::Minor,
    TriadQuality::Minor,
    TriadQuality::Major,
    TriadQuality::Major,
];

/// Function of a chord root within a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmonicFunction {
    Tonic,
    Supertonic,
    Mediant,
    Subdominant,
    Dominant,
    Submediant,
    LeadingTone,
    OutOfScale,
}

impl HarmonicFunction {
    pub const DEGREES: [HarmonicFunction; 7] = [
        HarmonicFunction::Tonic,
        HarmonicFunction::Supertonic,
        HarmonicFunction::Mediant,
        HarmonicFunction::Subdominant,
        HarmonicFunction::Dominant,
        HarmonicFunction::Submediant,
        HarmonicFunction::LeadingTone,
    ];

    pub fn numeral(&self) -> &'static str {
        match self {
            HarmonicFunction::Tonic => "I",
            HarmonicFunction::Supertonic => "II",
            HarmonicFunction::Mediant => "III",
            HarmonicFunction::Subdominant => "IV",
            HarmonicFunction::Dominant => "V",
            HarmonicFunction::Submediant => "VI",
            HarmonicFunction::LeadingTone => "VII",
            HarmonicFunction::OutOfScale => "Out of scale",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HarmonicFunction::Tonic => "Tonic",
            HarmonicFunction::Supertonic => "Supertonic",
            HarmonicFunction::Mediant => "Mediant",
            HarmonicFunction::Subdominant => "Subdominant",
            HarmonicFunction::Dominant => "Dominant",
            HarmonicFunction::Submediant => "Submediant",
            HarmonicFunction::LeadingTone => "Leading tone",
            HarmonicFunction::OutOfScale => "Out of scale",
        }
    }
}

impl std::fmt::Display for HarmonicFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.numeral())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriadQuality {
    Major,
    Minor,
    Diminished,
}

impl TriadQuality {
    pub fn suffix(&self) -> &'static str {
        match self {
            TriadQuality::Major => "",
            TriadQuality::Minor => "m",
            TriadQuality::Diminished => "dim",
        }
    }

    pub fn common_name(&self) -> &'static str {
        match self {
            TriadQuality::Major => "major triad",
            TriadQuality::Minor => "minor triad",
            TriadQuality::Diminished => "diminished triad",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeChord {
    pub function: HarmonicFunction,
    pub root: String,
    pub root_pitch_class: u8,
    pub quality: TriadQuality,
}

impl DegreeChord {
    /// Compact symbol: "Dm", "Bdim".
    pub fn symbol(&self) -> String {
        format!("{}{}", self.root, self.quality.suffix())
    }

    /// Descriptive name: "D minor triad".
    pub fn name(&self) -> String {
        format!("{} {}", self.root, self.quality.common_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleInfo {
    pub tonic: String,
    pub mode: KeyMode,
    /// False when the tonic cannot be spelled as a standard key signature
    /// (a degree would need a double sharp or double flat).
    pub exists: bool,
    pub notes: Vec<String>,
    pub degree_chords: Vec<DegreeChord>,
}

impl ScaleInfo {
    /// Build the diatonic scale of a key, spelled one letter per degree.
    ///
    /// Returns `None` when the tonic is not a note name.
    pub fn for_key(key: &KeyEstimate) -> Option<Self> {
        Self::build(&key.tonic, key.mode)
    }

    pub fn build(tonic: &str, mode: KeyMode) -> Option<Self> {
        let tonic_spelling = parse_spelling(tonic)?;
        let tonic_pc = tonic_spelling.pitch_class() as i32;
        let (steps, triads) = match mode {
            KeyMode::Major => (MAJOR_STEPS, MAJOR_TRIADS),
            KeyMode::Minor => (NATURAL_MINOR_STEPS, MINOR_TRIADS),
        };

        let mut exists = true;
        let mut notes = Vec::with_capacity(7);
        let mut degree_chords = Vec::with_capacity(7);

        for (degree, (&step, &quality)) in steps.iter().zip(triads.iter()).enumerate() {
            let letter = (tonic_spelling.letter + degree) % 7;
            let target = (tonic_pc + step).rem_euclid(12);
            let mut accidental = (target - LETTER_PCS[letter]).rem_euclid(12);
            if accidental > 6 {
                accidental -= 12;
            }
            if accidental.abs() > 1 {
                exists = false;
            }

            let root = spell(Spelling { letter, accidental });
            degree_chords.push(DegreeChord {
                function: HarmonicFunction::DEGREES[degree],
                root: root.clone(),
                root_pitch_class: target as u8,
                quality,
            });
            notes.push(root);
        }

        Some(Self {
            tonic: spell(tonic_spelling),
            mode,
            exists,
            notes,
            degree_chords,
        })
    }

    /// Function of a chord root in this scale.
    ///
    /// Roots are compared by pitch class, so enharmonic spellings match.
    /// Anything that is not a scale member, including names that do not
    /// parse, is [`HarmonicFunction::OutOfScale`].
    pub fn function_of(&self, root_note: &str) -> HarmonicFunction {
        let Some(pc) = pitch_class_of(root_note) else {
            return HarmonicFunction::OutOfScale;
        };
        self.degree_chords
            .iter()
            .find(|d| d.root_pitch_class == pc)
            .map_or(HarmonicFunction::OutOfScale, |d| d.function)
    }

    /// The other mode sharing this scale's pitch collection.
    pub fn relative(&self) -> Option<ScaleInfo> {
        let key = relative_key(&self.tonic, self.mode)?;
        ScaleInfo::build(&key.tonic, key.mode)
    }

    pub fn display_key(&self) -> String {
        format!("{} {}", self.tonic, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::NOTE_NAMES_SHARP;
    use pretty_assertions::assert_eq;

    fn scale(tonic: &str, mode: KeyMode) -> ScaleInfo {
        ScaleInfo::build(tonic, mode).unwrap()
    }

    #[test]
    fn c_major() {
        let s = scale("C", KeyMode::Major);
        assert!(s.exists);
        assert_eq!(s.notes, vec!["C", "D", "E", "F", "G", "A", "B"]);
        let symbols: Vec<String> = s.degree_chords.iter().map(|d| d.symbol()).collect();
        assert_eq!(symbols, vec!["C", "Dm", "Em", "F", "G", "Am", "Bdim"]);
    }

    #[test]
    fn minor_keys_use_natural_minor() {
        let s = scale("G", KeyMode::Minor);
        assert_eq!(s.notes, vec!["G", "A", "Bb", "C", "D", "Eb", "F"]);
        let symbols: Vec<String> = s.degree_chords.iter().map(|d| d.symbol()).collect();
        assert_eq!(symbols, vec!["Gm", "Adim", "Bb", "Cm", "Dm", "Eb", "F"]);
    }

    #[test]
    fn sharp_and_flat_keys_are_spelled_by_letter() {
        assert_eq!(
            scale("F#", KeyMode::Major).notes,
            vec!["F#", "G#", "A#", "B", "C#", "D#", "E#"]
        );
        assert_eq!(scale("Db", KeyMode::Major).notes, vec!["Db", "Eb", "F", "Gb", "Ab", "Bb", "C"]);
    }

    #[test]
    fn theoretical_keys_do_not_exist() {
        let s = scale("A#", KeyMode::Major);
        assert!(!s.exists);
        assert_eq!(s.notes[6], "G##");
        assert!(scale("D#", KeyMode::Minor).exists);
    }

    #[test]
    fn function_of_scale_members() {
        let s = scale("C", KeyMode::Major);
        assert_eq!(s.function_of("C"), HarmonicFunction::Tonic);
        assert_eq!(s.function_of("G"), HarmonicFunction::Dominant);
        assert_eq!(s.function_of("B"), HarmonicFunction::LeadingTone);
        assert_eq!(s.function_of("Cb"), HarmonicFunction::LeadingTone);
        assert_eq!(s.function_of("F#"), HarmonicFunction::OutOfScale);
        assert_eq!(s.function_of("nonsense"), HarmonicFunction::OutOfScale);
    }

    #[test]
    fn function_of_is_total() {
        for mode in [KeyMode::Major, KeyMode::Minor] {
            for tonic in NOTE_NAMES_SHARP {
                let s = scale(tonic, mode);
                let mut in_scale = 0;
                for name in NOTE_NAMES_SHARP {
                    let f = s.function_of(name);
                    if f != HarmonicFunction::OutOfScale {
                        in_scale += 1;
                        assert!(HarmonicFunction::DEGREES.contains(&f));
                    }
                }
                assert_eq!(in_scale, 7, "{tonic} {mode}");
            }
        }
    }

    #[test]
    fn relative_scale_shares_pitches() {
        let c = scale("C", KeyMode::Major);
        let a = c.relative().unwrap();
        assert_eq!(a.display_key(), "A minor");
        let mut c_pcs: Vec<u8> = c.degree_chords.iter().map(|d| d.root_pitch_class).collect();
        let mut a_pcs: Vec<u8> = a.degree_chords.iter().map(|d| d.root_pitch_class).collect();
        c_pcs.sort_unstable();
        a_pcs.sort_unstable();
        assert_eq!(c_pcs, a_pcs);
    }

    #[test]
    fn numerals() {
        assert_eq!(HarmonicFunction::Submediant.to_string(), "VI");
        assert_eq!(HarmonicFunction::OutOfScale.to_string(), "Out of scale");
    }
}
