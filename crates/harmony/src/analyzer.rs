use std::collections::BTreeMap;
use std::sync::Arc;

use midi_analysis::{quantize, NoteEvent, ProgressionOptions, QuantizeParams};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chords::{detect_chords, ChordParams};
use crate::correction::correct_key;
use crate::forte::forte_sequence;
use crate::key::estimate_key;
use crate::scale::ScaleInfo;
use crate::tempo::TempoDescriptor;
use crate::types::{ChordEvent, KeyEstimate};
use crate::{Error, Result, SkipReason};

/// Predicted emotion for a progression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    /// Winning label.
    pub content: String,
    pub probabilities: BTreeMap<String, f64>,
    pub description: String,
}

/// Emotion backend consulted after harmonic analysis.
///
/// Implementations are shared across threads and must allow concurrent
/// calls without locking.
pub trait EmotionClassifier: Send + Sync {
    fn classify(
        &self,
        forte_sequence: &[String],
        key: &KeyEstimate,
    ) -> anyhow::Result<EmotionReading>;
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub quantize: QuantizeParams,
    pub chords: ChordParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSummary {
    /// Compact symbol: "Am".
    pub chord: String,
    /// Full label: "A minor triad".
    pub name: String,
    pub notes: Vec<String>,
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleChord {
    pub function: String,
    pub chord: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleSummary {
    pub exists: bool,
    pub chords: Vec<ScaleChord>,
}

impl From<&ScaleInfo> for ScaleSummary {
    fn from(scale: &ScaleInfo) -> Self {
        Self {
            exists: scale.exists,
            chords: scale
                .degree_chords
                .iter()
                .map(|d| ScaleChord {
                    function: d.function.numeral().to_string(),
                    chord: d.symbol(),
                    name: d.name(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeScale {
    pub key_name: String,
    pub tonic: String,
    pub notes: Vec<String>,
    pub scale: ScaleSummary,
}

/// The progression result handed to presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionResult {
    pub chords: Vec<ChordSummary>,
    /// Root of the opening chord.
    pub root_note: String,
    pub key_name: String,
    pub tonic: String,
    pub scale: ScaleSummary,
    pub relative_scales: Vec<RelativeScale>,
    pub emotion: Option<EmotionReading>,
    pub tempo: TempoDescriptor,
}

/// Everything one analysis pass produced.
#[derive(Debug, Clone)]
pub struct ProgressionReport {
    pub result: ProgressionResult,
    pub progression: Vec<ChordEvent>,
    pub forte_sequence: Vec<String>,
    /// Key as estimated from the note profile, before correction.
    pub estimated_key: KeyEstimate,
    pub key: KeyEstimate,
    pub scale: ScaleInfo,
    /// Per-event problems that were skipped.
    pub warnings: Vec<String>,
}

/// Runs the full harmonic pipeline on one note collection at a time.
///
/// Holds no per-analysis state, so a single analyzer can serve concurrent
/// callers.
#[derive(Clone, Default)]
pub struct ProgressionAnalyzer {
    params: AnalysisParams,
    classifier: Option<Arc<dyn EmotionClassifier>>,
}

impl ProgressionAnalyzer {
    pub fn new(params: AnalysisParams) -> Self {
        Self {
            params,
            classifier: None,
        }
    }

    /// Attach an emotion backend; without one `emotion` stays empty.
    pub fn with_classifier(mut self, classifier: Arc<dyn EmotionClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Analyze Standard MIDI File bytes.
    ///
    /// Chords are detected within each pitched instrument; notes from
    /// different instruments never form a chord together.
    pub fn analyze_midi(&self, bytes: &[u8]) -> Result<ProgressionReport> {
        let decoded = midi_analysis::decode(bytes)?;
        info!(
            instruments = decoded.instruments.len(),
            bpm = decoded.bpm(),
            "analyzing MIDI"
        );
        let tracks: Vec<&[NoteEvent]> = decoded
            .instruments
            .iter()
            .filter(|i| !i.is_percussive)
            .map(|i| i.notes.as_slice())
            .collect();
        self.analyze_tracks(&tracks, decoded.bpm())
    }

    /// Analyze a typed progression such as `"C - G - Am - F"`.
    pub fn analyze_progression(
        &self,
        text: &str,
        options: &ProgressionOptions,
    ) -> Result<ProgressionReport> {
        let bytes = midi_analysis::progression_to_midi(text, options)?;
        self.analyze_midi(&bytes)
    }

    /// Analyze several files, one outcome per input. A failing file does
    /// not stop the rest.
    pub fn analyze_batch<'a>(
        &self,
        inputs: impl IntoIterator<Item = (&'a str, &'a [u8])>,
    ) -> Vec<(String, Result<ProgressionReport>)> {
        inputs
            .into_iter()
            .map(|(source, bytes)| {
                let outcome = self.analyze_midi(bytes);
                if let Err(e) = &outcome {
                    warn!(source, error = %e, "analysis failed");
                }
                (source.to_string(), outcome)
            })
            .collect()
    }

    /// Analyze one already-decoded note collection as a single track.
    pub fn analyze_notes(&self, notes: &[NoteEvent], bpm: f64) -> Result<ProgressionReport> {
        self.analyze_tracks(&[notes], bpm)
    }

    /// Analyze notes grouped by track.
    ///
    /// Each track is quantized and searched for chords on its own. The
    /// progressions are joined in track order, dropping a chord that repeats
    /// the one before it across a join. The key is estimated from all tracks.
    pub fn analyze_tracks(&self, tracks: &[&[NoteEvent]], bpm: f64) -> Result<ProgressionReport> {
        let mut progression: Vec<ChordEvent> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut buckets = 0;

        for (index, notes) in tracks.iter().enumerate() {
            let quantized = quantize(notes, &self.params.quantize)?;
            buckets += quantized.len();
            let detection = detect_chords(&quantized, &self.params.chords);
            debug!(track = index, chords = detection.chords.len(), "track scanned");

            warnings.extend(
                detection
                    .skipped
                    .iter()
                    .filter(|(_, reason)| !matches!(reason, SkipReason::TooFewPitches { .. }))
                    .map(|(time, reason)| format!("{time:.2}s: {reason}")),
            );

            let mut chords = detection.chords.into_iter();
            let repeats = matches!(
                (progression.last(), chords.as_slice().first()),
                (Some(last), Some(first)) if last.label == first.label
            );
            if repeats {
                chords.next();
            }
            progression.extend(chords);
        }

        if progression.is_empty() {
            info!(tracks = tracks.len(), buckets, "no chords found");
            return Err(Error::NoProgression);
        }

        let (sequence, unclassified) = forte_sequence(&progression);
        warnings.extend(
            unclassified
                .iter()
                .map(|(time, reason)| format!("{time:.2}s: {reason}")),
        );
        if sequence.is_empty() {
            return Err(Error::NoProgression);
        }

        let all_notes: Vec<NoteEvent> = tracks.iter().flat_map(|t| t.iter().cloned()).collect();
        let estimated_key = estimate_key(&all_notes);
        let key = correct_key(&estimated_key, &progression);
        let scale = ScaleInfo::for_key(&key)
            .ok_or_else(|| Error::UnknownPitchName(key.tonic.clone()))?;

        for chord in &mut progression {
            chord.function = Some(scale.function_of(&chord.root));
        }

        debug!(
            chords = progression.len(),
            forte = sequence.len(),
            key = %key.display_key,
            "harmony extracted"
        );

        let emotion = match &self.classifier {
            Some(classifier) => Some(
                classifier
                    .classify(&sequence, &key)
                    .map_err(|e| Error::Classifier(format!("{e:#}")))?,
            ),
            None => None,
        };

        let relative_scales = scale
            .relative()
            .map(|relative| RelativeScale {
                key_name: relative.display_key(),
                tonic: relative.tonic.clone(),
                notes: relative.notes.clone(),
                scale: ScaleSummary::from(&relative),
            })
            .into_iter()
            .collect();

        let result = ProgressionResult {
            chords: progression
                .iter()
                .map(|c| ChordSummary {
                    chord: c.symbol.clone(),
                    name: c.label.clone(),
                    notes: c.pitches.clone(),
                    function: c.function_label().to_string(),
                })
                .collect(),
            root_note: progression[0].root.clone(),
            key_name: key.display_key.clone(),
            tonic: key.tonic.clone(),
            scale: ScaleSummary::from(&scale),
            relative_scales,
            emotion,
            tempo: TempoDescriptor::from_bpm(bpm),
        };

        info!(
            key = %key.display_key,
            chords = progression.len(),
            warnings = warnings.len(),
            "progression analyzed"
        );

        Ok(ProgressionReport {
            result,
            progression,
            forte_sequence: sequence,
            estimated_key,
            key,
            scale,
            warnings,
        })
    }
}
