//! Building a labelled dataset from a directory of XMIDI files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chordconf::ChordConfig;
use harmony::{AnalysisParams, ChordParams, ProgressionAnalyzer};
use midi_analysis::QuantizeParams;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::record::{write_csv, DatasetRecord};
use crate::{Error, Result};

/// Parts of an `XMIDI_<emotion>_<genre>_<id>.mid` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmidiName {
    pub emotion: String,
    pub genre: String,
    pub id: String,
}

pub fn parse_file_name(name: &str) -> Option<XmidiName> {
    let (stem, ext) = name.rsplit_once('.')?;
    if !(ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi")) {
        return None;
    }
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 4 || !parts[0].eq_ignore_ascii_case("xmidi") {
        return None;
    }
    Some(XmidiName {
        emotion: parts[1].to_lowercase(),
        genre: parts[2].to_lowercase(),
        id: parts[3..].join("_"),
    })
}

/// Analysis parameters from the `[quantizer]` and `[chords]` sections.
pub fn analysis_params(config: &ChordConfig) -> AnalysisParams {
    AnalysisParams {
        quantize: QuantizeParams {
            bucket_width: config.quantizer.bucket_width,
            min_velocity: config.quantizer.min_velocity,
            min_duration: config.quantizer.min_duration,
        },
        chords: ChordParams {
            min_distinct_pitches: config.chords.min_distinct_pitches,
        },
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    pub records: Vec<DatasetRecord>,
    /// File name and reason for every file that produced no record.
    pub errors: Vec<(String, String)>,
}

enum FileOutcome {
    Record(DatasetRecord),
    Failed(String, String),
    Ignored,
}

pub struct DatasetBuilder {
    analyzer: ProgressionAnalyzer,
    allowed: BTreeSet<String>,
}

impl DatasetBuilder {
    pub fn new<I, S>(params: AnalysisParams, allowed_emotions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            analyzer: ProgressionAnalyzer::new(params),
            allowed: allowed_emotions
                .into_iter()
                .map(|e| e.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &ChordConfig) -> Self {
        Self::new(analysis_params(config), &config.training.emotions)
    }

    /// Analyze every `.mid`/`.midi` file in `dir`, in name order. Files
    /// that fail are reported in [`BuildOutcome::errors`] and skipped.
    pub fn build(&self, dir: &Path) -> Result<BuildOutcome> {
        if !dir.is_dir() {
            return Err(Error::Dataset(format!("MIDI folder not found: {}", dir.display())));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| {
                        e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi")
                    })
            })
            .collect();
        paths.sort();
        info!(dir = %dir.display(), files = paths.len(), "building dataset");

        let outcomes: Vec<FileOutcome> = paths.par_iter().map(|path| self.process(path)).collect();

        let mut outcome = BuildOutcome::default();
        for file in outcomes {
            match file {
                FileOutcome::Record(record) => outcome.records.push(record),
                FileOutcome::Failed(name, reason) => outcome.errors.push((name, reason)),
                FileOutcome::Ignored => {}
            }
        }

        if !outcome.errors.is_empty() {
            warn!(
                failed = outcome.errors.len(),
                first = ?outcome.errors.first(),
                "some files were skipped"
            );
        }
        info!(records = outcome.records.len(), "dataset built");
        Ok(outcome)
    }

    /// [`build`](Self::build) and write the records to `out`.
    pub fn build_to_csv(&self, dir: &Path, out: &Path) -> Result<BuildOutcome> {
        let outcome = self.build(dir)?;
        write_csv(out, &outcome.records)?;
        Ok(outcome)
    }

    fn process(&self, path: &Path) -> FileOutcome {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(name) = parse_file_name(&file_name) else {
            let reason = "file name does not match XMIDI_<emotion>_<genre>_<id>";
            return FileOutcome::Failed(file_name, reason.into());
        };
        if !self.allowed.contains(&name.emotion) {
            debug!(file = %file_name, emotion = %name.emotion, "emotion not selected");
            return FileOutcome::Ignored;
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return FileOutcome::Failed(file_name, e.to_string()),
        };
        let report = match self.analyzer.analyze_midi(&bytes) {
            Ok(report) => report,
            Err(harmony::Error::NoProgression) => {
                return FileOutcome::Failed(file_name, "empty chord sequence".into())
            }
            Err(e) => return FileOutcome::Failed(file_name, e.to_string()),
        };

        let mode = report.key.mode.to_string();
        let record = DatasetRecord::new(&report.forte_sequence, mode, name.emotion)
            .with_tonic(report.key.tonic.clone())
            .with_source(format!("{}_{}", name.genre, name.id));
        FileOutcome::Record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_xmidi_names() {
        assert_eq!(
            parse_file_name("XMIDI_Happy_pop_ABC123.midi"),
            Some(XmidiName {
                emotion: "happy".into(),
                genre: "pop".into(),
                id: "ABC123".into(),
            })
        );
        assert_eq!(parse_file_name("xmidi_sad_jazz_a_b.MID").map(|n| n.id), Some("a_b".into()));
        assert_eq!(parse_file_name("song_sad_jazz_1.mid"), None);
        assert_eq!(parse_file_name("XMIDI_sad_jazz.mid"), None);
        assert_eq!(parse_file_name("XMIDI_sad_jazz_1.wav"), None);
    }

    #[test]
    fn params_follow_config() {
        let mut config = ChordConfig::default();
        config.quantizer.bucket_width = 0.25;
        config.chords.min_distinct_pitches = 3;
        let params = analysis_params(&config);
        assert_eq!(params.quantize.bucket_width, 0.25);
        assert_eq!(params.chords.min_distinct_pitches, 3);
    }

    #[test]
    fn missing_folder_is_an_error() {
        let builder = DatasetBuilder::new(AnalysisParams::default(), ["happy"]);
        let err = builder.build(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }
}
