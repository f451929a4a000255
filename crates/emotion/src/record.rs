//! Dataset rows and their CSV form.
//!
//! Columns: `forteclass_sequence, mode, emotion, num_classes`, then `tonic`
//! and `source_id` when any record carries them.

use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;

/// One labelled training example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Comma-joined Forte-class tokens, e.g. "3-11B,3-11A,4-27B".
    pub forte_sequence: String,
    pub mode: String,
    pub tonic: Option<String>,
    pub emotion: String,
    pub source_id: Option<String>,
}

impl DatasetRecord {
    pub fn new(tokens: &[String], mode: impl Into<String>, emotion: impl Into<String>) -> Self {
        Self {
            forte_sequence: tokens.join(","),
            mode: mode.into(),
            tonic: None,
            emotion: emotion.into(),
            source_id: None,
        }
    }

    pub fn with_tonic(mut self, tonic: impl Into<String>) -> Self {
        self.tonic = Some(tonic.into());
        self
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Non-empty tokens of the sequence, in order.
    pub fn tokens(&self) -> Vec<&str> {
        self.forte_sequence
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn num_classes(&self) -> usize {
        self.tokens().len()
    }

    /// Same labels, different token window.
    pub(crate) fn with_tokens(&self, tokens: &[&str]) -> Self {
        Self {
            forte_sequence: tokens.join(","),
            ..self.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    forteclass_sequence: String,
    mode: String,
    emotion: String,
    #[serde(default)]
    #[allow(dead_code)]
    num_classes: Option<usize>,
    #[serde(default)]
    tonic: Option<String>,
    #[serde(default)]
    source_id: Option<String>,
}

/// Read records from CSV. Rows with an empty sequence or label are dropped.
pub fn read_csv_from<R: Read>(reader: R) -> Result<Vec<DatasetRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    let mut dropped = 0usize;

    for row in csv_reader.deserialize::<CsvRow>() {
        let row = row?;
        if row.forteclass_sequence.is_empty() || row.emotion.is_empty() {
            dropped += 1;
            continue;
        }
        records.push(DatasetRecord {
            forte_sequence: row.forteclass_sequence,
            mode: row.mode,
            tonic: row.tonic.filter(|t| !t.is_empty()),
            emotion: row.emotion,
            source_id: row.source_id.filter(|s| !s.is_empty()),
        });
    }

    if dropped > 0 {
        warn!(dropped, "dropped incomplete dataset rows");
    }
    Ok(records)
}

pub fn read_csv(path: &Path) -> Result<Vec<DatasetRecord>> {
    let records = read_csv_from(std::fs::File::open(path)?)?;
    debug!(path = %path.display(), records = records.len(), "dataset loaded");
    Ok(records)
}

pub fn write_csv_to<W: Write>(writer: W, records: &[DatasetRecord]) -> Result<()> {
    let with_tonic = records.iter().any(|r| r.tonic.is_some());
    let with_source = records.iter().any(|r| r.source_id.is_some());

    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["forteclass_sequence", "mode", "emotion", "num_classes"];
    if with_tonic {
        header.push("tonic");
    }
    if with_source {
        header.push("source_id");
    }
    out.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.forte_sequence.clone(),
            record.mode.clone(),
            record.emotion.clone(),
            record.num_classes().to_string(),
        ];
        if with_tonic {
            row.push(record.tonic.clone().unwrap_or_default());
        }
        if with_source {
            row.push(record.source_id.clone().unwrap_or_default());
        }
        out.write_record(&row)?;
    }
    out.flush()?;
    Ok(())
}

/// Write records to `path`, creating parent directories.
pub fn write_csv(path: &Path, records: &[DatasetRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_csv_to(std::fs::File::create(path)?, records)?;
    debug!(path = %path.display(), records = records.len(), "dataset written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tokens_skip_blanks() {
        let record = DatasetRecord {
            forte_sequence: "3-11B, ,3-11A,".to_string(),
            mode: "major".to_string(),
            tonic: None,
            emotion: "happy".to_string(),
            source_id: None,
        };
        assert_eq!(record.tokens(), vec!["3-11B", "3-11A"]);
        assert_eq!(record.num_classes(), 2);
    }

    #[test]
    fn reads_without_tonic_column() {
        let csv = "forteclass_sequence,mode,emotion,num_classes\n\
                   \"3-11B,3-11A\",major,happy,2\n\
                   ,minor,sad,0\n";
        let records = read_csv_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].forte_sequence, "3-11B,3-11A");
        assert_eq!(records[0].tonic, None);
    }

    #[test]
    fn writes_tonic_column_only_when_present() {
        let tokens = vec!["3-11B".to_string(), "4-27B".to_string()];
        let plain = vec![DatasetRecord::new(&tokens, "major", "warm")];
        let mut buf = Vec::new();
        write_csv_to(&mut buf, &plain).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "forteclass_sequence,mode,emotion,num_classes\n\"3-11B,4-27B\",major,warm,2\n"
        );

        let keyed = vec![DatasetRecord::new(&tokens, "major", "warm").with_tonic("G")];
        let mut buf = Vec::new();
        write_csv_to(&mut buf, &keyed).unwrap();
        let back = read_csv_from(buf.as_slice()).unwrap();
        assert_eq!(back, keyed);
    }
}
