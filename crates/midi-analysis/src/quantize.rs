use crate::note::NoteEvent;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grid and noise-suppression thresholds for [`quantize`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizeParams {
    /// Bucket width in seconds.
    pub bucket_width: f64,
    pub min_velocity: u8,
    /// Minimum note duration in seconds.
    pub min_duration: f64,
}

impl Default for QuantizeParams {
    fn default() -> Self {
        Self {
            bucket_width: 0.2,
            min_velocity: 35,
            min_duration: 0.05,
        }
    }
}

impl QuantizeParams {
    fn validate(&self) -> Result<()> {
        if !self.bucket_width.is_finite() || self.bucket_width <= 0.0 {
            return Err(Error::InvalidParams(format!(
                "bucket width must be positive, got {}",
                self.bucket_width
            )));
        }
        if !self.min_duration.is_finite() || self.min_duration < 0.0 {
            return Err(Error::InvalidParams(format!(
                "minimum duration must be non-negative, got {}",
                self.min_duration
            )));
        }
        Ok(())
    }

    fn admits(&self, note: &NoteEvent) -> bool {
        !note.instrument_is_percussive
            && note.velocity >= self.min_velocity
            && note.duration() >= self.min_duration
    }
}

/// Pitches whose onsets round to the same grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub time: f64,
    /// MIDI pitches in input order; unisons are kept.
    pub pitches: Vec<u8>,
}

/// Group notes into time buckets sorted by time.
///
/// Percussive notes and notes quieter or shorter than the thresholds are
/// dropped. Each surviving note lands in the bucket
/// `round(start / width) * width`.
pub fn quantize(notes: &[NoteEvent], params: &QuantizeParams) -> Result<Vec<TimeBucket>> {
    params.validate()?;

    let mut buckets: BTreeMap<i64, Vec<u8>> = BTreeMap::new();
    for note in notes.iter().filter(|n| params.admits(n)) {
        let index = (note.start / params.bucket_width).round() as i64;
        buckets.entry(index).or_default().push(note.pitch);
    }

    Ok(buckets
        .into_iter()
        .map(|(index, pitches)| TimeBucket {
            time: index as f64 * params.bucket_width,
            pitches,
        })
        .collect())
}
