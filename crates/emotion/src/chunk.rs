//! Splitting long sequences into fixed windows.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::record::DatasetRecord;
use crate::{Error, Result};

/// What happens to a trailing partial window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMode {
    KeepRemainder,
    /// Only full windows survive.
    Strict,
}

/// Window length for a corpus with the given average sequence length.
pub fn window_for_average(average: f64) -> usize {
    const MIN_WINDOW: usize = 12;
    const MAX_WINDOW: usize = 20;

    if average > 60.0 {
        15
    } else if average > 40.0 {
        18
    } else {
        (average.max(0.0).floor() as usize).clamp(MIN_WINDOW, MAX_WINDOW)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    pub window: usize,
    pub mode: ChunkMode,
}

impl Chunker {
    pub fn new(window: usize, mode: ChunkMode) -> Self {
        Self {
            window: window.max(1),
            mode,
        }
    }

    /// Pick the window from the corpus-wide average token count.
    pub fn from_average(records: &[DatasetRecord], mode: ChunkMode) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::NotEnoughData("cannot chunk an empty dataset".into()));
        }
        let total: usize = records.iter().map(DatasetRecord::num_classes).sum();
        let average = total as f64 / records.len() as f64;
        let window = window_for_average(average);
        info!(average = format!("{average:.2}"), window, "chunk window chosen");
        Ok(Self::new(window, mode))
    }

    /// Records no longer than the window pass through unchanged; longer
    /// ones become consecutive non-overlapping windows.
    pub fn chunk(&self, records: &[DatasetRecord]) -> Vec<DatasetRecord> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let tokens = record.tokens();
            if tokens.len() <= self.window {
                out.push(record.clone());
                continue;
            }
            for window in tokens.chunks(self.window) {
                if window.len() < self.window && self.mode == ChunkMode::Strict {
                    continue;
                }
                out.push(record.with_tokens(window));
            }
        }
        info!(
            before = records.len(),
            after = out.len(),
            window = self.window,
            "dataset chunked"
        );
        out
    }
}
