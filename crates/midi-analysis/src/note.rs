use serde::{Deserialize, Serialize};

/// A single sounded note, timed in seconds.
///
/// Produced by [`crate::decode`] (or any other upstream source such as an
/// audio transcription model) and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI note number (60 = C4).
    pub pitch: u8,
    pub start: f64,
    pub end: f64,
    pub velocity: u8,
    pub instrument_is_percussive: bool,
}

impl NoteEvent {
    pub fn new(pitch: u8, start: f64, end: f64, velocity: u8) -> Self {
        Self {
            pitch,
            start,
            end,
            velocity,
            instrument_is_percussive: false,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Sort notes by onset, then pitch, so downstream passes see a stable order.
pub fn sort_chronologically(notes: &mut [NoteEvent]) {
    notes.sort_by(|a, b| {
        a.start
            .total_cmp(&b.start)
            .then(a.pitch.cmp(&b.pitch))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_never_negative() {
        let note = NoteEvent::new(60, 1.0, 0.5, 80);
        assert_eq!(note.duration(), 0.0);
    }

    #[test]
    fn chronological_sort_breaks_ties_by_pitch() {
        let mut notes = vec![
            NoteEvent::new(67, 0.0, 1.0, 80),
            NoteEvent::new(60, 0.5, 1.0, 80),
            NoteEvent::new(64, 0.0, 1.0, 80),
        ];
        sort_chronologically(&mut notes);
        let pitches: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![64, 67, 60]);
    }
}
