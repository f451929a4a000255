use crate::note::{sort_chronologically, NoteEvent};
use crate::{Error, Result};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const DEFAULT_USEC_PER_BEAT: u32 = 500_000;
const PERCUSSION_CHANNEL: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,
    pub microseconds_per_beat: u32,
}

impl TempoChange {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.microseconds_per_beat as f64
    }
}

/// Tick → seconds conversion for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TempoMap {
    /// Pulses per quarter note with a piecewise-constant tempo.
    Metrical {
        ppq: u16,
        changes: Vec<TempoChange>,
    },
    /// SMPTE timing: fixed ticks per second, tempo events ignored.
    Timecode { ticks_per_second: f64 },
}

impl TempoMap {
    fn metrical(ppq: u16, mut changes: Vec<TempoChange>) -> Self {
        changes.sort_by_key(|c| c.tick);
        // Format 1 files often repeat the tempo on every track.
        changes.dedup_by(|a, b| a.tick == b.tick);
        if changes.first().map_or(true, |c| c.tick > 0) {
            changes.insert(
                0,
                TempoChange {
                    tick: 0,
                    microseconds_per_beat: DEFAULT_USEC_PER_BEAT,
                },
            );
        }
        TempoMap::Metrical { ppq, changes }
    }

    pub fn seconds_at(&self, tick: u64) -> f64 {
        match self {
            TempoMap::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
            TempoMap::Metrical { ppq, changes } => {
                let ppq = (*ppq).max(1) as f64;
                let mut seconds = 0.0;
                let mut last_tick = 0u64;
                let mut usec = DEFAULT_USEC_PER_BEAT;
                for change in changes {
                    if change.tick >= tick {
                        break;
                    }
                    seconds += (change.tick - last_tick) as f64 * usec as f64 / ppq / 1e6;
                    last_tick = change.tick;
                    usec = change.microseconds_per_beat;
                }
                seconds + (tick - last_tick) as f64 * usec as f64 / ppq / 1e6
            }
        }
    }

    /// Tempo in effect at the start of the file.
    pub fn initial_bpm(&self) -> Option<f64> {
        match self {
            TempoMap::Metrical { changes, .. } => changes.first().map(TempoChange::bpm),
            TempoMap::Timecode { .. } => None,
        }
    }
}

/// Notes of a single instrument: one (track, channel) pair of the source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentTrack {
    pub track_index: usize,
    pub channel: u8,
    pub name: Option<String>,
    pub program: Option<u8>,
    pub is_percussive: bool,
    pub notes: Vec<NoteEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedMidi {
    pub instruments: Vec<InstrumentTrack>,
    pub tempo: TempoMap,
    pub duration_seconds: f64,
}

impl DecodedMidi {
    /// Estimated tempo, falling back to 120 when the file carries none.
    pub fn bpm(&self) -> f64 {
        self.tempo.initial_bpm().unwrap_or(120.0)
    }

    /// All pitched notes across every non-percussive instrument, in time order.
    pub fn pitched_notes(&self) -> Vec<NoteEvent> {
        let mut notes: Vec<NoteEvent> = self
            .instruments
            .iter()
            .filter(|i| !i.is_percussive)
            .flat_map(|i| i.notes.iter().cloned())
            .collect();
        sort_chronologically(&mut notes);
        notes
    }
}

struct PendingNote {
    onset: u64,
    velocity: u8,
}

struct RawNote {
    track: usize,
    channel: u8,
    pitch: u8,
    velocity: u8,
    onset: u64,
    offset: u64,
}

/// Decode Standard MIDI File bytes into per-instrument notes timed in seconds.
pub fn decode(bytes: &[u8]) -> Result<DecodedMidi> {
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    let mut tempo_changes = Vec::new();
    let mut raw_notes = Vec::new();
    let mut names: HashMap<usize, String> = HashMap::new();
    let mut programs: HashMap<(usize, u8), u8> = HashMap::new();

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut current_tick: u64 = 0;
        let mut pending: HashMap<(u8, u8), Vec<PendingNote>> = HashMap::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    tempo_changes.push(TempoChange {
                        tick: current_tick,
                        microseconds_per_beat: tempo.as_int(),
                    });
                }
                TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                    if let Ok(name) = String::from_utf8(bytes.to_vec()) {
                        names.insert(track_index, name);
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::ProgramChange { program } => {
                            programs.entry((track_index, ch)).or_insert(program.as_int());
                        }
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            pending.entry((ch, key.as_int())).or_default().push(PendingNote {
                                onset: current_tick,
                                velocity: vel.as_int(),
                            });
                        }
                        // Note-on with zero velocity is a note-off.
                        MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                            let slot = (ch, key.as_int());
                            if let Some(open) = pending.get_mut(&slot).and_then(Vec::pop) {
                                raw_notes.push(RawNote {
                                    track: track_index,
                                    channel: ch,
                                    pitch: slot.1,
                                    velocity: open.velocity,
                                    onset: open.onset,
                                    offset: current_tick,
                                });
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        // Close anything still sounding at the end of the track.
        for ((ch, pitch), stack) in pending {
            for open in stack {
                raw_notes.push(RawNote {
                    track: track_index,
                    channel: ch,
                    pitch,
                    velocity: open.velocity,
                    onset: open.onset,
                    offset: current_tick,
                });
            }
        }
    }

    if raw_notes.is_empty() {
        return Err(Error::EmptyFile);
    }

    let tempo = match smf.header.timing {
        Timing::Metrical(ppq) => TempoMap::metrical(ppq.as_int(), tempo_changes),
        Timing::Timecode(fps, subframes) => TempoMap::Timecode {
            ticks_per_second: (fps.as_f32() as f64 * subframes.max(1) as f64),
        },
    };

    let mut grouped: BTreeMap<(usize, u8), Vec<NoteEvent>> = BTreeMap::new();
    let mut duration_seconds: f64 = 0.0;
    for raw in raw_notes {
        let start = tempo.seconds_at(raw.onset);
        let end = tempo.seconds_at(raw.offset);
        duration_seconds = duration_seconds.max(end);
        grouped.entry((raw.track, raw.channel)).or_default().push(NoteEvent {
            pitch: raw.pitch,
            start,
            end,
            velocity: raw.velocity,
            instrument_is_percussive: raw.channel == PERCUSSION_CHANNEL,
        });
    }

    let instruments: Vec<InstrumentTrack> = grouped
        .into_iter()
        .map(|((track_index, channel), mut notes)| {
            sort_chronologically(&mut notes);
            InstrumentTrack {
                track_index,
                channel,
                name: names.get(&track_index).cloned(),
                program: programs.get(&(track_index, channel)).copied(),
                is_percussive: channel == PERCUSSION_CHANNEL,
                notes,
            }
        })
        .collect();

    debug!(
        instruments = instruments.len(),
        duration = duration_seconds,
        "decoded MIDI"
    );

    Ok(DecodedMidi {
        instruments,
        tempo,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tempo_map_defaults_to_120_bpm() {
        let map = TempoMap::metrical(480, vec![]);
        assert!((map.seconds_at(480) - 0.5).abs() < 1e-9);
        assert_eq!(map.initial_bpm(), Some(120.0));
    }

    #[test]
    fn tempo_map_handles_mid_file_change() {
        let map = TempoMap::metrical(
            480,
            vec![
                TempoChange {
                    tick: 0,
                    microseconds_per_beat: 500_000,
                },
                TempoChange {
                    tick: 960,
                    microseconds_per_beat: 1_000_000,
                },
            ],
        );
        // Two beats at 120 bpm, then one beat at 60 bpm.
        assert!((map.seconds_at(1440) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn timecode_ignores_tempo() {
        let map = TempoMap::Timecode {
            ticks_per_second: 1000.0,
        };
        assert!((map.seconds_at(2500) - 2.5).abs() < 1e-9);
        assert_eq!(map.initial_bpm(), None);
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let err = decode(b"not a midi file").unwrap_err();
        assert!(matches!(err, Error::MidiParse(_)));
    }
}
