use std::collections::BTreeMap;

use midly::num::{u28, u4, u7};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use serde::{Deserialize, Serialize};

use crate::note::NoteEvent;
use crate::{Error, Result};

const DRUM_CHANNEL: u8 = 9;

/// How notes are laid out in the exported file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Written as a single tempo event. Non-positive values fall back to 120.
    pub bpm: f64,
    pub ppq: u16,
    /// Name of the pitched track, if any.
    pub track_name: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            ppq: 480,
            track_name: None,
        }
    }
}

impl ExportOptions {
    fn tempo(&self) -> f64 {
        if self.bpm.is_finite() && self.bpm > 0.0 {
            self.bpm
        } else {
            120.0
        }
    }

    fn tick_at(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.tempo() / 60.0 * f64::from(self.ppq)).round() as u64
    }
}

/// Notes as format-1 Standard MIDI File bytes.
///
/// The first track only carries tempo and a 4/4 signature. Pitched notes go
/// to channel 1 on the next track; percussive notes, when present, get a
/// track of their own on channel 10.
pub fn notes_to_midi(notes: &[NoteEvent], options: &ExportOptions) -> Result<Vec<u8>> {
    let mut channels: BTreeMap<u8, Vec<&NoteEvent>> = BTreeMap::new();
    for note in notes {
        let channel = if note.instrument_is_percussive { DRUM_CHANNEL } else { 0 };
        channels.entry(channel).or_default().push(note);
    }

    let mut tracks: Vec<Track> = vec![conductor(options)];
    for (channel, notes) in &channels {
        let name = if *channel == DRUM_CHANNEL {
            Some("Drums")
        } else {
            options.track_name.as_deref()
        };
        tracks.push(note_track(notes, *channel, name, options));
    }

    let smf = Smf {
        header: Header::new(Format::Parallel, Timing::Metrical(options.ppq.into())),
        tracks,
    };
    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| Error::MidiWrite(e.to_string()))?;
    Ok(bytes)
}

fn at_start(kind: TrackEventKind<'_>) -> TrackEvent<'_> {
    TrackEvent { delta: 0.into(), kind }
}

fn conductor(options: &ExportOptions) -> Track<'static> {
    let micros_per_beat = (60_000_000.0 / options.tempo()).round() as u32;
    vec![
        at_start(TrackEventKind::Meta(MetaMessage::Tempo(micros_per_beat.into()))),
        at_start(TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8))),
        at_start(TrackEventKind::Meta(MetaMessage::EndOfTrack)),
    ]
}

fn note_track<'a>(
    notes: &[&NoteEvent],
    channel: u8,
    name: Option<&'a str>,
    options: &ExportOptions,
) -> Track<'a> {
    let channel = u4::from(channel);
    // (tick, order within tick, event): releases sort before new onsets.
    let mut timeline: Vec<(u64, u8, TrackEventKind<'a>)> = Vec::with_capacity(notes.len() * 2 + 1);

    if let Some(name) = name {
        timeline.push((0, 0, TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes()))));
    }
    for note in notes {
        let key = u7::from(note.pitch.min(127));
        let vel = u7::from(note.velocity.clamp(1, 127));
        timeline.push((
            options.tick_at(note.end),
            1,
            TrackEventKind::Midi { channel, message: MidiMessage::NoteOff { key, vel: 0.into() } },
        ));
        timeline.push((
            options.tick_at(note.start),
            2,
            TrackEventKind::Midi { channel, message: MidiMessage::NoteOn { key, vel } },
        ));
    }
    timeline.sort_by_key(|(tick, order, _)| (*tick, *order));

    let mut now = 0;
    let mut track: Track<'a> = timeline
        .into_iter()
        .map(|(tick, _, kind)| {
            let delta = u28::from((tick - now).min(0x0FFF_FFFF) as u32);
            now = tick;
            TrackEvent { delta, kind }
        })
        .collect();
    track.push(at_start(TrackEventKind::Meta(MetaMessage::EndOfTrack)));
    track
}
