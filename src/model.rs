//! Data model for both sides of the conversion.
//!
//! The symbolic side mirrors the JSON wire format (camelCase field
//! names); the timed side is the in-memory form of a Standard MIDI File
//! with note times in absolute seconds.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// Symbolic document (JSON side)
// ═══════════════════════════════════════════════════════════════════════

/// A complete symbolic score for one instrument part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreDocument {
    /// Key signature name (e.g. "C", "F#", "Bbm")
    pub key_signature: String,
    /// Tempo in quarter-note beats per minute
    pub tempo: f64,
    /// Time signature
    pub time_signature: TimeSignature,
    /// Simplified instrument name (e.g. "piano", "guitar")
    pub instrument: String,
    /// Requested MIDI channel, as a numeric string
    pub midi_channel: String,
    /// Measures, each an unordered collection of note events.
    /// Processing order within a measure is by lexicographic id sort.
    pub measures: Vec<Vec<NoteEvent>>,
}

impl Default for ScoreDocument {
    fn default() -> Self {
        Self {
            key_signature: "C".to_string(),
            tempo: 120.0,
            time_signature: TimeSignature::default(),
            instrument: "piano".to_string(),
            midi_channel: "0".to_string(),
            measures: Vec::new(),
        }
    }
}

/// Time signature as numerator over denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self { numerator: 4, denominator: 4 }
    }
}

/// A single note, chord, or rest within a measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    /// Identifier; only used for stable ordering and output labeling
    #[serde(default)]
    pub id: String,
    /// Pitch spelling ("C4"), chord list ("(C4 E4 G4)"), or empty for rests
    #[serde(default)]
    pub name: String,
    /// Stave this event is notated on
    pub clef: Clef,
    /// Symbolic duration code from the duration table
    pub duration: String,
    /// Measure index this event belongs to
    pub measure: usize,
    /// Rests advance time without sounding; `name` is ignored
    #[serde(default)]
    pub is_rest: bool,
}

/// Which of the two staves a note is notated on. A display and
/// allocation concern only; it never alters pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    Treble,
    Bass,
}

impl Clef {
    /// Display-cased name, for instrument track labels.
    pub fn title(&self) -> &'static str {
        match self {
            Clef::Treble => "Treble",
            Clef::Bass => "Bass",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Timed document (MIDI side)
// ═══════════════════════════════════════════════════════════════════════

/// In-memory form of a timed MIDI document. Note times are absolute
/// seconds; tick arithmetic stays inside the SMF codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiDocument {
    /// Tempo in effect from time zero, in BPM
    pub initial_tempo: f64,
    /// Time-signature meta events
    pub time_signatures: Vec<TimeSignatureEvent>,
    /// Key-signature meta events
    pub key_signatures: Vec<KeySignatureEvent>,
    /// Instrument tracks
    pub instruments: Vec<InstrumentTrack>,
}

impl MidiDocument {
    pub fn new(initial_tempo: f64) -> Self {
        Self {
            initial_tempo,
            time_signatures: Vec::new(),
            key_signatures: Vec::new(),
            instruments: Vec::new(),
        }
    }

    /// Total number of notes across all instrument tracks.
    pub fn note_count(&self) -> usize {
        self.instruments.iter().map(|i| i.notes.len()).sum()
    }

    /// End time of the last note in seconds, or 0 for an empty document.
    pub fn end_time(&self) -> f64 {
        self.instruments
            .iter()
            .flat_map(|i| i.notes.iter())
            .fold(0.0, |acc, n| acc.max(n.end))
    }
}

/// One instrument track holding note-on/note-off pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentTrack {
    /// General MIDI program number (0–127)
    pub program: u8,
    /// MIDI channel (0–15); channel 9 is the drum channel
    pub channel: u8,
    /// Whether this track plays on the percussion channel
    pub is_drum: bool,
    /// Display name ("Piano (Treble)")
    pub name: String,
    /// Notes with absolute start/end times in seconds
    pub notes: Vec<TimedNote>,
}

impl InstrumentTrack {
    pub fn new(program: u8, channel: u8, name: impl Into<String>) -> Self {
        Self {
            program,
            channel,
            is_drum: channel == 9,
            name: name.into(),
            notes: Vec::new(),
        }
    }
}

/// A pitched note with absolute timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedNote {
    /// MIDI pitch (0–127, 60 = middle C)
    pub pitch: u8,
    /// Note-on velocity (0–127)
    pub velocity: u8,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

/// A time-signature change at an absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSignatureEvent {
    pub numerator: u32,
    pub denominator: u32,
    /// Time of the change in seconds
    pub time: f64,
}

/// A key-signature change at an absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeySignatureEvent {
    /// Sharps (positive) or flats (negative) on the circle of fifths
    pub fifths: i8,
    /// True for minor keys
    pub minor: bool,
    /// Time of the change in seconds
    pub time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_document_defaults() {
        let doc: ScoreDocument = serde_json::from_str("{}").unwrap();
        assert_eq!(doc.key_signature, "C");
        assert_eq!(doc.tempo, 120.0);
        assert_eq!(doc.time_signature, TimeSignature { numerator: 4, denominator: 4 });
        assert_eq!(doc.instrument, "piano");
        assert_eq!(doc.midi_channel, "0");
        assert!(doc.measures.is_empty());
    }

    #[test]
    fn note_event_wire_format() {
        let json = r#"{
            "id": "test-1-1",
            "name": "C4",
            "clef": "treble",
            "duration": "q",
            "measure": 0,
            "isRest": false
        }"#;
        let event: NoteEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.clef, Clef::Treble);
        assert!(!event.is_rest);

        // isRest must serialize back in camelCase.
        let out = serde_json::to_string(&event).unwrap();
        assert!(out.contains("\"isRest\""));
        assert!(out.contains("\"clef\":\"treble\""));
    }

    #[test]
    fn end_time_over_tracks() {
        let mut doc = MidiDocument::new(120.0);
        let mut track = InstrumentTrack::new(0, 0, "Piano");
        track.notes.push(TimedNote { pitch: 60, velocity: 80, start: 0.0, end: 0.5 });
        track.notes.push(TimedNote { pitch: 64, velocity: 80, start: 0.5, end: 2.0 });
        doc.instruments.push(track);
        assert_eq!(doc.end_time(), 2.0);
        assert_eq!(doc.note_count(), 2);
    }
}
