//! notebridge — bidirectional converter between JSON music notation and
//! Standard MIDI Files.
//!
//! The symbolic side is a JSON document of measures holding notes,
//! chords, and rests with symbolic durations and clefs. The timed side
//! is a Standard MIDI File of note-on/note-off events with absolute
//! timing. Conversion runs both ways; the reverse direction quantizes
//! timings, groups simultaneous notes into chords, balances the two
//! staves, and splits measures that would overflow a renderer's
//! per-measure capacity.
//!
//! # Example
//! ```no_run
//! use notebridge::{load_score, score_to_midi, save_midi};
//!
//! let doc = load_score("song.json").unwrap();
//! let midi = score_to_midi(&doc, None).unwrap();
//! save_midi("song.mid", &midi).unwrap();
//! ```

pub mod clef;
pub mod duration;
pub mod error;
pub mod forward;
pub mod instruments;
pub mod midi;
pub mod model;
pub mod pitch;
pub mod reverse;
pub mod timing;

use std::path::Path;

pub use error::{ConvertError, Result};
pub use forward::{ensemble_to_midi, score_to_midi, DEFAULT_VELOCITY};
pub use midi::{parse_midi, write_midi};
pub use model::{
    Clef, InstrumentTrack, KeySignatureEvent, MidiDocument, NoteEvent,
    ScoreDocument, TimeSignature, TimeSignatureEvent, TimedNote,
};
pub use reverse::{midi_to_score, DEFAULT_QUANTIZE_RESOLUTION};

/// Load a symbolic score document from a JSON file.
pub fn load_score<P: AsRef<Path>>(path: P) -> Result<ScoreDocument> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Save a symbolic score document as pretty-printed JSON.
///
/// The document is serialized in full before anything touches the
/// filesystem, so a failure never leaves a truncated file behind.
pub fn save_score<P: AsRef<Path>>(path: P, doc: &ScoreDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a timed document from a Standard MIDI File.
pub fn load_midi<P: AsRef<Path>>(path: P) -> Result<MidiDocument> {
    let bytes = std::fs::read(path)?;
    parse_midi(&bytes)
}

/// Save a timed document as a Standard MIDI File.
pub fn save_midi<P: AsRef<Path>>(path: P, doc: &MidiDocument) -> Result<()> {
    let bytes = write_midi(doc)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
