//! Error types for the conversion pipeline.
//!
//! Problems that corrupt only a single note or chord are not represented
//! here: the converters log a warning and keep going. These variants cover
//! failures that make the whole conversion meaningless.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    /// The input cannot be converted at all: empty document list,
    /// malformed MIDI bytes, a MIDI file with no instrument tracks.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Tempo must be a positive, finite number of beats per minute.
    #[error("invalid tempo: {0} BPM")]
    InvalidTempo(f64),

    /// A pitch spelling that cannot be resolved to a MIDI note number.
    /// Surfaced by the note-name codec; the converters catch this per
    /// note and skip the offender rather than failing the conversion.
    #[error("malformed note name: '{0}'")]
    MalformedNoteName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
