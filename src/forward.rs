//! Forward conversion: symbolic score documents → a timed MIDI document.
//!
//! Each input document is one instrument part. Measures are walked in
//! tempo/time-signature context with a per-stave beat cursor, producing
//! one instrument track per stave that holds notes. Malformed note names
//! are logged and skipped; only problems that invalidate the whole
//! conversion (no input, bad tempo) abort.

use std::collections::HashSet;

use crate::duration::symbol_to_beats;
use crate::error::{ConvertError, Result};
use crate::instruments::{instrument_program, key_signature_fifths};
use crate::model::{
    Clef, InstrumentTrack, KeySignatureEvent, MidiDocument, ScoreDocument,
    TimeSignatureEvent, TimedNote,
};
use crate::pitch::parse_note_name;
use crate::timing::{beats_to_seconds, measure_beats};

/// Velocity given to every emitted note.
pub const DEFAULT_VELOCITY: u8 = 80;

/// Convert a single symbolic document to a timed MIDI document.
pub fn score_to_midi(
    doc: &ScoreDocument,
    tempo_override: Option<f64>,
) -> Result<MidiDocument> {
    ensemble_to_midi(std::slice::from_ref(doc), tempo_override)
}

/// Convert one or more symbolic documents (one per part) to a single
/// timed MIDI document with per-part channel assignment.
///
/// Tempo, time signature, and key signature come from the first
/// document; `tempo_override` replaces the tempo for every part.
pub fn ensemble_to_midi(
    docs: &[ScoreDocument],
    tempo_override: Option<f64>,
) -> Result<MidiDocument> {
    let first = docs
        .first()
        .ok_or_else(|| ConvertError::InvalidInput("no documents provided".into()))?;

    let tempo = tempo_override.unwrap_or(first.tempo);
    if !tempo.is_finite() || tempo <= 0.0 {
        return Err(ConvertError::InvalidTempo(tempo));
    }

    let time_signature = first.time_signature;
    let mut midi = MidiDocument::new(tempo);

    // Time-signature metadata only when it differs from the 4/4 default.
    if time_signature.numerator != 4 || time_signature.denominator != 4 {
        midi.time_signatures.push(TimeSignatureEvent {
            numerator: time_signature.numerator,
            denominator: time_signature.denominator,
            time: 0.0,
        });
    }

    // Key-signature metadata only when not C major; unknown names are
    // skipped with a warning rather than failing the conversion.
    if first.key_signature != "C" {
        match key_signature_fifths(&first.key_signature) {
            Some((fifths, minor)) => {
                midi.key_signatures.push(KeySignatureEvent { fifths, minor, time: 0.0 });
            }
            None => {
                log::warn!(
                    "could not resolve key signature '{}', skipping",
                    first.key_signature
                );
            }
        }
    }

    let mut used_channels: HashSet<u8> = HashSet::new();

    for (part_idx, doc) in docs.iter().enumerate() {
        let requested: u8 = doc.midi_channel.parse().unwrap_or_else(|_| {
            log::warn!(
                "part {}: midiChannel '{}' is not numeric, using part index",
                part_idx,
                doc.midi_channel
            );
            (part_idx % 16) as u8
        });

        // Bump past channels already taken; wrap to 0 once the 16
        // channels are exhausted.
        let mut channel = requested;
        while used_channels.contains(&channel) {
            channel += 1;
            if channel >= 16 {
                log::warn!("too many parts, wrapping channel assignments");
                channel = 0;
                break;
            }
        }
        used_channels.insert(channel);
        if channel != requested {
            log::warn!(
                "channel {} already used, assigned channel {} to '{}'",
                requested,
                channel,
                doc.instrument
            );
        }

        let (treble_notes, bass_notes) = collect_part_notes(doc, tempo)?;
        let program = instrument_program(&doc.instrument);
        let both_staves = !treble_notes.is_empty() && !bass_notes.is_empty();

        for (clef, notes) in [(Clef::Treble, treble_notes), (Clef::Bass, bass_notes)] {
            if notes.is_empty() {
                continue;
            }
            let name = if both_staves {
                format!("{} ({})", title_case(&doc.instrument), clef.title())
            } else {
                title_case(&doc.instrument)
            };
            let mut track = InstrumentTrack::new(program, channel, name);
            track.notes = notes;
            midi.instruments.push(track);
        }
    }

    Ok(midi)
}

/// Walk one part's measures and produce its timed notes, grouped by the
/// stave each event was notated on.
fn collect_part_notes(
    doc: &ScoreDocument,
    tempo: f64,
) -> Result<(Vec<TimedNote>, Vec<TimedNote>)> {
    let measure_duration_beats = measure_beats(
        doc.time_signature.numerator,
        doc.time_signature.denominator,
    );
    let measure_duration_secs = beats_to_seconds(measure_duration_beats, tempo)?;

    let mut treble_notes = Vec::new();
    let mut bass_notes = Vec::new();
    let mut measure_start = 0.0;

    for measure in &doc.measures {
        // Input order is not guaranteed; ids define processing order.
        let mut events: Vec<&_> = measure.iter().collect();
        events.sort_by(|a, b| a.id.cmp(&b.id));

        // Beat cursor per stave, reset at the top of each measure.
        let mut treble_cursor = 0.0;
        let mut bass_cursor = 0.0;

        for event in events {
            let duration_beats = symbol_to_beats(&event.duration).unwrap_or(1.0);
            let cursor = match event.clef {
                Clef::Treble => &mut treble_cursor,
                Clef::Bass => &mut bass_cursor,
            };

            if event.is_rest {
                *cursor += duration_beats;
                continue;
            }

            let pitches = match parse_note_name(&event.name) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("could not parse note '{}': {}", event.name, e);
                    continue;
                }
            };

            let start = measure_start + beats_to_seconds(*cursor, tempo)?;
            let end = start + beats_to_seconds(duration_beats, tempo)?;

            let out = match event.clef {
                Clef::Treble => &mut treble_notes,
                Clef::Bass => &mut bass_notes,
            };
            for pitch in pitches {
                out.push(TimedNote {
                    pitch: pitch.clamp(0, 127) as u8,
                    velocity: DEFAULT_VELOCITY,
                    start,
                    end,
                });
            }

            *cursor += duration_beats;
        }

        measure_start += measure_duration_secs;
    }

    Ok((treble_notes, bass_notes))
}

/// "piano" → "Piano", for instrument track names.
fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
