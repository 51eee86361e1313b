//! Reverse conversion: a timed MIDI document → a symbolic score document.
//!
//! The hard direction. Note timings are quantized to a beat grid, notes
//! sharing a quantized (start, duration) slot are grouped into chords,
//! each group is assigned a stave by the load-balancing clef allocator,
//! and a source measure that cannot fit on two staves is split into
//! several output measures. Emitted measures never exceed the per-stave
//! beat capacity derived from the time signature.
//!
//! Tempo is a required caller input. There is deliberately no estimation
//! and no default here: the caller knows the originating tempo (score
//! metadata, a DAW project, a CLI flag) and must say so.

use std::collections::BTreeMap;

use crate::clef::{
    assign_chord_clef, assign_note_clef, split_chord_at_middle_c, ClefLoadState,
};
use crate::duration::{safe_beats_to_symbol, symbol_to_beats};
use crate::error::{ConvertError, Result};
use crate::instruments::{key_signature_name, program_instrument_name};
use crate::model::{
    Clef, MidiDocument, NoteEvent, ScoreDocument, TimeSignature,
};
use crate::pitch::pitches_to_name;
use crate::timing::{
    beats_to_seconds, measure_beats, quantize_time, quantized_duration,
};

/// Default quantization grid: one eighth of a beat (a thirty-second note).
pub const DEFAULT_QUANTIZE_RESOLUTION: f64 = 0.125;

/// A note after quantization, before grouping. Original timings are kept
/// alongside the quantized ones for diagnostics only.
#[derive(Debug, Clone)]
struct TimedEvent {
    /// Quantized start in seconds
    start: f64,
    /// Source measure index derived from the quantized start
    measure: usize,
    pitch: u8,
    /// Quantized duration in beats
    duration_beats: f64,
    #[allow(dead_code)]
    original_start: f64,
    #[allow(dead_code)]
    original_end: f64,
}

/// Convert a timed MIDI document to a symbolic score document.
///
/// `tempo` is the tempo the timings are interpreted against, in BPM.
/// `resolution` is the quantization grid in beats
/// ([`DEFAULT_QUANTIZE_RESOLUTION`] when in doubt).
pub fn midi_to_score(
    midi: &MidiDocument,
    tempo: f64,
    resolution: f64,
) -> Result<ScoreDocument> {
    if !tempo.is_finite() || tempo <= 0.0 {
        return Err(ConvertError::InvalidTempo(tempo));
    }
    if midi.instruments.is_empty() {
        return Err(ConvertError::InvalidInput(
            "MIDI document contains no instruments".into(),
        ));
    }

    let time_signature = midi
        .time_signatures
        .first()
        .map(|ts| TimeSignature { numerator: ts.numerator, denominator: ts.denominator })
        .unwrap_or_default();
    let key_signature = midi
        .key_signatures
        .first()
        .and_then(|ks| key_signature_name(ks.fifths, ks.minor))
        .unwrap_or_else(|| "C".to_string());
    let instrument = midi
        .instruments
        .iter()
        .find(|i| !i.is_drum)
        .map(|i| program_instrument_name(i.program).to_string())
        .unwrap_or_else(|| "piano".to_string());

    let capacity = measure_beats(time_signature.numerator, time_signature.denominator);
    let measure_duration_secs = beats_to_seconds(capacity, tempo)?;

    let events = quantize_events(midi, tempo, resolution, measure_duration_secs)?;
    let measures = build_measures(&events, capacity)?;

    Ok(ScoreDocument {
        key_signature,
        tempo,
        time_signature,
        instrument,
        midi_channel: "0".to_string(),
        measures,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Stage 1: quantize
// ═══════════════════════════════════════════════════════════════════════

fn quantize_events(
    midi: &MidiDocument,
    tempo: f64,
    resolution: f64,
    measure_duration_secs: f64,
) -> Result<Vec<TimedEvent>> {
    let mut events = Vec::new();

    for track in &midi.instruments {
        if track.is_drum {
            continue;
        }
        for note in &track.notes {
            let start = quantize_time(note.start, resolution, tempo)?;
            let measure = (start / measure_duration_secs).floor() as usize;
            let duration_beats =
                quantized_duration(note.start, note.end, tempo, resolution)?;
            events.push(TimedEvent {
                start,
                measure,
                pitch: note.pitch,
                duration_beats,
                original_start: note.start,
                original_end: note.end,
            });
        }
    }

    events.sort_by(|a, b| {
        (a.measure, a.start, a.pitch)
            .partial_cmp(&(b.measure, b.start, b.pitch))
            .unwrap()
    });
    Ok(events)
}

// ═══════════════════════════════════════════════════════════════════════
// Stages 2–4: bucket, assign, split
// ═══════════════════════════════════════════════════════════════════════

/// Accumulates output measures. A source measure flushes at least once;
/// capacity overflow flushes early, opening an extra output measure with
/// fresh stave loads.
struct MeasureWriter {
    measures: Vec<Vec<NoteEvent>>,
    current: Vec<NoteEvent>,
    loads: ClefLoadState,
    next_note_id: usize,
}

impl MeasureWriter {
    fn new() -> Self {
        Self {
            measures: Vec::new(),
            current: Vec::new(),
            loads: ClefLoadState::default(),
            next_note_id: 1,
        }
    }

    /// Index the next emitted note will be labeled with.
    fn current_index(&self) -> usize {
        self.measures.len()
    }

    fn emit(&mut self, name: String, clef: Clef, symbol: &str, notated_beats: f64) {
        let measure = self.current_index();
        self.current.push(NoteEvent {
            id: format!("converted-{}-{}", measure, self.next_note_id),
            name,
            clef,
            duration: symbol.to_string(),
            measure,
            is_rest: false,
        });
        self.next_note_id += 1;
        self.loads.add(clef, notated_beats);
    }

    /// Close the current output measure, empty or not.
    fn flush(&mut self) {
        self.measures.push(std::mem::take(&mut self.current));
        self.loads = ClefLoadState::default();
        self.next_note_id = 1;
    }
}

fn build_measures(events: &[TimedEvent], capacity: f64) -> Result<Vec<Vec<NoteEvent>>> {
    let mut writer = MeasureWriter::new();
    let Some(max_measure) = events.iter().map(|e| e.measure).max() else {
        return Ok(writer.measures);
    };

    for measure_idx in 0..=max_measure {
        let measure_events: Vec<&TimedEvent> =
            events.iter().filter(|e| e.measure == measure_idx).collect();

        // Bucket by quantized start (millisecond keys), then by quantized
        // duration (centibeat keys). One bucket renders as one chord.
        let mut start_buckets: BTreeMap<i64, BTreeMap<i64, Vec<&TimedEvent>>> =
            BTreeMap::new();
        for event in measure_events {
            let start_key = (event.start * 1000.0).round() as i64;
            let duration_key = (event.duration_beats * 100.0).round() as i64;
            start_buckets
                .entry(start_key)
                .or_default()
                .entry(duration_key)
                .or_default()
                .push(event);
        }

        for duration_buckets in start_buckets.values() {
            for (&duration_key, bucket) in duration_buckets {
                let duration_beats = duration_key as f64 / 100.0;
                place_bucket(&mut writer, bucket, duration_beats, capacity);
            }
        }

        // The source measure is over; whatever accumulated becomes its
        // (final) output measure, even when empty.
        writer.flush();
    }

    Ok(writer.measures)
}

/// Place one chord bucket, splitting or opening a new output measure when
/// the stave capacity would be exceeded.
fn place_bucket(
    writer: &mut MeasureWriter,
    bucket: &[&TimedEvent],
    duration_beats: f64,
    capacity: f64,
) {
    let symbol = safe_beats_to_symbol(duration_beats, capacity);
    // Stave loads track what the renderer will display, so they grow by
    // the notated duration, not the raw quantized beats.
    let notated_beats = symbol_to_beats(symbol).unwrap_or(duration_beats);

    let pitches: Vec<i32> = bucket.iter().map(|e| e.pitch as i32).collect();
    let name = pitches_to_name(&pitches);
    if name.is_empty() {
        log::warn!("dropping bucket with no spellable pitches: {pitches:?}");
        return;
    }

    loop {
        let clef = if pitches.len() == 1 {
            assign_note_clef(pitches[0], &writer.loads)
        } else {
            assign_chord_clef(&pitches, &writer.loads)
        };

        if !writer.loads.would_overflow(clef, notated_beats, capacity) {
            writer.emit(name.clone(), clef, symbol, notated_beats);
            return;
        }

        // A chord straddling middle C can be torn in two, one half per
        // stave, if both halves then fit.
        let (bass_half, treble_half) = split_chord_at_middle_c(&pitches);
        if !bass_half.is_empty()
            && !treble_half.is_empty()
            && !writer.loads.would_overflow(Clef::Bass, notated_beats, capacity)
            && !writer.loads.would_overflow(Clef::Treble, notated_beats, capacity)
        {
            let bass_name = pitches_to_name(&bass_half);
            let treble_name = pitches_to_name(&treble_half);
            writer.emit(bass_name, Clef::Bass, symbol, notated_beats);
            writer.emit(treble_name, Clef::Treble, symbol, notated_beats);
            return;
        }

        // Nothing fits here. A fresh measure must always accept the
        // bucket (safe-duration mapping bounds it by the capacity), so
        // placing into an empty measure never loops.
        if writer.loads.is_empty() {
            writer.emit(name.clone(), clef, symbol, notated_beats);
            return;
        }
        writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InstrumentTrack, TimedNote};

    fn doc_with_notes(notes: Vec<TimedNote>) -> MidiDocument {
        let mut midi = MidiDocument::new(120.0);
        let mut track = InstrumentTrack::new(0, 0, "Piano");
        track.notes = notes;
        midi.instruments.push(track);
        midi
    }

    fn note(pitch: u8, start: f64, end: f64) -> TimedNote {
        TimedNote { pitch, velocity: 80, start, end }
    }

    #[test]
    fn no_instruments_is_fatal() {
        let midi = MidiDocument::new(120.0);
        assert!(matches!(
            midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION),
            Err(ConvertError::InvalidInput(_))
        ));
    }

    #[test]
    fn tempo_is_mandatory_and_validated() {
        let midi = doc_with_notes(vec![note(60, 0.0, 0.5)]);
        assert!(matches!(
            midi_to_score(&midi, 0.0, DEFAULT_QUANTIZE_RESOLUTION),
            Err(ConvertError::InvalidTempo(_))
        ));
    }

    #[test]
    fn single_quarter_note() {
        let midi = doc_with_notes(vec![note(60, 0.0, 0.5)]);
        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();

        assert_eq!(doc.measures.len(), 1);
        let events = &doc.measures[0];
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "C4");
        assert_eq!(events[0].duration, "q");
        assert_eq!(events[0].clef, Clef::Treble);
        assert_eq!(events[0].id, "converted-0-1");
        assert!(!events[0].is_rest);
    }

    #[test]
    fn simultaneous_notes_group_into_one_chord() {
        // Three notes, identical start and duration: one chord event.
        let midi = doc_with_notes(vec![
            note(67, 0.0, 0.5),
            note(60, 0.0, 0.5),
            note(64, 0.0, 0.5),
        ]);
        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();

        assert_eq!(doc.measures[0].len(), 1);
        assert_eq!(doc.measures[0][0].name, "(C4 E4 G4)");
    }

    #[test]
    fn different_durations_do_not_merge() {
        // Same start, one quarter and one half: two separate events.
        let midi = doc_with_notes(vec![note(60, 0.0, 0.5), note(64, 0.0, 1.0)]);
        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();
        assert_eq!(doc.measures[0].len(), 2);
    }

    #[test]
    fn jittery_timing_quantizes_together() {
        // 15 ms of jitter on an eighth-beat grid still lands in one bucket.
        let midi = doc_with_notes(vec![
            note(60, 0.000, 0.50),
            note(64, 0.015, 0.51),
        ]);
        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();
        assert_eq!(doc.measures[0].len(), 1);
        assert_eq!(doc.measures[0][0].name, "(C4 E4)");
    }

    #[test]
    fn notes_fall_into_their_measures() {
        // At 120 BPM a 4/4 measure is 2 s. The second note sits in
        // measure 1, leaving measure 0 with one event.
        let midi = doc_with_notes(vec![note(60, 0.0, 0.5), note(62, 2.0, 2.5)]);
        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();

        assert_eq!(doc.measures.len(), 2);
        assert_eq!(doc.measures[0].len(), 1);
        assert_eq!(doc.measures[1].len(), 1);
        assert_eq!(doc.measures[1][0].measure, 1);
        assert_eq!(doc.measures[1][0].id, "converted-1-1");
    }

    #[test]
    fn empty_gap_measures_stay_empty() {
        // A note in measure 0 and one in measure 2: measure 1 is present
        // but empty.
        let midi = doc_with_notes(vec![note(60, 0.0, 0.5), note(62, 4.0, 4.5)]);
        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();

        assert_eq!(doc.measures.len(), 3);
        assert!(doc.measures[1].is_empty());
    }

    #[test]
    fn drum_tracks_are_ignored() {
        let mut midi = doc_with_notes(vec![note(60, 0.0, 0.5)]);
        let mut drums = InstrumentTrack::new(0, 9, "Drums");
        drums.notes.push(note(36, 0.0, 0.5));
        midi.instruments.push(drums);

        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();
        assert_eq!(doc.measures[0].len(), 1);
        assert_eq!(doc.measures[0][0].name, "C4");
    }

    #[test]
    fn metadata_passes_through() {
        let mut midi = doc_with_notes(vec![note(60, 0.0, 0.5)]);
        midi.time_signatures.push(crate::model::TimeSignatureEvent {
            numerator: 3,
            denominator: 4,
            time: 0.0,
        });
        midi.key_signatures.push(crate::model::KeySignatureEvent {
            fifths: 1,
            minor: false,
            time: 0.0,
        });
        midi.instruments[0].program = 24;

        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();
        assert_eq!(doc.time_signature.numerator, 3);
        assert_eq!(doc.key_signature, "G");
        assert_eq!(doc.instrument, "guitar");
        assert_eq!(doc.midi_channel, "0");
        assert_eq!(doc.tempo, 120.0);
    }

    /// Per-stave beat totals of one output measure.
    fn stave_loads(measure: &[NoteEvent]) -> (f64, f64) {
        let mut treble = 0.0;
        let mut bass = 0.0;
        for event in measure {
            let beats = symbol_to_beats(&event.duration).unwrap();
            match event.clef {
                Clef::Treble => treble += beats,
                Clef::Bass => bass += beats,
            }
        }
        (treble, bass)
    }

    #[test]
    fn overflowing_measure_splits() {
        // Six half notes in source measure 0, all treble range: 12 beats
        // against a 4-beat stave capacity. Starts are staggered so the
        // notes stay separate events rather than merging into chords.
        let notes: Vec<TimedNote> =
            (0..6).map(|i| note(72, i as f64 * 0.25, i as f64 * 0.25 + 1.0)).collect();
        let midi = doc_with_notes(notes);
        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();

        assert!(doc.measures.len() > 1, "expected a split, got {:?}", doc.measures);
        for measure in &doc.measures {
            let (treble, bass) = stave_loads(measure);
            assert!(treble <= 4.0 + 0.01, "treble overloaded: {treble}");
            assert!(bass <= 4.0 + 0.01, "bass overloaded: {bass}");
        }
        // Nothing lost in the split.
        let total: usize = doc.measures.iter().map(|m| m.len()).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn wide_chord_lands_on_the_lighter_stave_within_capacity() {
        // The treble stave fills up with melody; a straddling whole-note
        // chord must go to the empty bass stave, keeping a single output
        // measure with both staves exactly at capacity.
        let notes = vec![
            note(72, 0.0, 1.5), // dotted half, treble
            note(74, 1.5, 2.0), // quarter, treble: stave now full
            note(55, 0.0, 2.0), // whole-note chord straddling middle C
            note(64, 0.0, 2.0),
        ];
        let midi = doc_with_notes(notes);
        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();

        assert_eq!(doc.measures.len(), 1);
        let chord = doc.measures[0]
            .iter()
            .find(|e| e.name == "(G3 E4)")
            .expect("chord event present");
        assert_eq!(chord.clef, Clef::Bass);

        let (treble, bass) = stave_loads(&doc.measures[0]);
        assert!(treble <= 4.0 + 0.01);
        assert!(bass <= 4.0 + 0.01);
    }

    #[test]
    fn load_balancing_spreads_borderline_notes() {
        // Four whole-beat notes at pitch 62 (borderline band): once the
        // treble stave is 2 beats ahead, later notes flip to bass.
        let notes: Vec<TimedNote> =
            (0..4).map(|i| note(62, i as f64 * 0.5, i as f64 * 0.5 + 0.5)).collect();
        let midi = doc_with_notes(notes);
        let doc = midi_to_score(&midi, 120.0, DEFAULT_QUANTIZE_RESOLUTION).unwrap();

        let (treble, bass) = stave_loads(&doc.measures[0]);
        assert!(bass > 0.0, "expected some notes to flip to bass");
        assert!((treble - bass).abs() <= 2.0);
    }
}
