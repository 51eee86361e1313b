//! Standard MIDI File codec for the timed document model.
//!
//! Produces and consumes SMF Type 1 as raw bytes. On the way out,
//! track 0 carries the tempo and signature metadata and each instrument
//! gets its own track of note-on/note-off pairs. On the way in, a tempo
//! map is collected across all tracks first, then note ticks are
//! converted to absolute seconds through it.

use std::collections::HashMap;

use crate::error::{ConvertError, Result};
use crate::model::{
    InstrumentTrack, KeySignatureEvent, MidiDocument, TimeSignatureEvent,
    TimedNote,
};

/// Ticks per quarter note in our MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Microseconds per quarter at 120 BPM, the SMF default before any
/// tempo meta event is seen.
const DEFAULT_USPQ: f64 = 500_000.0;

/// A single MIDI event (note on/off, program change, meta).
#[derive(Debug, Clone)]
struct MidiEvent {
    /// Absolute time in ticks from the start of the track
    tick: u32,
    /// Raw MIDI message bytes (status + data)
    bytes: Vec<u8>,
}

// ═══════════════════════════════════════════════════════════════════════
// Writing
// ═══════════════════════════════════════════════════════════════════════

/// Serialize a timed document to Standard MIDI File bytes (SMF Type 1).
pub fn write_midi(doc: &MidiDocument) -> Result<Vec<u8>> {
    let tempo = doc.initial_tempo;
    if !tempo.is_finite() || tempo <= 0.0 {
        return Err(ConvertError::InvalidTempo(tempo));
    }

    let mut tracks: Vec<Vec<u8>> = Vec::new();

    // ── Track 0: tempo and signature metadata ───────────────────────
    let mut meta_events = Vec::new();
    let uspq = (60_000_000.0 / tempo) as u32;
    meta_events.push(MidiEvent {
        tick: 0,
        bytes: vec![
            0xFF,
            0x51,
            0x03,
            ((uspq >> 16) & 0xFF) as u8,
            ((uspq >> 8) & 0xFF) as u8,
            (uspq & 0xFF) as u8,
        ],
    });
    for ts in &doc.time_signatures {
        // FF 58 04 nn dd cc bb: dd is a power of two, cc is MIDI clocks
        // per metronome click, bb is 32nds per quarter.
        let dd = (ts.denominator.max(1) as f64).log2().round() as u8;
        meta_events.push(MidiEvent {
            tick: seconds_to_ticks(ts.time, tempo),
            bytes: vec![0xFF, 0x58, 0x04, ts.numerator as u8, dd, 24, 8],
        });
    }
    for ks in &doc.key_signatures {
        meta_events.push(MidiEvent {
            tick: seconds_to_ticks(ks.time, tempo),
            bytes: vec![0xFF, 0x59, 0x02, ks.fifths as u8, ks.minor as u8],
        });
    }
    tracks.push(encode_track(&meta_events, "Tempo"));

    // ── One track per instrument ────────────────────────────────────
    for instrument in &doc.instruments {
        let channel = instrument.channel & 0x0F;
        let mut events = Vec::new();
        events.push(MidiEvent {
            tick: 0,
            bytes: vec![0xC0 | channel, instrument.program & 0x7F],
        });
        for note in &instrument.notes {
            events.push(MidiEvent {
                tick: seconds_to_ticks(note.start, tempo),
                bytes: vec![0x90 | channel, note.pitch & 0x7F, note.velocity & 0x7F],
            });
            events.push(MidiEvent {
                tick: seconds_to_ticks(note.end, tempo),
                bytes: vec![0x80 | channel, note.pitch & 0x7F, 0],
            });
        }
        tracks.push(encode_track(&events, &instrument.name));
    }

    Ok(build_smf(&tracks))
}

/// Convert seconds to ticks at a constant tempo.
fn seconds_to_ticks(seconds: f64, tempo: f64) -> u32 {
    let ticks = seconds * tempo / 60.0 * TICKS_PER_QUARTER as f64;
    ticks.round().max(0.0) as u32
}

/// Build the complete Standard MIDI File bytes.
fn build_smf(tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();

    // MThd header
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes()); // header length
    out.extend_from_slice(&1u16.to_be_bytes()); // format type 1
    out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&TICKS_PER_QUARTER.to_be_bytes());

    // Track chunks
    for track_data in tracks {
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        out.extend_from_slice(track_data);
    }

    out
}

/// Encode a track's events into raw MTrk bytes (delta-time encoded).
fn encode_track(events: &[MidiEvent], name: &str) -> Vec<u8> {
    let mut data = Vec::new();

    // Track name meta event
    let name_bytes = name.as_bytes();
    data.extend_from_slice(&[0x00]); // delta time 0
    data.push(0xFF);
    data.push(0x03); // track name
    write_vlq(&mut data, name_bytes.len() as u32);
    data.extend_from_slice(name_bytes);

    // Sort events by tick; the sort is stable, so a note-off pushed
    // before a note-on at the same tick stays first.
    let mut sorted: Vec<&MidiEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.tick);

    let mut last_tick: u32 = 0;
    for event in &sorted {
        let delta = event.tick.saturating_sub(last_tick);
        write_vlq(&mut data, delta);
        data.extend_from_slice(&event.bytes);
        last_tick = event.tick;
    }

    // End of track
    data.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

    data
}

/// Write a variable-length quantity (VLQ) to a byte vector.
fn write_vlq(out: &mut Vec<u8>, mut value: u32) {
    if value == 0 {
        out.push(0);
        return;
    }
    let mut buf = [0u8; 5];
    let mut i = 0;
    while value > 0 {
        buf[i] = (value & 0x7F) as u8;
        value >>= 7;
        if i > 0 {
            buf[i] |= 0x80;
        }
        i += 1;
    }
    // Write in reverse order
    for j in (0..i).rev() {
        out.push(buf[j]);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Reading
// ═══════════════════════════════════════════════════════════════════════

/// Parse Standard MIDI File bytes into a timed document.
///
/// Accepts SMF formats 0 and 1 with a ticks-per-quarter division.
/// SMPTE-division files and truncated chunks are rejected as
/// [`ConvertError::InvalidInput`].
pub fn parse_midi(data: &[u8]) -> Result<MidiDocument> {
    let mut reader = ByteReader::new(data);

    // ── MThd ────────────────────────────────────────────────────────
    let magic = reader.take(4)?;
    if magic != b"MThd" {
        return Err(ConvertError::InvalidInput("missing MThd header".into()));
    }
    let header_len = reader.u32()? as usize;
    if header_len < 6 {
        return Err(ConvertError::InvalidInput("short MThd header".into()));
    }
    let _format = reader.u16()?;
    let declared_tracks = reader.u16()?;
    let division = reader.u16()?;
    reader.skip(header_len - 6)?;

    if division & 0x8000 != 0 {
        return Err(ConvertError::InvalidInput(
            "SMPTE time division is not supported".into(),
        ));
    }
    let tpq = division.max(1) as f64;

    // ── Decode every MTrk into tick-stamped events ──────────────────
    let mut raw_tracks = Vec::new();
    while !reader.is_empty() {
        let chunk_id = reader.take(4)?;
        let chunk_len = reader.u32()? as usize;
        let chunk = reader.take(chunk_len)?;
        if chunk_id == b"MTrk" {
            raw_tracks.push(decode_track(chunk)?);
        }
        // Unknown chunk types are skipped, per the SMF spec.
    }
    if raw_tracks.len() != declared_tracks as usize {
        log::warn!(
            "MThd declares {} tracks, found {}",
            declared_tracks,
            raw_tracks.len()
        );
    }

    // ── Global tempo map, gathered across all tracks ────────────────
    let mut tempo_map: Vec<(u32, f64)> = raw_tracks
        .iter()
        .flat_map(|t| t.tempos.iter().copied())
        .collect();
    tempo_map.sort_by_key(|&(tick, _)| tick);

    let initial_tempo = tempo_map
        .first()
        .map(|&(_, uspq)| 60_000_000.0 / uspq)
        .unwrap_or(120.0);

    let mut doc = MidiDocument::new(initial_tempo);

    for track in &raw_tracks {
        for &(tick, numerator, dd) in &track.time_signatures {
            doc.time_signatures.push(TimeSignatureEvent {
                numerator: numerator as u32,
                denominator: 1u32 << dd,
                time: ticks_to_seconds(tick, &tempo_map, tpq),
            });
        }
        for &(tick, sf, mi) in &track.key_signatures {
            doc.key_signatures.push(KeySignatureEvent {
                fifths: sf,
                minor: mi != 0,
                time: ticks_to_seconds(tick, &tempo_map, tpq),
            });
        }

        if track.notes.is_empty() {
            continue;
        }
        let channel = track.channel.unwrap_or(0);
        let mut instrument = InstrumentTrack::new(
            track.program.unwrap_or(0),
            channel,
            track.name.clone(),
        );
        for raw in &track.notes {
            instrument.notes.push(TimedNote {
                pitch: raw.pitch,
                velocity: raw.velocity,
                start: ticks_to_seconds(raw.on_tick, &tempo_map, tpq),
                end: ticks_to_seconds(raw.off_tick, &tempo_map, tpq),
            });
        }
        instrument
            .notes
            .sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap());
        doc.instruments.push(instrument);
    }

    doc.time_signatures
        .sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());
    doc.key_signatures
        .sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());

    Ok(doc)
}

/// Everything pulled out of one MTrk chunk, still in ticks.
#[derive(Debug, Default)]
struct RawTrack {
    name: String,
    program: Option<u8>,
    channel: Option<u8>,
    notes: Vec<RawNote>,
    /// (tick, microseconds per quarter)
    tempos: Vec<(u32, f64)>,
    /// (tick, numerator, denominator power of two)
    time_signatures: Vec<(u32, u8, u8)>,
    /// (tick, sharps/flats, minor flag)
    key_signatures: Vec<(u32, i8, u8)>,
}

#[derive(Debug, Clone, Copy)]
struct RawNote {
    pitch: u8,
    velocity: u8,
    on_tick: u32,
    off_tick: u32,
}

/// Decode one MTrk chunk: delta times, running status, note pairing.
fn decode_track(chunk: &[u8]) -> Result<RawTrack> {
    let mut reader = ByteReader::new(chunk);
    let mut track = RawTrack::default();

    let mut tick: u32 = 0;
    let mut running_status: Option<u8> = None;
    // Note-ons waiting for their note-off, FIFO per (channel, pitch).
    let mut pending: HashMap<(u8, u8), Vec<(u32, u8)>> = HashMap::new();

    while !reader.is_empty() {
        tick = tick.saturating_add(reader.vlq()?);

        let mut status = reader.u8()?;
        if status < 0x80 {
            // Running status: reuse the previous status byte, the byte
            // just read is the first data byte.
            status = running_status.ok_or_else(|| {
                ConvertError::InvalidInput("data byte with no running status".into())
            })?;
            reader.rewind(1);
        }

        match status {
            0xFF => {
                let meta_type = reader.u8()?;
                let len = reader.vlq()? as usize;
                let payload = reader.take(len)?;
                match meta_type {
                    0x2F => break, // end of track
                    0x03 => {
                        if track.name.is_empty() {
                            track.name =
                                String::from_utf8_lossy(payload).into_owned();
                        }
                    }
                    0x51 if len >= 3 => {
                        let uspq = ((payload[0] as u32) << 16)
                            | ((payload[1] as u32) << 8)
                            | payload[2] as u32;
                        if uspq > 0 {
                            track.tempos.push((tick, uspq as f64));
                        }
                    }
                    0x58 if len >= 2 => {
                        track.time_signatures.push((tick, payload[0], payload[1]));
                    }
                    0x59 if len >= 2 => {
                        track
                            .key_signatures
                            .push((tick, payload[0] as i8, payload[1]));
                    }
                    _ => {}
                }
                running_status = None;
            }
            0xF0 | 0xF7 => {
                // Sysex: length-prefixed payload, cancels running status.
                let len = reader.vlq()? as usize;
                reader.skip(len)?;
                running_status = None;
            }
            _ => {
                let kind = status & 0xF0;
                let channel = status & 0x0F;
                running_status = Some(status);
                match kind {
                    0x90 => {
                        let pitch = reader.u8()? & 0x7F;
                        let velocity = reader.u8()? & 0x7F;
                        if velocity > 0 {
                            track.channel.get_or_insert(channel);
                            pending
                                .entry((channel, pitch))
                                .or_default()
                                .push((tick, velocity));
                        } else {
                            close_note(&mut track, &mut pending, channel, pitch, tick);
                        }
                    }
                    0x80 => {
                        let pitch = reader.u8()? & 0x7F;
                        let _velocity = reader.u8()?;
                        close_note(&mut track, &mut pending, channel, pitch, tick);
                    }
                    0xC0 => {
                        let program = reader.u8()? & 0x7F;
                        track.program.get_or_insert(program);
                        track.channel.get_or_insert(channel);
                    }
                    0xD0 => {
                        reader.skip(1)?;
                    }
                    0xA0 | 0xB0 | 0xE0 => {
                        reader.skip(2)?;
                    }
                    _ => {
                        return Err(ConvertError::InvalidInput(format!(
                            "unexpected status byte 0x{status:02X}"
                        )));
                    }
                }
            }
        }
    }

    // Notes still sounding at end of track get closed there.
    for ((_, pitch), ons) in pending {
        for (on_tick, velocity) in ons {
            log::warn!("note {pitch} has no note-off, closing at end of track");
            track.notes.push(RawNote {
                pitch,
                velocity,
                on_tick,
                off_tick: tick,
            });
        }
    }

    track.notes.sort_by_key(|n| n.on_tick);
    Ok(track)
}

/// Match a note-off against the earliest pending note-on.
fn close_note(
    track: &mut RawTrack,
    pending: &mut HashMap<(u8, u8), Vec<(u32, u8)>>,
    channel: u8,
    pitch: u8,
    off_tick: u32,
) {
    if let Some(ons) = pending.get_mut(&(channel, pitch)) {
        if !ons.is_empty() {
            let (on_tick, velocity) = ons.remove(0);
            track.notes.push(RawNote { pitch, velocity, on_tick, off_tick });
            return;
        }
    }
    log::warn!("note-off for pitch {pitch} with no matching note-on");
}

/// Convert an absolute tick to seconds, respecting tempo changes.
fn ticks_to_seconds(target: u32, tempo_map: &[(u32, f64)], tpq: f64) -> f64 {
    let mut seconds = 0.0;
    let mut prev_tick: u32 = 0;
    let mut uspq = DEFAULT_USPQ;

    for &(tick, entry_uspq) in tempo_map {
        if target <= tick {
            break;
        }
        seconds += (tick - prev_tick) as f64 / tpq * uspq / 1_000_000.0;
        prev_tick = tick;
        uspq = entry_uspq;
    }

    seconds + (target - prev_tick) as f64 / tpq * uspq / 1_000_000.0
}

/// A cursor over raw SMF bytes. Every read is bounds-checked so a
/// truncated file surfaces as InvalidInput instead of a panic.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(ConvertError::InvalidInput("truncated MIDI data".into()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    fn rewind(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a variable-length quantity (up to four bytes).
    fn vlq(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for _ in 0..4 {
            let byte = self.u8()?;
            value = (value << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ConvertError::InvalidInput("malformed variable-length quantity".into()))
    }
}
