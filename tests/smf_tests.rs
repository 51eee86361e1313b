//! File-level tests: SMF byte structure, JSON and MIDI file I/O, and the
//! error paths the CLI relies on.

use notebridge::{
    load_midi, load_score, parse_midi, save_midi, save_score, score_to_midi,
    write_midi, Clef, MidiDocument, NoteEvent, ScoreDocument,
};
use pretty_assertions::assert_eq;

/// Path under the target-relative test_output directory, created on demand.
fn test_output_path(name: &str) -> std::path::PathBuf {
    let dir = std::path::Path::new("test_output");
    std::fs::create_dir_all(dir).unwrap();
    dir.join(name)
}

fn one_note_document() -> ScoreDocument {
    let mut doc = ScoreDocument::default();
    doc.measures = vec![vec![NoteEvent {
        id: "s-1".to_string(),
        name: "C4".to_string(),
        clef: Clef::Treble,
        duration: "q".to_string(),
        measure: 0,
        is_rest: false,
    }]];
    doc
}

// ═══════════════════════════════════════════════════════════════════════
// SMF structure
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn smf_output_has_valid_chunk_structure() {
    let midi = score_to_midi(&one_note_document(), None).unwrap();
    let bytes = write_midi(&midi).unwrap();

    assert_eq!(&bytes[0..4], b"MThd", "missing MThd header");
    assert_eq!(&bytes[8..10], &1u16.to_be_bytes(), "should be format 1");

    // Tempo track + one instrument track.
    let track_count = u16::from_be_bytes([bytes[10], bytes[11]]);
    assert_eq!(track_count, 2);

    let mtrk_count = bytes.windows(4).filter(|w| *w == b"MTrk").count();
    assert_eq!(mtrk_count, track_count as usize);
    println!("✓ SMF: {} bytes, {} tracks", bytes.len(), track_count);
}

#[test]
fn every_instrument_gets_a_track() {
    let mut doc = one_note_document();
    doc.measures[0].push(NoteEvent {
        id: "s-2".to_string(),
        name: "C3".to_string(),
        clef: Clef::Bass,
        duration: "q".to_string(),
        measure: 0,
        is_rest: false,
    });

    let midi = score_to_midi(&doc, None).unwrap();
    let bytes = write_midi(&midi).unwrap();
    let track_count = u16::from_be_bytes([bytes[10], bytes[11]]);
    // Tempo + treble + bass.
    assert_eq!(track_count, 3);
    println!("✓ two staves produce three tracks");
}

// ═══════════════════════════════════════════════════════════════════════
// File I/O
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn midi_file_round_trip() {
    let midi = score_to_midi(&one_note_document(), None).unwrap();
    let path = test_output_path("round-trip.mid");

    save_midi(&path, &midi).unwrap();
    let loaded = load_midi(&path).unwrap();

    assert_eq!(loaded.note_count(), midi.note_count());
    assert_eq!(loaded.instruments[0].notes[0].pitch, 60);
    println!("✓ MIDI file round trip via {}", path.display());
}

#[test]
fn score_file_round_trip() {
    let doc = one_note_document();
    let path = test_output_path("round-trip.json");

    save_score(&path, &doc).unwrap();
    let loaded = load_score(&path).unwrap();

    assert_eq!(loaded, doc);
    println!("✓ JSON file round trip via {}", path.display());
}

#[test]
fn saved_json_uses_the_wire_format() {
    let path = test_output_path("wire-format.json");
    save_score(&path, &one_note_document()).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();

    assert!(text.contains("\"keySignature\""));
    assert!(text.contains("\"timeSignature\""));
    assert!(text.contains("\"isRest\""));
    assert!(!text.contains("\"is_rest\""));
    println!("✓ camelCase wire format on disk");
}

// ═══════════════════════════════════════════════════════════════════════
// Error paths
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn missing_files_fail() {
    assert!(load_score("test_output/does-not-exist.json").is_err());
    assert!(load_midi("test_output/does-not-exist.mid").is_err());
    println!("✓ missing files rejected");
}

#[test]
fn malformed_json_fails() {
    let path = test_output_path("malformed.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(load_score(&path).is_err());
    println!("✓ malformed JSON rejected");
}

#[test]
fn non_midi_bytes_fail() {
    assert!(parse_midi(b"RIFF....WAVE").is_err());
    println!("✓ non-MIDI bytes rejected");
}

#[test]
fn zero_tempo_document_cannot_be_written() {
    let midi = MidiDocument::new(0.0);
    assert!(write_midi(&midi).is_err());
    println!("✓ zero-tempo document rejected");
}
