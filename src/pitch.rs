//! Note-name codec: pitch spellings ↔ MIDI note numbers.
//!
//! Spellings follow the "C4" convention with middle C = 60. Chords are
//! written as a parenthesized, space-separated list: "(C4 E4 G4)".
//! Parsing accepts sharps and flats (including doubled accidentals);
//! serialization always spells with sharps.

use crate::error::{ConvertError, Result};

/// Semitone offsets of the natural note letters within an octave.
fn letter_semitone(letter: char) -> Option<i32> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Sharp-based spellings for the twelve pitch classes.
const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Parse a single pitch spelling ("C4", "F#3", "Bb-1") to a MIDI number.
pub fn note_name_to_number(name: &str) -> Result<i32> {
    let malformed = || ConvertError::MalformedNoteName(name.to_string());

    let mut chars = name.trim().chars().peekable();
    let letter = chars.next().ok_or_else(malformed)?;
    let mut semitone = letter_semitone(letter).ok_or_else(malformed)?;

    // Accidentals: any run of sharps or flats after the letter.
    while let Some(&c) = chars.peek() {
        match c {
            '#' => semitone += 1,
            'b' => semitone -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave: i32 = chars
        .collect::<String>()
        .parse()
        .map_err(|_| malformed())?;

    let number = (octave + 1) * 12 + semitone;
    if !(0..=127).contains(&number) {
        return Err(malformed());
    }
    Ok(number)
}

/// Spell a MIDI note number ("C4" for 60). None outside 0–127.
pub fn note_number_to_name(number: i32) -> Option<String> {
    if !(0..=127).contains(&number) {
        return None;
    }
    let pitch_class = PITCH_CLASS_NAMES[(number % 12) as usize];
    let octave = number / 12 - 1;
    Some(format!("{pitch_class}{octave}"))
}

/// Parse a note-event name into MIDI numbers.
///
/// A parenthesized name is a chord: the contents split on whitespace and
/// each token parses as a pitch spelling. Anything else is a single
/// spelling. An unresolvable token fails the whole name.
pub fn parse_note_name(name: &str) -> Result<Vec<i32>> {
    let trimmed = name.trim();
    if trimmed.starts_with('(') && trimmed.ends_with(')') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let pitches: Vec<i32> = inner
            .split_whitespace()
            .map(note_name_to_number)
            .collect::<Result<_>>()?;
        if pitches.is_empty() {
            return Err(ConvertError::MalformedNoteName(name.to_string()));
        }
        Ok(pitches)
    } else {
        Ok(vec![note_name_to_number(trimmed)?])
    }
}

/// Serialize a pitch set back to a note-event name.
///
/// Pitches are sorted ascending. Zero pitches give an empty string, one
/// gives the bare spelling, several give the parenthesized chord form.
/// Pitches with no spelling (outside 0–127) are silently omitted.
pub fn pitches_to_name(pitches: &[i32]) -> String {
    let mut sorted = pitches.to_vec();
    sorted.sort_unstable();

    let names: Vec<String> = sorted
        .iter()
        .filter_map(|&p| note_number_to_name(p))
        .collect();

    match names.len() {
        0 => String::new(),
        1 => names.into_iter().next().unwrap(),
        _ => format!("({})", names.join(" ")),
    }
}
