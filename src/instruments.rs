//! Instrument-name and key-signature lookup tables.
//!
//! Instrument names map to General MIDI program numbers; anything
//! unrecognized falls back to the grand piano. Key-signature names map
//! to a position on the circle of fifths for the SMF key-signature meta
//! event (sharps positive, flats negative).

/// General MIDI program for a simplified instrument name.
pub fn instrument_program(name: &str) -> u8 {
    match name.to_ascii_lowercase().as_str() {
        "piano" => 0,          // Acoustic Grand Piano
        "guitar" => 24,        // Acoustic Guitar (nylon)
        "cello" => 42,
        "violin" => 40,
        "sax" | "saxophone" => 65, // Alto Sax
        "drums" => 0,          // handled via the drum channel, not program
        _ => 0,
    }
}

/// Simplified instrument name for a General MIDI program.
pub fn program_instrument_name(program: u8) -> &'static str {
    match program {
        0 => "piano",
        24 | 25 | 27 => "guitar", // nylon, steel, clean electric
        42 => "cello",
        40 => "violin",
        65 => "sax",
        _ => "piano",
    }
}

/// Major key names from seven flats to seven sharps.
const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B",
    "F#", "C#",
];

/// Minor key names from seven flats to seven sharps.
const MINOR_KEYS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#",
    "D#", "A#",
];

/// Resolve a key-signature name to (fifths, minor).
///
/// Accepts bare major names ("C", "F#", "Bb"), an explicit mode suffix
/// ("C major", "C minor", "Cm"), or a lowercase bare letter for minor
/// ("c" is C minor). Returns None for anything unresolvable; callers
/// warn and skip the key-signature metadata in that case.
pub fn key_signature_fifths(name: &str) -> Option<(i8, bool)> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (root, minor) = split_mode(trimmed)?;
    let table = if minor { &MINOR_KEYS } else { &MAJOR_KEYS };
    table
        .iter()
        .position(|k| k.eq_ignore_ascii_case(&root))
        .map(|idx| (idx as i8 - 7, minor))
}

/// Inverse of `key_signature_fifths`: name for an SMF key signature.
pub fn key_signature_name(fifths: i8, minor: bool) -> Option<String> {
    if !(-7..=7).contains(&fifths) {
        return None;
    }
    let idx = (fifths + 7) as usize;
    Some(if minor {
        format!("{}m", MINOR_KEYS[idx])
    } else {
        MAJOR_KEYS[idx].to_string()
    })
}

/// Split "<root>[ mode]" into the root spelling and a minor flag.
fn split_mode(name: &str) -> Option<(String, bool)> {
    let lower = name.to_ascii_lowercase();
    for (suffix, minor) in [
        (" minor", true),
        (" major", false),
        ("min", true),
        ("maj", false),
        ("m", true),
    ] {
        if lower.ends_with(suffix) && lower.len() > suffix.len() {
            let root = &name[..name.len() - suffix.len()];
            return Some((root.trim().to_string(), minor));
        }
    }
    // Bare root: a lowercase letter means minor ("c" = C minor).
    let first = name.chars().next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    Some((name.to_string(), first.is_ascii_lowercase()))
}
