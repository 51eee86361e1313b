//! Clef allocation: deciding which stave each note or chord lands on
//! while keeping both staves' beat loads balanced.
//!
//! The allocator is a set of pure functions over an explicit
//! `ClefLoadState` value. Each conversion call owns its own state, so
//! concurrent conversions never share allocator state by construction.

use crate::model::Clef;

/// Load difference in beats beyond which a borderline note is flipped
/// to the lighter stave. Tunable; pinned by test, not by any renderer
/// contract.
pub const CLEF_BALANCE_THRESHOLD: f64 = 1.5;

/// Borderline band for single notes: inside this pitch range a note may
/// be reassigned for balance, outside it the pitch decides alone.
const BORDERLINE_LOW: i32 = 55;
const BORDERLINE_HIGH: i32 = 65;

/// A chord entirely below this pitch is unambiguously bass material.
const CHORD_BASS_CEILING: i32 = 57;
/// A chord entirely above this pitch is unambiguously treble material.
const CHORD_TREBLE_FLOOR: i32 = 67;

/// Running per-stave beat totals for the output measure being built.
/// Reset whenever a new output measure opens.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClefLoadState {
    pub treble_beats: f64,
    pub bass_beats: f64,
}

impl ClefLoadState {
    pub fn load(&self, clef: Clef) -> f64 {
        match clef {
            Clef::Treble => self.treble_beats,
            Clef::Bass => self.bass_beats,
        }
    }

    pub fn add(&mut self, clef: Clef, beats: f64) {
        match clef {
            Clef::Treble => self.treble_beats += beats,
            Clef::Bass => self.bass_beats += beats,
        }
    }

    /// Would appending `beats` to `clef` exceed the stave capacity?
    pub fn would_overflow(&self, clef: Clef, beats: f64, capacity: f64) -> bool {
        self.load(clef) + beats > capacity + 1e-6
    }

    /// The stave currently carrying fewer beats; treble on an exact tie.
    pub fn lighter(&self) -> Clef {
        if self.bass_beats < self.treble_beats {
            Clef::Bass
        } else {
            Clef::Treble
        }
    }

    /// Absolute load difference between the staves, in beats.
    pub fn imbalance(&self) -> f64 {
        (self.treble_beats - self.bass_beats).abs()
    }

    pub fn is_empty(&self) -> bool {
        self.treble_beats == 0.0 && self.bass_beats == 0.0
    }
}

/// Default clef for a pitch: middle C and above is treble.
pub fn default_clef(pitch: i32) -> Clef {
    if pitch >= 60 {
        Clef::Treble
    } else {
        Clef::Bass
    }
}

/// Clef for a single note, with load balancing.
///
/// Pitch decides by default. Inside the borderline band around middle C
/// the note moves to the lighter stave once the load gap grows past the
/// balance threshold.
pub fn assign_note_clef(pitch: i32, loads: &ClefLoadState) -> Clef {
    if (BORDERLINE_LOW..=BORDERLINE_HIGH).contains(&pitch)
        && loads.imbalance() > CLEF_BALANCE_THRESHOLD
    {
        return loads.lighter();
    }
    default_clef(pitch)
}

/// Clef for a chord, with load balancing.
///
/// A chord lying entirely below the bass ceiling goes to bass, entirely
/// above the treble floor goes to treble. Anything else is borderline:
/// the lighter stave wins, and an exact tie falls back to bass when the
/// chord's lowest pitch is below middle C.
pub fn assign_chord_clef(pitches: &[i32], loads: &ClefLoadState) -> Clef {
    let min = pitches.iter().copied().min().unwrap_or(60);
    let max = pitches.iter().copied().max().unwrap_or(60);

    if max < CHORD_BASS_CEILING {
        return Clef::Bass;
    }
    if min > CHORD_TREBLE_FLOOR {
        return Clef::Treble;
    }

    if loads.treble_beats == loads.bass_beats {
        default_clef(min)
    } else {
        loads.lighter()
    }
}

/// Split a chord at middle C into (bass, treble) halves.
///
/// Used when a straddling chord would overflow a single stave: each half
/// can then be emitted on its own stave. Either half may be empty.
pub fn split_chord_at_middle_c(pitches: &[i32]) -> (Vec<i32>, Vec<i32>) {
    let mut bass = Vec::new();
    let mut treble = Vec::new();
    for &p in pitches {
        if p < 60 {
            bass.push(p);
        } else {
            treble.push(p);
        }
    }
    (bass, treble)
}
