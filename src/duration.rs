//! The symbolic duration table: a fixed bidirectional mapping between
//! duration codes ("q", "h.", …) and quarter-note beat counts.
//!
//! The table order matters: nearest-match lookups break ties in favor of
//! the earlier entry, so plain durations win over dotted ones at equal
//! distance.

/// Duration code → beats, in tie-breaking order.
pub const DURATION_TABLE: &[(&str, f64)] = &[
    ("w", 4.0),
    ("h", 2.0),
    ("q", 1.0),
    ("8", 0.5),
    ("16", 0.25),
    ("32", 0.125),
    ("w.", 6.0),
    ("h.", 3.0),
    ("q.", 1.5),
    ("8.", 0.75),
    ("16.", 0.375),
];

/// Tolerance for treating a beat count as an exact table entry.
const EXACT_TOLERANCE: f64 = 1e-3;

/// Shortest representable duration (a thirty-second note).
pub const MIN_BEATS: f64 = 0.125;

/// Look up the beat count for a duration code.
pub fn symbol_to_beats(symbol: &str) -> Option<f64> {
    DURATION_TABLE
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, b)| *b)
}

/// Convert a beat count to the closest duration code.
///
/// An exact match (within 1e-3) wins immediately; otherwise the nearest
/// entry by absolute difference is chosen, ties going to the earlier
/// table entry. With `allow_dotted` false, dotted codes are excluded
/// from the candidates.
pub fn beats_to_symbol(beats: f64, allow_dotted: bool) -> &'static str {
    for (symbol, table_beats) in DURATION_TABLE {
        if !allow_dotted && symbol.ends_with('.') {
            continue;
        }
        if (beats - table_beats).abs() < EXACT_TOLERANCE {
            return symbol;
        }
    }

    let mut closest = "q";
    let mut closest_diff = f64::INFINITY;
    for (symbol, table_beats) in DURATION_TABLE {
        if !allow_dotted && symbol.ends_with('.') {
            continue;
        }
        let diff = (beats - table_beats).abs();
        if diff < closest_diff {
            closest_diff = diff;
            closest = symbol;
        }
    }
    closest
}

/// Convert a beat count to a duration code that a renderer can fit in a
/// measure of `max_beats` capacity.
///
/// The beat count is clamped into `[MIN_BEATS, max_beats]` first. A
/// clamped value of 6 beats or more maps straight to a whole note; the
/// dotted whole ("w.") never comes out of this function, since a single
/// six-beat event overflows every common time signature.
pub fn safe_beats_to_symbol(beats: f64, max_beats: f64) -> &'static str {
    let clamped = beats.clamp(MIN_BEATS, max_beats);
    if clamped >= 6.0 {
        return "w";
    }

    // Nearest match over the table minus "w.".
    let mut closest = "q";
    let mut closest_diff = f64::INFINITY;
    for (symbol, table_beats) in DURATION_TABLE {
        if *symbol == "w." {
            continue;
        }
        let diff = (clamped - table_beats).abs();
        if diff < closest_diff {
            closest_diff = diff;
            closest = symbol;
        }
    }
    closest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_lookups() {
        assert_eq!(beats_to_symbol(4.0, true), "w");
        assert_eq!(beats_to_symbol(2.0, true), "h");
        assert_eq!(beats_to_symbol(1.0, true), "q");
        assert_eq!(beats_to_symbol(0.5, true), "8");
        assert_eq!(beats_to_symbol(1.5, true), "q.");
    }

    #[test]
    fn near_match_stays_in_table() {
        let symbol = beats_to_symbol(1.1, true);
        assert!(symbol_to_beats(symbol).is_some());
        assert_eq!(symbol, "q");
    }

    #[test]
    fn ties_prefer_earlier_entry() {
        // 1.25 is equidistant from "q" (1.0) and "q." (1.5); "q" comes first.
        assert_eq!(beats_to_symbol(1.25, true), "q");
    }

    #[test]
    fn dotted_exclusion() {
        // 1.4 is nearest to "q." (1.5), but without dotted codes it
        // falls back to "q".
        assert_eq!(beats_to_symbol(1.4, true), "q.");
        assert_eq!(beats_to_symbol(1.4, false), "q");
    }

    #[test]
    fn safe_mapping_clamps_to_capacity() {
        // A 6-beat duration in a 4/4 measure must not come back as "w.".
        assert_eq!(safe_beats_to_symbol(6.0, 4.0), "w");
        // Tiny durations clamp up to the smallest code.
        assert_eq!(safe_beats_to_symbol(0.01, 4.0), "32");
    }

    #[test]
    fn safe_mapping_fits_narrow_measures() {
        // 3/4 capacity: a whole note's 4 beats clamp to 3 → dotted half.
        assert_eq!(safe_beats_to_symbol(4.0, 3.0), "h.");
    }
}
