//! Glyph metrics: widths and anchor points of music font glyphs, in staff
//! spaces.
//!
//! The engine only ever reads metrics through [`GlyphMetricsProvider`].
//! Lookups that the provider cannot answer fall back to the constants in
//! [`fallback_width`] and [`fallback_anchor`] (Bravura values).

mod cache;
mod smufl;

pub use cache::{MeasurementCache, DEFAULT_CACHE_CAPACITY};
pub use smufl::SmuflMetrics;

use crate::model::{Accidental, ClefSign, NoteValue};

/// Read-only source of glyph metrics.
///
/// Implementations are consulted from concurrent layout calls, so they must
/// be immutable once loaded.
pub trait GlyphMetricsProvider: Send + Sync {
    fn has_glyph(&self, name: &str) -> bool;

    /// Advance width in staff spaces.
    fn width_of(&self, name: &str) -> Option<f64>;

    /// Named anchor (e.g. `stemUpSE`) in staff spaces, y pointing up.
    fn anchor_of(&self, name: &str, anchor: &str) -> Option<(f64, f64)>;
}

/// SMuFL glyph and anchor names used by the engine.
pub mod names {
    pub const NOTEHEAD_BLACK: &str = "noteheadBlack";
    pub const NOTEHEAD_HALF: &str = "noteheadHalf";
    pub const NOTEHEAD_WHOLE: &str = "noteheadWhole";

    pub const REST_WHOLE: &str = "restWhole";
    pub const REST_HALF: &str = "restHalf";
    pub const REST_QUARTER: &str = "restQuarter";
    pub const REST_8TH: &str = "rest8th";
    pub const REST_16TH: &str = "rest16th";
    pub const REST_32ND: &str = "rest32nd";
    pub const REST_64TH: &str = "rest64th";
    pub const REST_128TH: &str = "rest128th";

    pub const G_CLEF: &str = "gClef";
    pub const F_CLEF: &str = "fClef";
    pub const C_CLEF: &str = "cClef";

    pub const ACCIDENTAL_SHARP: &str = "accidentalSharp";
    pub const ACCIDENTAL_FLAT: &str = "accidentalFlat";
    pub const ACCIDENTAL_NATURAL: &str = "accidentalNatural";
    pub const ACCIDENTAL_DOUBLE_SHARP: &str = "accidentalDoubleSharp";
    pub const ACCIDENTAL_DOUBLE_FLAT: &str = "accidentalDoubleFlat";

    pub const AUGMENTATION_DOT: &str = "augmentationDot";

    pub const TIME_SIG_DIGITS: [&str; 10] = [
        "timeSig0", "timeSig1", "timeSig2", "timeSig3", "timeSig4",
        "timeSig5", "timeSig6", "timeSig7", "timeSig8", "timeSig9",
    ];

    pub const STEM_UP_SE: &str = "stemUpSE";
    pub const STEM_DOWN_NW: &str = "stemDownNW";
}

pub fn notehead_glyph(value: NoteValue) -> &'static str {
    match value {
        NoteValue::Whole => names::NOTEHEAD_WHOLE,
        NoteValue::Half => names::NOTEHEAD_HALF,
        _ => names::NOTEHEAD_BLACK,
    }
}

pub fn rest_glyph(value: NoteValue) -> &'static str {
    match value {
        NoteValue::Whole => names::REST_WHOLE,
        NoteValue::Half => names::REST_HALF,
        NoteValue::Quarter => names::REST_QUARTER,
        NoteValue::Eighth => names::REST_8TH,
        NoteValue::Sixteenth => names::REST_16TH,
        NoteValue::ThirtySecond => names::REST_32ND,
        NoteValue::SixtyFourth => names::REST_64TH,
        NoteValue::HundredTwentyEighth => names::REST_128TH,
    }
}

pub fn clef_glyph(sign: ClefSign) -> &'static str {
    match sign {
        ClefSign::G => names::G_CLEF,
        ClefSign::F => names::F_CLEF,
        ClefSign::C => names::C_CLEF,
    }
}

pub fn accidental_glyph(accidental: Accidental) -> &'static str {
    match accidental {
        Accidental::Sharp => names::ACCIDENTAL_SHARP,
        Accidental::Flat => names::ACCIDENTAL_FLAT,
        Accidental::Natural => names::ACCIDENTAL_NATURAL,
        Accidental::DoubleSharp => names::ACCIDENTAL_DOUBLE_SHARP,
        Accidental::DoubleFlat => names::ACCIDENTAL_DOUBLE_FLAT,
    }
}

/// Bravura advance widths, in staff spaces.
pub(crate) const BRAVURA_WIDTHS: &[(&str, f64)] = &[
    (names::NOTEHEAD_BLACK, 1.18),
    (names::NOTEHEAD_HALF, 1.18),
    (names::NOTEHEAD_WHOLE, 1.688),
    (names::REST_WHOLE, 1.128),
    (names::REST_HALF, 1.128),
    (names::REST_QUARTER, 1.08),
    (names::REST_8TH, 0.988),
    (names::REST_16TH, 1.28),
    (names::REST_32ND, 1.452),
    (names::REST_64TH, 1.7),
    (names::REST_128TH, 1.936),
    (names::G_CLEF, 2.684),
    (names::F_CLEF, 2.756),
    (names::C_CLEF, 2.796),
    (names::ACCIDENTAL_SHARP, 0.996),
    (names::ACCIDENTAL_FLAT, 0.904),
    (names::ACCIDENTAL_NATURAL, 0.672),
    (names::ACCIDENTAL_DOUBLE_SHARP, 0.988),
    (names::ACCIDENTAL_DOUBLE_FLAT, 1.644),
    (names::AUGMENTATION_DOT, 0.4),
    ("timeSig0", 1.8),
    ("timeSig1", 1.24),
    ("timeSig2", 1.576),
    ("timeSig3", 1.464),
    ("timeSig4", 1.8),
    ("timeSig5", 1.42),
    ("timeSig6", 1.592),
    ("timeSig7", 1.584),
    ("timeSig8", 1.656),
    ("timeSig9", 1.592),
];

/// Bravura stem attachment points for the noteheads that carry stems.
pub(crate) const BRAVURA_ANCHORS: &[(&str, &str, (f64, f64))] = &[
    (names::NOTEHEAD_BLACK, names::STEM_UP_SE, (1.18, 0.168)),
    (names::NOTEHEAD_BLACK, names::STEM_DOWN_NW, (0.0, -0.168)),
    (names::NOTEHEAD_HALF, names::STEM_UP_SE, (1.18, 0.168)),
    (names::NOTEHEAD_HALF, names::STEM_DOWN_NW, (0.0, -0.168)),
];

/// Width used when a provider cannot answer for `name`.
pub fn fallback_width(name: &str) -> f64 {
    BRAVURA_WIDTHS
        .iter()
        .find(|(n, _)| *n == name)
        .map_or(1.0, |&(_, w)| w)
}

/// Anchor used when a provider cannot answer. Stems attach at the notehead's
/// right edge going up and at its left edge going down.
pub fn fallback_anchor(name: &str, anchor: &str) -> (f64, f64) {
    if let Some(&(_, _, point)) = BRAVURA_ANCHORS
        .iter()
        .find(|(n, a, _)| *n == name && *a == anchor)
    {
        return point;
    }
    if anchor == names::STEM_UP_SE {
        (fallback_width(name), 0.0)
    } else {
        (0.0, 0.0)
    }
}

/// Anchor from the provider, else the fallback.
pub fn resolve_anchor(
    metrics: Option<&dyn GlyphMetricsProvider>,
    name: &str,
    anchor: &str,
) -> (f64, f64) {
    match metrics.and_then(|m| m.anchor_of(name, anchor)) {
        Some(point) => point,
        None => {
            log::warn!("no '{anchor}' anchor for glyph '{name}', using fallback");
            fallback_anchor(name, anchor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_covers_engine_glyphs() {
        assert_eq!(fallback_width(names::NOTEHEAD_BLACK), 1.18);
        assert_eq!(fallback_width(names::G_CLEF), 2.684);
        assert_eq!(fallback_width("noSuchGlyph"), 1.0);
    }

    #[test]
    fn fallback_anchor_sides() {
        assert_eq!(fallback_anchor(names::NOTEHEAD_BLACK, names::STEM_UP_SE), (1.18, 0.168));
        assert_eq!(fallback_anchor("noSuchGlyph", names::STEM_UP_SE), (1.0, 0.0));
        assert_eq!(fallback_anchor("noSuchGlyph", names::STEM_DOWN_NW), (0.0, 0.0));
    }
}
