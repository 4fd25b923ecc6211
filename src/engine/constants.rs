//! Engraving constants, in staff spaces unless stated otherwise.
//!
//! Line thicknesses and separations follow the SMuFL `engravingDefaults` of
//! Bravura; paddings are whole or half staff spaces.

// ── Barlines ────────────────────────────────────────────────────────
pub(crate) const THIN_BARLINE_THICKNESS: f64 = 0.16;
pub(crate) const THICK_BARLINE_THICKNESS: f64 = 0.5;
pub(crate) const BARLINE_SEPARATION: f64 = 0.4;
pub(crate) const REPEAT_BARLINE_DOT_SEPARATION: f64 = 0.16;
pub(crate) const REPEAT_DOT_WIDTH: f64 = 0.4;

// ── Staff ───────────────────────────────────────────────────────────
/// Middle line sits two spaces below the top line.
pub(crate) const MIDDLE_LINE_OFFSET: f64 = 2.0;

// ── Prefix gaps (after the last system element) ─────────────────────
pub(crate) const GAP_AFTER_CLEF: f64 = 1.0;
pub(crate) const GAP_AFTER_KEY_SIGNATURE: f64 = 1.2;
pub(crate) const GAP_AFTER_TIME_SIGNATURE: f64 = 1.5;
/// Between consecutive prefix symbols (clef → key → time)
pub(crate) const PREFIX_ITEM_GAP: f64 = 0.5;
/// Tempo marks sit this far above the top staff line
pub(crate) const TEMPO_MARK_RAISE: f64 = 2.5;
/// Extra room when the first note of a measure carries an accidental
pub(crate) const FIRST_ACCIDENTAL_GAP: f64 = 0.8;
/// Gap between the accidentals of a key signature
pub(crate) const KEY_SIGNATURE_ACCIDENTAL_GAP: f64 = 0.1;

// ── Inter-note corrections ──────────────────────────────────────────
pub(crate) const DOT_SPACING: f64 = 0.2;
pub(crate) const ACCIDENTAL_SPACING: f64 = 0.15;

// ── Accidental clearance (sparse → dense) ───────────────────────────
pub(crate) const ACCIDENTAL_GAP_SPARSE: f64 = 0.5;
pub(crate) const ACCIDENTAL_GAP_DENSE: f64 = 0.25;

// ── Beams ───────────────────────────────────────────────────────────
pub(crate) const MIN_STEM_LENGTH: f64 = 3.5;
/// Steepest beam allowed, as rise over run
pub(crate) const MAX_BEAM_SLOPE: f64 = 0.5;
/// Length of a fractional (broken) beam stub
pub(crate) const FRACTIONAL_BEAM_LENGTH: f64 = 1.1;
/// Beat positions closer than this are considered equal (fraction of a bar)
pub(crate) const BEAT_EPSILON: f64 = 1e-6;

/// Interpolated accidental clearance for a local density in [0,1].
pub(crate) fn accidental_gap(density: f64) -> f64 {
    let d = density.clamp(0.0, 1.0);
    ACCIDENTAL_GAP_SPARSE + (ACCIDENTAL_GAP_DENSE - ACCIDENTAL_GAP_SPARSE) * d
}
