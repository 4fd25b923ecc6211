//! Optical spacing corrections layered on top of base spacing.
//!
//! Each rule contributes a signed multiple of the staff space; the sum is
//! clamped to [`MIN_OFFSET`, `MAX_OFFSET`] and scaled by the intensity.

/// Lower bound of the summed correction, in staff spaces
pub const MIN_OFFSET: f64 = -0.25;
/// Upper bound of the summed correction, in staff spaces
pub const MAX_OFFSET: f64 = 0.5;

const STEM_UP_TO_DOWN: f64 = 0.15;
const STEM_DOWN_TO_UP: f64 = -0.10;
const REST_BEFORE_STEM_UP: f64 = 0.08;
const SHORTER_DURATION: f64 = -0.05;
const DOTTED_PREVIOUS: f64 = 0.12;
const DOTTED_CURRENT: f64 = 0.05;
const BOTH_BEAMED: f64 = -0.03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Note,
    Chord,
    Rest,
    Barline,
    Other,
}

/// What the compensator needs to know about one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpticalContext {
    pub kind: SymbolKind,
    pub stem_up: Option<bool>,
    pub duration: Option<f64>,
    pub has_accidental: bool,
    pub is_dotted: bool,
    /// Beams through the symbol's stem; 0 when unbeamed
    pub beam_level: u8,
}

impl OpticalContext {
    pub fn plain(kind: SymbolKind) -> Self {
        Self {
            kind,
            stem_up: None,
            duration: None,
            has_accidental: false,
            is_dotted: false,
            beam_level: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpticalCompensator {
    staff_space: f64,
    intensity: f64,
}

impl OpticalCompensator {
    pub fn new(staff_space: f64, intensity: f64) -> Self {
        Self {
            staff_space,
            intensity: intensity.clamp(0.0, 1.0),
        }
    }

    /// Signed offset (output units) to add between `prev` and `curr`.
    pub fn compensate(&self, prev: &OpticalContext, curr: &OpticalContext, local_density: f64) -> f64 {
        let sum = stem_alternation(prev, curr)
            + rest_before_stem_up(prev, curr)
            + shorter_duration(prev, curr)
            + accidental_room(curr, local_density)
            + dotted(prev, curr)
            + beamed_pair(prev, curr);
        sum.clamp(MIN_OFFSET, MAX_OFFSET) * self.staff_space * self.intensity
    }
}

fn stem_alternation(prev: &OpticalContext, curr: &OpticalContext) -> f64 {
    match (prev.stem_up, curr.stem_up) {
        (Some(true), Some(false)) => STEM_UP_TO_DOWN,
        (Some(false), Some(true)) => STEM_DOWN_TO_UP,
        _ => 0.0,
    }
}

fn rest_before_stem_up(prev: &OpticalContext, curr: &OpticalContext) -> f64 {
    if prev.kind == SymbolKind::Rest && curr.stem_up == Some(true) {
        REST_BEFORE_STEM_UP
    } else {
        0.0
    }
}

fn shorter_duration(prev: &OpticalContext, curr: &OpticalContext) -> f64 {
    match (prev.duration, curr.duration) {
        (Some(p), Some(c)) if c < p => SHORTER_DURATION,
        _ => 0.0,
    }
}

fn accidental_room(curr: &OpticalContext, local_density: f64) -> f64 {
    if curr.has_accidental {
        super::constants::accidental_gap(local_density)
    } else {
        0.0
    }
}

fn dotted(prev: &OpticalContext, curr: &OpticalContext) -> f64 {
    let mut offset = 0.0;
    if prev.is_dotted {
        offset += DOTTED_PREVIOUS;
    }
    if curr.is_dotted {
        offset += DOTTED_CURRENT;
    }
    offset
}

fn beamed_pair(prev: &OpticalContext, curr: &OpticalContext) -> f64 {
    if prev.beam_level > 0 && curr.beam_level > 0 {
        BOTH_BEAMED
    } else {
        0.0
    }
}

/// Density around `index` from a window of `window` symbols.
///
/// `positions` are x-positions in staff spaces. The result is
/// `(elementsPerStaffSpace - 1) / 4` clamped to [0,1].
pub fn local_density(positions: &[f64], index: usize, window: usize) -> f64 {
    if positions.len() < 2 || index >= positions.len() {
        return 0.0;
    }
    let half = window.max(2) / 2;
    let start = index.saturating_sub(half);
    let end = (index + half).min(positions.len() - 1);
    let count = (end - start + 1) as f64;
    let span = positions[end] - positions[start];
    if !(span > 0.0) {
        return 1.0;
    }
    let per_space = count / span;
    ((per_space - 1.0) / 4.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(stem_up: bool, duration: f64) -> OpticalContext {
        OpticalContext {
            kind: SymbolKind::Note,
            stem_up: Some(stem_up),
            duration: Some(duration),
            ..OpticalContext::plain(SymbolKind::Note)
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn stem_alternation_rules() {
        let comp = OpticalCompensator::new(1.0, 1.0);
        assert_close(comp.compensate(&note(true, 0.25), &note(false, 0.25), 0.0), 0.15);
        assert_close(comp.compensate(&note(false, 0.25), &note(true, 0.25), 0.0), -0.10);
        assert_close(comp.compensate(&note(true, 0.25), &note(true, 0.25), 0.0), 0.0);
    }

    #[test]
    fn rest_then_stem_up_and_shorter_value() {
        let comp = OpticalCompensator::new(1.0, 1.0);
        let rest = OpticalContext {
            duration: Some(0.25),
            ..OpticalContext::plain(SymbolKind::Rest)
        };
        // +0.08 for the rest, -0.05 for the shorter value
        assert_close(comp.compensate(&rest, &note(true, 0.125), 0.0), 0.03);
    }

    #[test]
    fn accidental_room_follows_density() {
        let comp = OpticalCompensator::new(1.0, 1.0);
        let mut curr = note(true, 0.25);
        curr.has_accidental = true;
        let prev = note(true, 0.25);
        assert_close(comp.compensate(&prev, &curr, 0.0), 0.5);
        assert_close(comp.compensate(&prev, &curr, 1.0), 0.25);
        assert_close(comp.compensate(&prev, &curr, 0.5), 0.375);
    }

    #[test]
    fn dots_and_beams() {
        let comp = OpticalCompensator::new(1.0, 1.0);
        let mut prev = note(true, 0.25);
        let mut curr = note(true, 0.25);
        prev.is_dotted = true;
        curr.is_dotted = true;
        assert_close(comp.compensate(&prev, &curr, 0.0), 0.17);

        prev.is_dotted = false;
        curr.is_dotted = false;
        prev.beam_level = 1;
        curr.beam_level = 2;
        assert_close(comp.compensate(&prev, &curr, 0.0), -0.03);
    }

    #[test]
    fn sum_is_clamped() {
        let comp = OpticalCompensator::new(1.0, 1.0);
        let mut prev = note(true, 0.25);
        prev.is_dotted = true;
        let mut curr = note(false, 0.25);
        curr.has_accidental = true;
        curr.is_dotted = true;
        // 0.15 + 0.5 + 0.12 + 0.05 = 0.82, clamped
        assert_close(comp.compensate(&prev, &curr, 0.0), MAX_OFFSET);

        let mut down = note(false, 0.25);
        down.beam_level = 1;
        let mut up = note(true, 0.125);
        up.beam_level = 1;
        // -0.10 - 0.05 - 0.03 stays inside the range
        assert_close(comp.compensate(&down, &up, 0.0), -0.18);
    }

    #[test]
    fn intensity_and_staff_space_scale() {
        let comp = OpticalCompensator::new(10.0, 0.5);
        assert_close(comp.compensate(&note(true, 0.25), &note(false, 0.25), 0.0), 0.75);
        let clamped = OpticalCompensator::new(10.0, 3.0);
        assert_close(clamped.compensate(&note(true, 0.25), &note(false, 0.25), 0.0), 1.5);
    }

    #[test]
    fn density_window() {
        // one element every 4 staff spaces: sparse
        let sparse = [0.0, 4.0, 8.0, 12.0, 16.0];
        assert_eq!(local_density(&sparse, 2, 5), 0.0);
        // five elements in one staff space: (5 - 1) / 4 = 1
        let dense = [0.0, 0.25, 0.5, 0.75, 1.0];
        assert_eq!(local_density(&dense, 2, 5), 1.0);
        // 5 elements over 2 spaces: (2.5 - 1) / 4
        let mid = [0.0, 0.5, 1.0, 1.5, 2.0];
        assert!((local_density(&mid, 2, 5) - 0.375).abs() < 1e-12);
    }
}
