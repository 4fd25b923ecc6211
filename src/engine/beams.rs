//! Beam geometry: stem direction, beam line and beam segments for one group
//! of already-positioned notes.
//!
//! Vertical coordinates grow downwards (y = output units), staff positions
//! grow upwards (half-spaces from the middle line).

use serde::Serialize;

use super::constants::*;
use crate::error::{LayoutError, Result};
use crate::glyphs::{names, notehead_glyph, resolve_anchor, GlyphMetricsProvider};
use crate::model::{NoteValue, TimeSignature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StemDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FractionalSide {
    Left,
    Right,
}

/// A note (or chord) taking part in a beam group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeamNote {
    /// Index into the layout's positioned elements
    pub element_index: usize,
    pub measure_index: usize,
    pub system_index: usize,
    /// Left edge of the notehead
    pub x: f64,
    /// y of the middle staff line of the note's system
    pub middle_line_y: f64,
    /// Every notehead, in half-spaces from the middle line
    pub staff_positions: Vec<i32>,
    pub value: NoteValue,
    /// Sounding length as a fraction of a whole note
    pub duration: f64,
    /// Onset as a fraction of the bar, in [0,1)
    pub beat_position: f64,
}

/// One beam line at one level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeamSegment {
    /// 1 = primary beam
    pub level: u8,
    pub start_note_index: usize,
    pub end_note_index: usize,
    pub is_fractional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fractional_side: Option<FractionalSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fractional_length: Option<f64>,
}

impl BeamSegment {
    fn full(level: u8, start: usize, end: usize) -> Self {
        Self {
            level,
            start_note_index: start,
            end_note_index: end,
            is_fractional: false,
            fractional_side: None,
            fractional_length: None,
        }
    }

    fn fractional(level: u8, index: usize, side: FractionalSide, length: f64) -> Self {
        Self {
            level,
            start_note_index: index,
            end_note_index: index,
            is_fractional: true,
            fractional_side: Some(side),
            fractional_length: Some(length),
        }
    }
}

/// Full geometry of a beamed group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeamGroup {
    pub notes: Vec<BeamNote>,
    pub stem_direction: StemDirection,
    /// Stem x of each note
    pub stem_xs: Vec<f64>,
    pub left_x: f64,
    pub right_x: f64,
    pub left_y: f64,
    pub right_y: f64,
    pub segments: Vec<BeamSegment>,
}

impl BeamGroup {
    pub fn slope(&self) -> f64 {
        let dx = self.right_x - self.left_x;
        if dx.abs() < 1e-9 {
            0.0
        } else {
            (self.right_y - self.left_y) / dx
        }
    }

    /// y of the primary beam at `x`.
    pub fn beam_y_at(&self, x: f64) -> f64 {
        self.left_y + self.slope() * (x - self.left_x)
    }

    /// Stem length of note `i`, measured from the notehead nearest the beam.
    pub fn stem_length(&self, i: usize, staff_space: f64) -> f64 {
        let note = &self.notes[i];
        (self.beam_y_at(self.stem_xs[i]) - near_y(note, self.stem_direction, staff_space)).abs()
    }

    pub fn max_level(&self) -> u8 {
        self.segments.iter().map(|s| s.level).max().unwrap_or(0)
    }

    pub fn segments_at(&self, level: u8) -> impl Iterator<Item = &BeamSegment> {
        self.segments.iter().filter(move |s| s.level == level)
    }
}

pub struct BeamAnalyzer<'m> {
    metrics: &'m dyn GlyphMetricsProvider,
    staff_space: f64,
    min_stem: f64,
}

impl<'m> BeamAnalyzer<'m> {
    pub fn new(metrics: &'m dyn GlyphMetricsProvider, staff_space: f64) -> Self {
        Self {
            metrics,
            staff_space,
            min_stem: MIN_STEM_LENGTH * staff_space,
        }
    }

    /// Minimum stem length in output units.
    pub fn min_stem(&self) -> f64 {
        self.min_stem
    }

    pub fn analyze(&self, notes: Vec<BeamNote>, time: &TimeSignature) -> Result<BeamGroup> {
        if notes.is_empty() {
            return Err(LayoutError::EmptyBeamGroup);
        }
        time.validate()?;
        validate_group(&notes)?;

        let direction = stem_direction(&notes);
        let stem_xs: Vec<f64> = notes
            .iter()
            .map(|n| n.x + self.stem_anchor_x(n.value, direction))
            .collect();

        let (left_y, slope) = self.beam_line(&notes, &stem_xs, direction);
        let left_x = stem_xs[0];
        let right_x = stem_xs[stem_xs.len() - 1];
        let right_y = left_y + slope * (right_x - left_x);
        let segments = self.segments(&notes, &stem_xs, time);

        Ok(BeamGroup {
            notes,
            stem_direction: direction,
            stem_xs,
            left_x,
            right_x,
            left_y,
            right_y,
            segments,
        })
    }

    fn stem_anchor_x(&self, value: NoteValue, direction: StemDirection) -> f64 {
        let anchor = match direction {
            StemDirection::Up => names::STEM_UP_SE,
            StemDirection::Down => names::STEM_DOWN_NW,
        };
        resolve_anchor(Some(self.metrics), notehead_glyph(value), anchor).0 * self.staff_space
    }

    /// Left y and slope of the primary beam. The line is shifted so the
    /// tightest note gets exactly the minimum stem length.
    fn beam_line(&self, notes: &[BeamNote], stem_xs: &[f64], direction: StemDirection) -> (f64, f64) {
        let ss = self.staff_space;
        let near: Vec<f64> = notes.iter().map(|n| near_y(n, direction, ss)).collect();
        let left_x = stem_xs[0];
        let dx = stem_xs[stem_xs.len() - 1] - left_x;
        let slope = if dx.abs() < 1e-9 { 0.0 } else { beam_slope(notes, direction, dx, ss) };

        let avg = near.iter().sum::<f64>() / near.len() as f64;
        let provisional = match direction {
            StemDirection::Up => avg - self.min_stem,
            StemDirection::Down => avg + self.min_stem,
        };
        let line = |x: f64| provisional + slope * (x - left_x);

        let shortest = near
            .iter()
            .zip(stem_xs)
            .map(|(&y, &x)| match direction {
                StemDirection::Up => y - line(x),
                StemDirection::Down => line(x) - y,
            })
            .fold(f64::INFINITY, f64::min);
        let shift = shortest - self.min_stem;

        let left_y = match direction {
            StemDirection::Up => provisional + shift,
            StemDirection::Down => provisional - shift,
        };
        (left_y, slope)
    }

    fn segments(&self, notes: &[BeamNote], stem_xs: &[f64], time: &TimeSignature) -> Vec<BeamSegment> {
        let n = notes.len();
        let counts: Vec<u8> = notes.iter().map(|n| n.value.beam_count()).collect();
        let max_level = counts.iter().copied().max().unwrap_or(1);
        let min_count = counts.iter().copied().min().unwrap_or(1);

        let mut segments = vec![BeamSegment::full(1, 0, n - 1)];
        if max_level < 2 {
            return segments;
        }

        // secondary beams may only break "two levels above" the group's
        // smallest beam count, and only at subdivision boundaries
        let breakable_from = min_count.saturating_sub(2).max(2);
        let grid = subdivision_grid(time, max_level);

        for level in 2..=max_level {
            let mut i = 0;
            while i < n {
                if counts[i] < level {
                    i += 1;
                    continue;
                }
                let mut start = i;
                let mut j = i + 1;
                while j < n && counts[j] >= level {
                    if level >= breakable_from && on_boundary(notes[j].beat_position, grid) {
                        segments.push(self.piece(level, start, j - 1, notes, stem_xs));
                        start = j;
                    }
                    j += 1;
                }
                segments.push(self.piece(level, start, j - 1, notes, stem_xs));
                i = j;
            }
        }
        segments
    }

    fn piece(&self, level: u8, start: usize, end: usize, notes: &[BeamNote], stem_xs: &[f64]) -> BeamSegment {
        if start != end {
            return BeamSegment::full(level, start, end);
        }
        let side = fractional_side(notes, start);
        let neighbor = match side {
            FractionalSide::Left => start - 1,
            FractionalSide::Right => start + 1,
        };
        let gap = (stem_xs[start] - stem_xs[neighbor]).abs();
        let length = (FRACTIONAL_BEAM_LENGTH * self.staff_space).min(gap * 0.5);
        BeamSegment::fractional(level, start, side, length)
    }
}

fn validate_group(notes: &[BeamNote]) -> Result<()> {
    if notes.len() < 2 {
        return Err(LayoutError::MalformedBeamGroup("a beam needs at least two notes".into()));
    }
    for (i, note) in notes.iter().enumerate() {
        if note.staff_positions.is_empty() {
            return Err(LayoutError::MalformedBeamGroup(format!("note {i} has no noteheads")));
        }
        if note.value.beam_count() == 0 {
            return Err(LayoutError::MalformedBeamGroup(format!(
                "note {i} ({:?}) cannot be beamed",
                note.value
            )));
        }
        if !note.x.is_finite() || !note.middle_line_y.is_finite() {
            return Err(LayoutError::MalformedBeamGroup(format!("note {i} has no position")));
        }
    }
    if notes.windows(2).any(|w| w[1].x < w[0].x) {
        return Err(LayoutError::MalformedBeamGroup("notes are not in left-to-right order".into()));
    }
    Ok(())
}

/// The notehead farthest from the middle line decides; at or above the
/// middle line stems go down, and ties go down.
pub fn stem_direction(notes: &[BeamNote]) -> StemDirection {
    let extreme = notes
        .iter()
        .flat_map(|n| n.staff_positions.iter().copied())
        .max_by_key(|&p| (p.abs(), p >= 0))
        .unwrap_or(0);
    if extreme >= 0 {
        StemDirection::Down
    } else {
        StemDirection::Up
    }
}

/// Staff position of the notehead nearest the beam.
fn near_position(note: &BeamNote, direction: StemDirection) -> i32 {
    let positions = note.staff_positions.iter().copied();
    match direction {
        StemDirection::Up => positions.max().unwrap_or(0),
        StemDirection::Down => positions.min().unwrap_or(0),
    }
}

fn near_y(note: &BeamNote, direction: StemDirection, staff_space: f64) -> f64 {
    note.middle_line_y - near_position(note, direction) as f64 * staff_space / 2.0
}

/// Slant from the interval between the outer notes, flat for concave
/// shapes, capped at [`MAX_BEAM_SLOPE`].
fn beam_slope(notes: &[BeamNote], direction: StemDirection, dx: f64, staff_space: f64) -> f64 {
    let first = near_position(&notes[0], direction);
    let last = near_position(&notes[notes.len() - 1], direction);
    if first == last {
        return 0.0;
    }

    let inner = &notes[1..notes.len() - 1];
    let concave = match direction {
        StemDirection::Up => inner.iter().any(|n| near_position(n, direction) > first.max(last)),
        StemDirection::Down => inner.iter().any(|n| near_position(n, direction) < first.min(last)),
    };
    if concave {
        return 0.0;
    }

    let rise = match (last - first).abs() {
        1 => 0.25,
        2 => 0.5,
        3 | 4 => 0.75,
        _ => 1.0,
    } * staff_space;
    // rising pitch means decreasing y
    let signed = if last > first { -rise } else { rise };
    (signed / dx).clamp(-MAX_BEAM_SLOPE, MAX_BEAM_SLOPE)
}

/// Bar-normalised spacing of the boundaries where secondary beams may break:
/// the beat for sixteenths, halved for every further level.
fn subdivision_grid(time: &TimeSignature, max_level: u8) -> f64 {
    let halvings = max_level.saturating_sub(2) as i32;
    time.beat_length() / 2f64.powi(halvings) / time.bar_length()
}

fn on_boundary(position: f64, grid: f64) -> bool {
    if !(grid > 0.0) {
        return false;
    }
    let q = position / grid;
    (q - q.round()).abs() < BEAT_EPSILON * 1e3
}

/// Stub direction for a note that needs a beam level on its own.
pub fn fractional_side(notes: &[BeamNote], index: usize) -> FractionalSide {
    if index == 0 {
        FractionalSide::Right
    } else if index == notes.len() - 1 {
        FractionalSide::Left
    } else if notes[index].duration < notes[index - 1].duration {
        FractionalSide::Right
    } else {
        FractionalSide::Left
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::SmuflMetrics;
    use pretty_assertions::assert_eq;

    const SS: f64 = 10.0;

    fn note(i: usize, position: i32, value: NoteValue, duration: f64, beat: f64) -> BeamNote {
        BeamNote {
            element_index: i,
            measure_index: 0,
            system_index: 0,
            x: 100.0 + i as f64 * 30.0,
            middle_line_y: 50.0,
            staff_positions: vec![position],
            value,
            duration,
            beat_position: beat,
        }
    }

    fn eighths(positions: &[i32]) -> Vec<BeamNote> {
        positions
            .iter()
            .enumerate()
            .map(|(i, &p)| note(i, p, NoteValue::Eighth, 0.125, i as f64 * 0.125))
            .collect()
    }

    fn assert_min_stem(group: &BeamGroup) {
        let lengths: Vec<f64> = (0..group.notes.len()).map(|i| group.stem_length(i, SS)).collect();
        let min = lengths.iter().copied().fold(f64::INFINITY, f64::min);
        assert!((min - MIN_STEM_LENGTH * SS).abs() < 1e-9, "lengths {lengths:?}");
    }

    #[test]
    fn empty_group_is_an_error() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        assert_eq!(
            analyzer.analyze(vec![], &TimeSignature::common()),
            Err(LayoutError::EmptyBeamGroup)
        );
    }

    #[test]
    fn min_stem_scales_with_staff_space() {
        let metrics = SmuflMetrics::bravura();
        assert_eq!(BeamAnalyzer::new(&metrics, SS).min_stem(), 35.0);
        assert_eq!(BeamAnalyzer::new(&metrics, 4.0).min_stem(), 14.0);
    }

    #[test]
    fn single_note_is_malformed() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let err = analyzer.analyze(eighths(&[0]), &TimeSignature::common()).unwrap_err();
        assert!(matches!(err, LayoutError::MalformedBeamGroup(_)));
    }

    #[test]
    fn invalid_meter_is_an_error() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let err = analyzer.analyze(eighths(&[0, 1]), &TimeSignature::new(0, 4)).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidTimeSignature { .. }));
    }

    #[test]
    fn direction_follows_extreme_note() {
        assert_eq!(stem_direction(&eighths(&[-4, -3, -2, -1])), StemDirection::Up);
        assert_eq!(stem_direction(&eighths(&[1, 2, 3, 4])), StemDirection::Down);
        // -5 is farther than +4
        assert_eq!(stem_direction(&eighths(&[4, -5])), StemDirection::Up);
        // tie goes down
        assert_eq!(stem_direction(&eighths(&[3, -3])), StemDirection::Down);
        assert_eq!(stem_direction(&eighths(&[0, 0])), StemDirection::Down);
    }

    #[test]
    fn stems_up_attach_right_of_notehead() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let group = analyzer.analyze(eighths(&[-4, -3, -2, -1]), &TimeSignature::common()).unwrap();
        assert_eq!(group.stem_direction, StemDirection::Up);
        assert!((group.left_x - (100.0 + 11.8)).abs() < 1e-9);
        assert!((group.right_x - (190.0 + 11.8)).abs() < 1e-9);
        // ascending line: beam rises to the right
        assert!(group.right_y < group.left_y);
        assert_min_stem(&group);
    }

    #[test]
    fn stems_down_attach_left_and_keep_min_length() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let group = analyzer.analyze(eighths(&[5, 1, 3, 2]), &TimeSignature::common()).unwrap();
        assert_eq!(group.stem_direction, StemDirection::Down);
        assert!((group.left_x - 100.0).abs() < 1e-9);
        assert!(group.left_y > 50.0);
        assert_min_stem(&group);
    }

    #[test]
    fn slope_is_capped() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let mut notes = eighths(&[-6, 6]);
        notes[1].x = notes[0].x + 2.0;
        let group = analyzer.analyze(notes, &TimeSignature::common()).unwrap();
        assert!(group.slope().abs() <= MAX_BEAM_SLOPE + 1e-12);
        assert_min_stem(&group);
    }

    #[test]
    fn repeated_pitch_and_concave_groups_are_flat() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let flat = analyzer.analyze(eighths(&[-2, -2, -2, -2]), &TimeSignature::common()).unwrap();
        assert_eq!(flat.slope(), 0.0);

        // stems up, inner note higher than both ends
        let concave = analyzer.analyze(eighths(&[-4, -1, -3]), &TimeSignature::common()).unwrap();
        assert_eq!(concave.stem_direction, StemDirection::Up);
        assert_eq!(concave.slope(), 0.0);
        assert_min_stem(&concave);
    }

    #[test]
    fn vertical_span_of_zero_width_is_flat() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let mut notes = eighths(&[-4, 0]);
        notes[1].x = notes[0].x;
        let group = analyzer.analyze(notes, &TimeSignature::common()).unwrap();
        assert_eq!(group.slope(), 0.0);
    }

    #[test]
    fn eighths_get_one_primary_beam() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let group = analyzer.analyze(eighths(&[1, 2, 3, 4]), &TimeSignature::common()).unwrap();
        assert_eq!(group.segments, vec![BeamSegment::full(1, 0, 3)]);
    }

    #[test]
    fn dotted_eighth_sixteenth_stub_points_left() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let notes = vec![
            note(0, 0, NoteValue::Eighth, 0.1875, 0.0),
            note(1, 1, NoteValue::Sixteenth, 0.0625, 0.1875),
        ];
        let group = analyzer.analyze(notes, &TimeSignature::common()).unwrap();
        assert_eq!(group.segments.len(), 2);
        let stub = &group.segments[1];
        assert_eq!(stub.level, 2);
        assert!(stub.is_fractional);
        assert_eq!((stub.start_note_index, stub.end_note_index), (1, 1));
        assert_eq!(stub.fractional_side, Some(FractionalSide::Left));
        assert!((stub.fractional_length.unwrap() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn sixteenth_dotted_eighth_stub_points_right() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let notes = vec![
            note(0, 0, NoteValue::Sixteenth, 0.0625, 0.0),
            note(1, 1, NoteValue::Eighth, 0.1875, 0.0625),
        ];
        let group = analyzer.analyze(notes, &TimeSignature::common()).unwrap();
        let stub = &group.segments[1];
        assert_eq!((stub.start_note_index, stub.fractional_side), (0, Some(FractionalSide::Right)));
    }

    #[test]
    fn interior_stub_compares_with_previous_note() {
        // eighth, sixteenth, eighth: the sixteenth is shorter than its predecessor
        let shorter = vec![
            note(0, 0, NoteValue::Eighth, 0.125, 0.0),
            note(1, 0, NoteValue::Sixteenth, 0.0625, 0.125),
            note(2, 0, NoteValue::Eighth, 0.125, 0.1875),
        ];
        assert_eq!(fractional_side(&shorter, 1), FractionalSide::Right);

        // sixteenth, sixteenth-in-isolation, eighth: equal to predecessor
        let equal = vec![
            note(0, 0, NoteValue::Sixteenth, 0.0625, 0.0),
            note(1, 0, NoteValue::Sixteenth, 0.0625, 0.0625),
            note(2, 0, NoteValue::Eighth, 0.125, 0.125),
        ];
        assert_eq!(fractional_side(&equal, 1), FractionalSide::Left);
    }

    #[test]
    fn thirty_seconds_break_secondary_beams_at_the_eighth() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let notes: Vec<BeamNote> = (0..8)
            .map(|i| note(i, 0, NoteValue::ThirtySecond, 0.03125, i as f64 / 32.0))
            .collect();
        let group = analyzer.analyze(notes, &TimeSignature::common()).unwrap();

        let spans = |level: u8| -> Vec<(usize, usize)> {
            group
                .segments_at(level)
                .map(|s| (s.start_note_index, s.end_note_index))
                .collect()
        };
        assert_eq!(spans(1), vec![(0, 7)]);
        assert_eq!(spans(2), vec![(0, 3), (4, 7)]);
        assert_eq!(spans(3), vec![(0, 3), (4, 7)]);
        assert_eq!(group.max_level(), 3);
    }

    #[test]
    fn sixteenths_within_a_beat_stay_joined() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let notes: Vec<BeamNote> = (0..4)
            .map(|i| note(i, 0, NoteValue::Sixteenth, 0.0625, 0.25 + i as f64 / 16.0))
            .collect();
        let group = analyzer.analyze(notes, &TimeSignature::common()).unwrap();
        assert_eq!(
            group.segments,
            vec![BeamSegment::full(1, 0, 3), BeamSegment::full(2, 0, 3)]
        );
    }

    #[test]
    fn chord_stem_length_measured_from_nearest_head() {
        let metrics = SmuflMetrics::bravura();
        let analyzer = BeamAnalyzer::new(&metrics, SS);
        let mut notes = eighths(&[-4, -4]);
        notes[0].staff_positions = vec![-6, -4, -2];
        let group = analyzer.analyze(notes, &TimeSignature::common()).unwrap();
        assert_eq!(group.stem_direction, StemDirection::Up);
        assert_min_stem(&group);
        // the chord's top head (-2) is the binding one
        assert!((group.stem_length(0, SS) - MIN_STEM_LENGTH * SS).abs() < 1e-9);
    }
}
