//! Which notes of a measure share a beam.
//!
//! Grouping follows the meter: compound meters beam by dotted beat, 4/4
//! beams eighths by half bar (broken at every beat once sixteenths are
//! involved), simple meters over eighths or shorter (2/8, 3/8) beam the
//! whole bar, other simple meters beam by beat.

use super::constants::BEAT_EPSILON;
use crate::model::TimeSignature;

/// A beamable note or chord inside a measure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamCandidate {
    /// Onset from the start of the bar, fraction of a whole note
    pub onset: f64,
    pub beam_count: u8,
}

/// Span of one beam group in whole notes.
pub fn group_span(time: &TimeSignature) -> f64 {
    if is_common_time(time) {
        0.5
    } else if time.denominator >= 8 && !time.is_compound() {
        time.bar_length()
    } else {
        time.beat_length()
    }
}

fn is_common_time(time: &TimeSignature) -> bool {
    time.numerator == 4 && time.denominator == 4
}

/// Group `items` into beams. `None` (a rest, a quarter note, a barline…)
/// ends the running group. Returns indices into `items`; every group has at
/// least two members.
pub fn group_beams(items: &[Option<BeamCandidate>], time: &TimeSignature) -> Vec<Vec<usize>> {
    let span = group_span(time);
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_slot: Option<i64> = None;

    for (i, item) in items.iter().enumerate() {
        match item {
            Some(c) if c.beam_count > 0 => {
                let slot = slot_of(c.onset, span);
                if current_slot != Some(slot) && !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
                current_slot = Some(slot);
                current.push(i);
            }
            _ => {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
                current_slot = None;
            }
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    if is_common_time(time) {
        groups = groups
            .into_iter()
            .flat_map(|g| split_at_beats(g, items))
            .collect();
    }
    groups.retain(|g| g.len() >= 2);
    groups
}

fn slot_of(onset: f64, span: f64) -> i64 {
    if !(span > 0.0) {
        return 0;
    }
    (onset / span + BEAT_EPSILON).floor() as i64
}

/// Half-bar groups in 4/4 that contain sixteenths or shorter are broken at
/// each quarter.
fn split_at_beats(group: Vec<usize>, items: &[Option<BeamCandidate>]) -> Vec<Vec<usize>> {
    let candidate = |i: usize| items[i].unwrap_or(BeamCandidate { onset: 0.0, beam_count: 0 });
    if !group.iter().any(|&i| candidate(i).beam_count >= 2) {
        return vec![group];
    }
    let mut out: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_slot = None;
    for i in group {
        let slot = slot_of(candidate(i).onset, 0.25);
        if current_slot.is_some_and(|s| s != slot) {
            out.push(std::mem::take(&mut current));
        }
        current_slot = Some(slot);
        current.push(i);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(beam_count: u8, onsets: &[f64]) -> Vec<Option<BeamCandidate>> {
        onsets
            .iter()
            .map(|&onset| Some(BeamCandidate { onset, beam_count }))
            .collect()
    }

    #[test]
    fn eighths_in_common_time_beam_by_half_bar() {
        let items = run(1, &[0.0, 0.125, 0.25, 0.375, 0.5, 0.625, 0.75, 0.875]);
        assert_eq!(
            group_beams(&items, &TimeSignature::common()),
            vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]
        );
    }

    #[test]
    fn sixteenths_in_common_time_beam_by_beat() {
        let onsets: Vec<f64> = (0..8).map(|i| i as f64 * 0.0625).collect();
        let items = run(2, &onsets);
        assert_eq!(
            group_beams(&items, &TimeSignature::common()),
            vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]
        );
    }

    #[test]
    fn three_four_beams_by_beat() {
        let items = run(1, &[0.0, 0.125, 0.25, 0.375, 0.5, 0.625]);
        assert_eq!(
            group_beams(&items, &TimeSignature::new(3, 4)),
            vec![vec![0, 1], vec![2, 3], vec![4, 5]]
        );
    }

    #[test]
    fn six_eight_beams_by_dotted_quarter() {
        let items = run(1, &[0.0, 0.125, 0.25, 0.375, 0.5, 0.625]);
        assert_eq!(
            group_beams(&items, &TimeSignature::new(6, 8)),
            vec![vec![0, 1, 2], vec![3, 4, 5]]
        );
    }

    #[test]
    fn short_simple_meters_beam_the_whole_bar() {
        let items = run(1, &[0.0, 0.125, 0.25]);
        assert_eq!(group_beams(&items, &TimeSignature::new(3, 8)), vec![vec![0, 1, 2]]);
        let items = run(1, &[0.0, 0.125, 0.25, 0.375]);
        assert_eq!(
            group_beams(&items, &TimeSignature::new(2, 8)),
            vec![vec![0, 1], vec![2, 3]]
        );
        assert_eq!(group_span(&TimeSignature::new(2, 8)), 0.25);
    }

    #[test]
    fn rests_break_groups_and_singletons_are_dropped() {
        let mut items = run(1, &[0.0, 0.125, 0.25, 0.375]);
        items[1] = None;
        // 0 alone, then 2-3
        assert_eq!(group_beams(&items, &TimeSignature::common()), vec![vec![2, 3]]);
    }

    #[test]
    fn unbeamable_values_end_groups() {
        let items = vec![
            Some(BeamCandidate { onset: 0.0, beam_count: 1 }),
            Some(BeamCandidate { onset: 0.125, beam_count: 0 }),
            Some(BeamCandidate { onset: 0.375, beam_count: 1 }),
        ];
        assert!(group_beams(&items, &TimeSignature::common()).is_empty());
    }
}
