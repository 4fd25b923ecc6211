//! Horizontal justification: stretch each system so its content reaches the
//! right edge of the usable width.

use super::options::LayoutOptions;
use super::placement::{system_ranges, MeasurePlan};
use super::PositionedElement;

/// Extra space below this (output units) leaves a system untouched.
const JUSTIFY_EPSILON: f64 = 1e-6;

/// Distribute each system's spare width proportionally to every element's
/// distance from the system's left edge. Systems of a single measure, and
/// the last system unless `justify_last_system` is set, keep their spacing.
/// A system that ends past the right edge is always pulled back to it.
pub(crate) fn justify_systems(
    elements: &mut [PositionedElement<'_>],
    plans: &mut [MeasurePlan],
    options: &LayoutOptions,
) {
    let right_edge = options.left_edge() + options.usable_width();
    let ranges = system_ranges(plans);
    let last_system = ranges.len().saturating_sub(1);

    for (system, range) in ranges.into_iter().enumerate() {
        let measures = &mut plans[range];
        let left = measures[0].x;
        let right = measures[measures.len() - 1].barline_x;
        let span = right - left;
        let extra = right_edge - right;
        if !(span > JUSTIFY_EPSILON) {
            continue;
        }

        if extra < -JUSTIFY_EPSILON {
            log::debug!("system {system}: {:.2} past the right edge, compressing", -extra);
        } else if measures.len() < 2 {
            log::debug!("system {system}: single measure, not justified");
            continue;
        } else if system == last_system && !options.justify_last_system {
            log::debug!("system {system}: last system left ragged");
            continue;
        } else if !(extra > JUSTIFY_EPSILON) {
            log::debug!("system {system}: no room to distribute ({extra:.2})");
            continue;
        } else {
            log::debug!("system {system}: distributing {extra:.1} over {} measures", measures.len());
        }

        let stretch = |x: f64| x + extra * (x - left) / span;
        for plan in measures.iter_mut() {
            for i in plan.elements.clone() {
                if Some(i) != plan.closing {
                    elements[i].x = stretch(elements[i].x);
                }
            }
            plan.x = stretch(plan.x);
            plan.content_start = stretch(plan.content_start);
            let barline_x = stretch(plan.barline_x);
            plan.set_barline_x(elements, barline_x);
        }
    }
}
