//! Caller-supplied layout configuration.
//!
//! Distances are multiples of the staff space unless noted. `staff_space`
//! and `page_width` are in output units (SVG user units in practice).

use serde::{Deserialize, Serialize};

use super::spacing::SpacingModel;
use crate::error::{LayoutError, Result};
use crate::glyphs::DEFAULT_CACHE_CAPACITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    /// Output units per staff space (distance between two staff lines)
    pub staff_space: f64,
    /// Page width in output units
    pub page_width: f64,
    /// Left and right margin of every system
    pub system_margin: f64,
    /// Space above the first system
    pub top_margin: f64,
    /// Vertical distance from one system's top line to the next
    pub system_height: f64,
    pub measure_min_width: f64,
    /// Minimum gap between consecutive musical elements
    pub note_min_spacing: f64,
    /// Gap at the start of a measure that has no system elements
    pub measure_start_padding: f64,
    /// Gap between the last note's duration space and the barline
    pub measure_end_padding: f64,

    pub spacing_model: SpacingModel,
    /// Base of the exponential model, in (0,1)
    pub exponential_base: f64,
    /// Global multiplier of duration-proportional space
    pub spacing_factor: f64,
    /// Extra factor applied to the durational space of rests
    pub rest_spacing_ratio: f64,
    pub enable_optical_spacing: bool,
    /// Overall strength of optical corrections, 0..1
    pub optical_intensity: f64,
    /// 1 = honor durational proportions, 0 = collapse to textual spacing
    pub consistency_weight: f64,
    /// 0 = airy, 1 = tight minimum gaps
    pub density_preference: f64,
    /// Symbols in the sliding window used for local density
    pub density_window: usize,

    pub enable_beaming: bool,
    pub justify_last_system: bool,
    /// Entries kept by the glyph measurement cache
    pub cache_capacity: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            staff_space: 10.0,
            page_width: 820.0,
            system_margin: 5.0,
            top_margin: 3.0,
            system_height: 13.0,
            measure_min_width: 8.0,
            note_min_spacing: 1.5,
            measure_start_padding: 1.0,
            measure_end_padding: 1.0,
            spacing_model: SpacingModel::SquareRoot,
            exponential_base: 0.7,
            spacing_factor: 1.5,
            rest_spacing_ratio: 0.9,
            enable_optical_spacing: true,
            optical_intensity: 1.0,
            consistency_weight: 0.75,
            density_preference: 0.5,
            density_window: 5,
            enable_beaming: true,
            justify_last_system: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl LayoutOptions {
    /// Read options from JSON; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| LayoutError::Options(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.staff_space > 0.0) {
            return Err(LayoutError::InvalidStaffSpace(self.staff_space));
        }
        let usable = self.usable_width();
        if !(self.page_width > 0.0) || !(usable > 0.0) {
            return Err(LayoutError::InvalidSystemWidth(usable));
        }
        if self.spacing_model == SpacingModel::Exponential
            && !(self.exponential_base > 0.0 && self.exponential_base < 1.0)
        {
            return Err(LayoutError::Options(format!(
                "exponential base {} outside (0,1)",
                self.exponential_base
            )));
        }
        Ok(())
    }

    /// Left edge of every system, in output units.
    pub fn left_edge(&self) -> f64 {
        self.system_margin * self.staff_space
    }

    /// Width available to a system, in output units.
    pub fn usable_width(&self) -> f64 {
        self.page_width - 2.0 * self.system_margin * self.staff_space
    }

    /// Absolute length of `ss` staff spaces.
    pub(crate) fn ss(&self, ss: f64) -> f64 {
        ss * self.staff_space
    }

    /// Gap between consecutive notes before duration scaling.
    pub(crate) fn base_spacing(&self) -> f64 {
        self.note_min_spacing * self.spacing_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let opts = LayoutOptions::from_json(r#"{ "pageWidth": 600, "spacingModel": "logarithmic" }"#)
            .unwrap();
        assert_eq!(opts.page_width, 600.0);
        assert_eq!(opts.spacing_model, SpacingModel::Logarithmic);
        assert_eq!(opts.measure_min_width, 8.0);
    }

    #[test]
    fn margins_wider_than_page_are_rejected() {
        let opts = LayoutOptions { page_width: 90.0, ..Default::default() };
        assert!(matches!(opts.validate(), Err(LayoutError::InvalidSystemWidth(_))));
    }

    #[test]
    fn zero_staff_space_is_rejected() {
        let opts = LayoutOptions { staff_space: 0.0, ..Default::default() };
        assert_eq!(opts.validate(), Err(LayoutError::InvalidStaffSpace(0.0)));
    }

    #[test]
    fn bad_json_is_an_options_error() {
        assert!(matches!(
            LayoutOptions::from_json("{ \"pageWidth\": \"wide\" }"),
            Err(LayoutError::Options(_))
        ));
    }
}
