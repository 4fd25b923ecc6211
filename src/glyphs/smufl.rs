//! Metrics backed by SMuFL font metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{GlyphMetricsProvider, BRAVURA_ANCHORS, BRAVURA_WIDTHS};
use crate::error::{LayoutError, Result};

/// The subset of a SMuFL `<font>_metadata.json` the engine needs.
///
/// Other top-level keys of the metadata file (`engravingDefaults`,
/// `glyphBBoxes`, ...) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmuflMetrics {
    /// Font name, as given in the metadata
    #[serde(default)]
    pub font_name: Option<String>,
    #[serde(default)]
    glyph_advance_widths: HashMap<String, f64>,
    #[serde(default)]
    glyphs_with_anchors: HashMap<String, HashMap<String, [f64; 2]>>,
}

impl SmuflMetrics {
    /// Read metrics from SMuFL metadata JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LayoutError::Metadata(format!("SMuFL metadata: {e}")))
    }

    /// Built-in Bravura values for every glyph the engine asks for.
    pub fn bravura() -> Self {
        let glyph_advance_widths = BRAVURA_WIDTHS
            .iter()
            .map(|&(name, w)| (name.to_string(), w))
            .collect();

        let mut glyphs_with_anchors: HashMap<String, HashMap<String, [f64; 2]>> = HashMap::new();
        for &(glyph, anchor, (x, y)) in BRAVURA_ANCHORS {
            glyphs_with_anchors
                .entry(glyph.to_string())
                .or_default()
                .insert(anchor.to_string(), [x, y]);
        }

        Self {
            font_name: Some("Bravura".to_string()),
            glyph_advance_widths,
            glyphs_with_anchors,
        }
    }

    pub fn glyph_count(&self) -> usize {
        self.glyph_advance_widths.len()
    }
}

impl GlyphMetricsProvider for SmuflMetrics {
    fn has_glyph(&self, name: &str) -> bool {
        self.glyph_advance_widths.contains_key(name)
    }

    fn width_of(&self, name: &str) -> Option<f64> {
        self.glyph_advance_widths.get(name).copied()
    }

    fn anchor_of(&self, name: &str, anchor: &str) -> Option<(f64, f64)> {
        self.glyphs_with_anchors
            .get(name)
            .and_then(|anchors| anchors.get(anchor))
            .map(|&[x, y]| (x, y))
    }
}
