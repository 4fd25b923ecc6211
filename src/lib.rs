//! engravelib — music notation layout and beaming engine.
//!
//! Takes a symbolic [`Staff`] and computes where every symbol goes:
//! duration-aware horizontal spacing, system breaks, justification to the
//! page width and full beam geometry (stem direction, slope, secondary and
//! fractional beams). Drawing is left to the caller.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use engravelib::*;
//!
//! let staff = Staff::new(vec![Measure::new(1, vec![
//!     MusicalElement::TimeSignature(TimeSignature::new(4, 4)),
//!     MusicalElement::Note(Note { pitch: Pitch::new(Step::C, 5), value: NoteValue::Quarter, dots: 0 }),
//! ])]);
//! let metrics = Arc::new(SmuflMetrics::bravura());
//! let result = layout_staff(&staff, &LayoutOptions::default(), Some(metrics)).unwrap();
//! println!("{} elements, {} systems", result.elements.len(), result.systems.len());
//! ```

pub mod engine;
pub mod error;
pub mod glyphs;
pub mod model;

use std::sync::Arc;

pub use engine::{
    BeamGroup, BeamSegment, LayoutEngine, LayoutOptions, LayoutResult, MeasureExtent, PlacedSymbol,
    PositionedElement, SpacingModel, StemDirection, SystemExtent,
};
pub use error::{LayoutError, Result};
pub use glyphs::{GlyphMetricsProvider, MeasurementCache, SmuflMetrics};
pub use model::*;

/// Lay out a staff in one call.
///
/// Builds a [`LayoutEngine`] from `options` and `metrics` and runs it once.
/// `metrics` may be `None` only when beaming is disabled.
pub fn layout_staff<'s>(
    staff: &'s Staff,
    options: &LayoutOptions,
    metrics: Option<Arc<dyn GlyphMetricsProvider>>,
) -> Result<LayoutResult<'s>> {
    let mut builder = LayoutEngine::builder().options(options.clone());
    if let Some(metrics) = metrics {
        builder = builder.metrics(metrics);
    }
    builder.build()?.layout(staff)
}

/// Convert a layout result to a JSON string.
/// Useful for handing positions to a renderer in another process or language.
pub fn layout_to_json(result: &LayoutResult<'_>) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(|e| LayoutError::Serialization(e.to_string()))
}
