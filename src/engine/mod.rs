//! Layout engine: measure placement, system breaking, justification and
//! beam analysis.
//!
//! Data flows one way: glyph metrics → spacing → placement → justification
//! → beams. A [`LayoutEngine`] holds only configuration and shared,
//! read-only metrics; every call to [`LayoutEngine::layout`] builds its own
//! cursor, cache and output, so one engine can serve several threads.

mod beam_groups;
mod beams;
mod constants;
mod cursor;
mod intelligent;
mod justify;
mod optical;
mod options;
mod placement;
mod spacing;

pub use beam_groups::{group_beams, group_span, BeamCandidate};
pub use beams::{
    fractional_side, stem_direction, BeamAnalyzer, BeamGroup, BeamNote, BeamSegment, FractionalSide,
    StemDirection,
};
pub use cursor::{LayoutCursor, LayoutPhase};
pub use intelligent::{
    shortest_duration, IntelligentSpacingEngine, SpacingMode, SpacingResult, SpacingSymbol, SymbolPosition,
};
pub use optical::{local_density, OpticalCompensator, OpticalContext, SymbolKind};
pub use options::LayoutOptions;
pub use spacing::{SpacingCalculator, SpacingModel};

use std::sync::Arc;

use serde::Serialize;

use crate::error::{LayoutError, Result};
use crate::glyphs::{GlyphMetricsProvider, MeasurementCache};
use crate::model::{MusicalElement, Staff, TimeSignature};
use placement::{MeasurePlan, MusicalUnit, Placement, Placer};

// ═══════════════════════════════════════════════════════════════════════
// Layout output
// ═══════════════════════════════════════════════════════════════════════

/// What a positioned element draws: a symbol of the score, or one the
/// layout supplied (courtesy clef/key at a system start, closing barlines).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "origin", content = "element", rename_all = "camelCase")]
pub enum PlacedSymbol<'s> {
    Score(&'s MusicalElement),
    Generated(MusicalElement),
}

impl PlacedSymbol<'_> {
    pub fn element(&self) -> &MusicalElement {
        match self {
            PlacedSymbol::Score(e) => e,
            PlacedSymbol::Generated(e) => e,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, PlacedSymbol::Generated(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedElement<'s> {
    pub symbol: PlacedSymbol<'s>,
    pub measure_index: usize,
    pub system_index: usize,
    /// Left edge of the glyph (the notehead, for notes with accidentals)
    pub x: f64,
    /// Notes: the lowest notehead; rests: the middle line; everything else:
    /// the top staff line
    pub y: f64,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureExtent {
    pub measure_index: usize,
    pub system_index: usize,
    pub x: f64,
    pub width: f64,
    pub first_in_system: bool,
    /// Own or inherited
    pub time_signature: TimeSignature,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemExtent {
    pub index: usize,
    /// Top staff line
    pub y: f64,
    pub left: f64,
    pub right: f64,
    pub measure_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult<'s> {
    pub elements: Vec<PositionedElement<'s>>,
    pub beam_groups: Vec<BeamGroup>,
    pub measures: Vec<MeasureExtent>,
    pub systems: Vec<SystemExtent>,
    /// Height the renderer needs for the whole staff
    pub total_height: f64,
}

impl<'s> LayoutResult<'s> {
    pub fn elements_in_system(&self, system: usize) -> impl Iterator<Item = &PositionedElement<'s>> {
        self.elements.iter().filter(move |e| e.system_index == system)
    }

    pub fn elements_in_measure(&self, measure: usize) -> impl Iterator<Item = &PositionedElement<'s>> {
        self.elements.iter().filter(move |e| e.measure_index == measure)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════════════════

/// Assembles a [`LayoutEngine`] once all of its parts are known.
#[derive(Default)]
pub struct LayoutEngineBuilder {
    options: LayoutOptions,
    metrics: Option<Arc<dyn GlyphMetricsProvider>>,
}

impl LayoutEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: LayoutOptions) -> Self {
        self.options = options;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn GlyphMetricsProvider>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and build the engine. Beaming needs glyph
    /// metrics for stem anchors.
    pub fn build(self) -> Result<LayoutEngine> {
        self.options.validate()?;
        if self.options.enable_beaming && self.metrics.is_none() {
            return Err(LayoutError::MissingGlyphMetrics);
        }
        let spacing = IntelligentSpacingEngine::from_options(&self.options);
        Ok(LayoutEngine {
            options: self.options,
            metrics: self.metrics,
            spacing,
        })
    }
}

pub struct LayoutEngine {
    options: LayoutOptions,
    metrics: Option<Arc<dyn GlyphMetricsProvider>>,
    spacing: IntelligentSpacingEngine,
}

impl LayoutEngine {
    pub fn builder() -> LayoutEngineBuilder {
        LayoutEngineBuilder::new()
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    /// Lay out `staff` with a fresh measurement cache.
    pub fn layout<'s>(&self, staff: &'s Staff) -> Result<LayoutResult<'s>> {
        let mut cache = MeasurementCache::new(self.options.cache_capacity);
        self.layout_with_cache(staff, &mut cache)
    }

    /// Lay out `staff`, resolving glyph widths through `cache`.
    pub fn layout_with_cache<'s>(
        &self,
        staff: &'s Staff,
        cache: &mut MeasurementCache,
    ) -> Result<LayoutResult<'s>> {
        let times = staff.effective_time_signatures()?;
        let options = &self.options;
        let metrics = self.metrics.as_deref();

        let mut cursor = LayoutCursor::new(options.left_edge(), options.ss(options.top_margin));
        let mut placement = Placer::new(options, metrics, cache, &self.spacing, staff, &times).place(&mut cursor);
        placement::respace_systems(&mut placement, &self.spacing);

        cursor.transition(LayoutPhase::JustifyingSystem);
        justify::justify_systems(&mut placement.elements, &mut placement.plans, options);

        cursor.transition(LayoutPhase::AnalyzingBeams);
        let beam_groups = match metrics {
            Some(metrics) if options.enable_beaming => self.analyze_beams(&placement, metrics),
            _ => Vec::new(),
        };

        let systems = system_extents(&placement.plans);
        let total_height = options.ss(options.top_margin + systems.len() as f64 * options.system_height);
        let measures = placement.plans.iter().map(measure_extent).collect();
        log::debug!(
            "laid out {} measures in {} systems, {} beam groups",
            staff.measures.len(),
            systems.len(),
            beam_groups.len()
        );

        Ok(LayoutResult {
            elements: placement.elements,
            beam_groups,
            measures,
            systems,
            total_height,
        })
    }

    /// Group and analyse beams measure by measure. A group that cannot be
    /// analysed is logged and skipped.
    fn analyze_beams(&self, placement: &Placement<'_>, metrics: &dyn GlyphMetricsProvider) -> Vec<BeamGroup> {
        let analyzer = BeamAnalyzer::new(metrics, self.options.staff_space);
        let mut groups = Vec::new();

        for plan in &placement.plans {
            let candidates: Vec<Option<BeamCandidate>> = plan.units.iter().map(beam_candidate).collect();
            for members in group_beams(&candidates, &plan.time) {
                let Some(notes) = members
                    .iter()
                    .map(|&i| beam_note(plan, &plan.units[i], placement))
                    .collect::<Option<Vec<BeamNote>>>()
                else {
                    continue;
                };
                if notes.windows(2).any(|w| w[0].system_index != w[1].system_index) {
                    log::debug!("beam group in measure {} crosses a system break, dropped", plan.measure_index);
                    continue;
                }
                match analyzer.analyze(notes, &plan.time) {
                    Ok(group) => groups.push(group),
                    Err(e) => log::warn!("skipping beam group in measure {}: {e}", plan.measure_index),
                }
            }
        }
        groups
    }
}

fn beam_candidate(unit: &MusicalUnit) -> Option<BeamCandidate> {
    let beam = unit.beam.as_ref()?;
    if beam.staff_positions.is_empty() {
        return None;
    }
    Some(BeamCandidate {
        onset: unit.onset?,
        beam_count: beam.value.beam_count(),
    })
}

fn beam_note(plan: &MeasurePlan, unit: &MusicalUnit, placement: &Placement<'_>) -> Option<BeamNote> {
    let beam = unit.beam.as_ref()?;
    let element = &placement.elements[unit.element_index];
    let bar = plan.time.bar_length();
    let onset = unit.onset?;
    Some(BeamNote {
        element_index: unit.element_index,
        measure_index: plan.measure_index,
        system_index: element.system_index,
        x: element.x,
        middle_line_y: plan.middle_line_y,
        staff_positions: beam.staff_positions.clone(),
        value: beam.value,
        duration: beam.duration,
        beat_position: if bar > 0.0 { onset / bar } else { 0.0 },
    })
}

fn measure_extent(plan: &MeasurePlan) -> MeasureExtent {
    MeasureExtent {
        measure_index: plan.measure_index,
        system_index: plan.system_index,
        x: plan.x,
        width: plan.width(),
        first_in_system: plan.first_in_system,
        time_signature: plan.time,
    }
}

fn system_extents(plans: &[MeasurePlan]) -> Vec<SystemExtent> {
    placement::system_ranges(plans)
        .into_iter()
        .map(|range| {
            let first = &plans[range.start];
            let last = &plans[range.end - 1];
            SystemExtent {
                index: first.system_index,
                y: first.system_y,
                left: first.x,
                right: last.barline_x,
                measure_count: range.len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::SmuflMetrics;

    #[test]
    fn beaming_without_metrics_is_a_configuration_error() {
        let err = LayoutEngine::builder().build().err();
        assert_eq!(err, Some(LayoutError::MissingGlyphMetrics));
    }

    #[test]
    fn beaming_off_needs_no_metrics() {
        let options = LayoutOptions { enable_beaming: false, ..Default::default() };
        let engine = LayoutEngine::builder().options(options).build().unwrap();
        let staff = Staff::default();
        let result = engine.layout(&staff).unwrap();
        assert!(result.elements.is_empty());
        assert!(result.systems.is_empty());
    }

    #[test]
    fn invalid_width_is_rejected_at_build() {
        let options = LayoutOptions { page_width: -1.0, ..Default::default() };
        let err = LayoutEngine::builder()
            .options(options)
            .metrics(Arc::new(SmuflMetrics::bravura()))
            .build()
            .err();
        assert!(matches!(err, Some(LayoutError::InvalidSystemWidth(_))));
    }

    #[test]
    fn empty_staff_has_only_the_top_margin() {
        let engine = LayoutEngine::builder()
            .metrics(Arc::new(SmuflMetrics::bravura()))
            .build()
            .unwrap();
        let staff = Staff::default();
        let result = engine.layout(&staff).unwrap();
        assert_eq!(result.total_height, 30.0);
    }
}
