//! Reconciles collision-free ("textual") spacing with duration-proportional
//! ("durational") spacing for a run of symbols and a target width.
//!
//! * textual: glyph width plus a minimum gap, plus accidental clearance
//! * durational: [`SpacingCalculator::space`] of each symbol's duration
//! * too wide → compress the textual layout uniformly
//! * room to spare → give every symbol at least its textual width and share
//!   the remaining budget between durational excess and textual width
//!   according to the consistency weight
//!
//! Optical corrections are applied last and accumulate to the right. A run
//! never ends up wider than its target: a net positive correction is taken
//! back out of the granted padding, or the run is scaled down.

use super::constants::accidental_gap;
use super::optical::{local_density, OpticalCompensator, OpticalContext, SymbolKind};
use super::options::LayoutOptions;
use super::spacing::SpacingCalculator;

/// Overshoot below this (output units) is left alone.
const FIT_EPSILON: f64 = 1e-9;

/// Input symbol for the spacing engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SpacingSymbol {
    /// Glyph width, output units
    pub width: f64,
    /// Time to the next onset as a fraction of a whole note
    pub duration: Option<f64>,
    pub context: OpticalContext,
}

/// Where one symbol ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolPosition {
    pub symbol_index: usize,
    /// Glyph origin, relative to the start of the run
    pub x_position: f64,
    pub width: f64,
    /// Space owned by the symbol besides its glyph (accidental lead + gap)
    pub padding: f64,
    /// Part of the padding granted beyond the textual minimum
    pub compressible_space: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacingMode {
    /// Nothing to place, or no room to place it in
    Empty,
    Compressed,
    Expanded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpacingResult {
    pub positions: Vec<SymbolPosition>,
    /// Width consumed including optical corrections
    pub total_width: f64,
    pub mode: SpacingMode,
}

impl SpacingResult {
    fn empty() -> Self {
        Self { positions: Vec::new(), total_width: 0.0, mode: SpacingMode::Empty }
    }
}

#[derive(Debug, Clone)]
pub struct IntelligentSpacingEngine {
    calculator: SpacingCalculator,
    compensator: Option<OpticalCompensator>,
    staff_space: f64,
    min_gap: f64,
    rest_spacing_ratio: f64,
    consistency_weight: f64,
    density_window: usize,
}

impl IntelligentSpacingEngine {
    /// Assemble from already-built leaf components.
    pub fn new(
        calculator: SpacingCalculator,
        compensator: Option<OpticalCompensator>,
        staff_space: f64,
        min_gap: f64,
    ) -> Self {
        Self {
            calculator,
            compensator,
            staff_space,
            min_gap,
            rest_spacing_ratio: 1.0,
            consistency_weight: 1.0,
            density_window: 5,
        }
    }

    pub fn from_options(options: &LayoutOptions) -> Self {
        let calculator = SpacingCalculator::new(options.spacing_model, options.spacing_factor)
            .with_exponential_base(options.exponential_base);
        let compensator = options
            .enable_optical_spacing
            .then(|| OpticalCompensator::new(options.staff_space, options.optical_intensity));
        // density preference 0 widens the minimum gap by a quarter, 1 narrows it by a quarter
        let density = options.density_preference.clamp(0.0, 1.0);
        let min_gap = options.ss(options.note_min_spacing) * (1.25 - 0.5 * density);

        Self::new(calculator, compensator, options.staff_space, min_gap)
            .with_rest_spacing_ratio(options.rest_spacing_ratio)
            .with_consistency_weight(options.consistency_weight)
            .with_density_window(options.density_window)
    }

    pub fn with_rest_spacing_ratio(mut self, ratio: f64) -> Self {
        if ratio > 0.0 {
            self.rest_spacing_ratio = ratio;
        }
        self
    }

    pub fn with_consistency_weight(mut self, weight: f64) -> Self {
        self.consistency_weight = weight.clamp(0.0, 1.0);
        self
    }

    pub fn with_density_window(mut self, window: usize) -> Self {
        self.density_window = window.max(2);
        self
    }

    pub fn calculator(&self) -> &SpacingCalculator {
        &self.calculator
    }

    /// Collision-free width of `symbols`: glyphs, minimum gaps and
    /// accidental room. Below this a run has to be compressed.
    pub fn textual_width(&self, symbols: &[SpacingSymbol]) -> f64 {
        let densities = self.densities(symbols);
        symbols
            .iter()
            .zip(&densities)
            .map(|(s, &d)| s.width + self.min_gap + self.accidental_lead(s, d))
            .sum()
    }

    fn accidental_lead(&self, symbol: &SpacingSymbol, density: f64) -> f64 {
        if symbol.context.has_accidental {
            accidental_gap(density) * self.staff_space
        } else {
            0.0
        }
    }

    /// Space `symbols` into `target_width`, taking the shortest duration from
    /// the symbols themselves.
    pub fn space(&self, symbols: &[SpacingSymbol], target_width: f64) -> SpacingResult {
        self.space_with_shortest(symbols, target_width, None)
    }

    /// Space `symbols` into `target_width`. `shortest` overrides the shortest
    /// duration when the run is part of a larger system.
    pub fn space_with_shortest(
        &self,
        symbols: &[SpacingSymbol],
        target_width: f64,
        shortest: Option<f64>,
    ) -> SpacingResult {
        if symbols.is_empty() || !(target_width > 0.0) || !target_width.is_finite() {
            return SpacingResult::empty();
        }

        let densities = self.densities(symbols);
        let leads: Vec<f64> = symbols
            .iter()
            .zip(&densities)
            .map(|(s, &d)| self.accidental_lead(s, d))
            .collect();
        let paddings: Vec<f64> = leads.iter().map(|lead| lead + self.min_gap).collect();
        let textual: Vec<f64> = symbols
            .iter()
            .zip(&paddings)
            .map(|(s, p)| s.width + p)
            .collect();
        let textual_total: f64 = textual.iter().sum();

        let mut result = if textual_total > target_width {
            self.compress(symbols, &leads, &paddings, textual_total, target_width)
        } else {
            let shortest = shortest.or_else(|| shortest_duration(symbols));
            self.expand(symbols, &leads, &paddings, &textual, textual_total, target_width, shortest)
        };

        if let Some(compensator) = &self.compensator {
            let shift = apply_optical(compensator, symbols, &densities, &mut result.positions);
            result.total_width += shift;
            fit_within(&mut result, target_width);
        }
        result
    }

    /// Local density per symbol, from the minimum textual layout.
    fn densities(&self, symbols: &[SpacingSymbol]) -> Vec<f64> {
        let mut x = 0.0;
        let mut positions = Vec::with_capacity(symbols.len());
        for s in symbols {
            positions.push(x / self.staff_space);
            x += s.width + self.min_gap;
        }
        (0..symbols.len())
            .map(|i| local_density(&positions, i, self.density_window))
            .collect()
    }

    fn compress(
        &self,
        symbols: &[SpacingSymbol],
        leads: &[f64],
        paddings: &[f64],
        textual_total: f64,
        target_width: f64,
    ) -> SpacingResult {
        let scale = if textual_total > 0.0 { target_width / textual_total } else { 0.0 };
        let mut cursor = 0.0;
        let positions = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let width = s.width * scale;
                let padding = paddings[i] * scale;
                let pos = SymbolPosition {
                    symbol_index: i,
                    x_position: cursor + leads[i] * scale,
                    width,
                    padding,
                    compressible_space: 0.0,
                };
                cursor += width + padding;
                pos
            })
            .collect();
        SpacingResult { positions, total_width: cursor, mode: SpacingMode::Compressed }
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        symbols: &[SpacingSymbol],
        leads: &[f64],
        paddings: &[f64],
        textual: &[f64],
        textual_total: f64,
        target_width: f64,
        shortest: Option<f64>,
    ) -> SpacingResult {
        let durational: Vec<f64> = symbols
            .iter()
            .zip(textual)
            .map(|(s, &t)| match (s.duration, shortest) {
                (Some(d), Some(sh)) if d > 0.0 => {
                    let mut w = self.calculator.space(d, sh) * self.staff_space;
                    if s.context.kind == SymbolKind::Rest {
                        w *= self.rest_spacing_ratio;
                    }
                    w
                }
                _ => t,
            })
            .collect();
        let durational_total: f64 = durational.iter().sum();
        let scale = if durational_total > 0.0 { target_width / durational_total } else { 0.0 };

        let compressible: Vec<f64> = durational
            .iter()
            .zip(textual)
            .map(|(&d, &t)| (d * scale).max(t) - t)
            .collect();
        let compressible_total: f64 = compressible.iter().sum();
        let budget = (target_width - textual_total).max(0.0);
        let weight = if compressible_total > 0.0 { self.consistency_weight } else { 0.0 };

        let mut cursor = 0.0;
        let positions = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let durational_share = if compressible_total > 0.0 {
                    compressible[i] / compressible_total
                } else {
                    0.0
                };
                let textual_share = if textual_total > 0.0 { textual[i] / textual_total } else { 0.0 };
                let extra = budget * (weight * durational_share + (1.0 - weight) * textual_share);
                let pos = SymbolPosition {
                    symbol_index: i,
                    x_position: cursor + leads[i],
                    width: s.width,
                    padding: paddings[i] + extra,
                    compressible_space: extra,
                };
                cursor += textual[i] + extra;
                pos
            })
            .collect();
        SpacingResult { positions, total_width: cursor, mode: SpacingMode::Expanded }
    }
}

/// Shortest positive duration among the symbols.
pub fn shortest_duration(symbols: &[SpacingSymbol]) -> Option<f64> {
    symbols
        .iter()
        .filter_map(|s| s.duration)
        .filter(|&d| d > 0.0)
        .min_by(|a, b| a.total_cmp(b))
}

/// Add each pairwise correction to its symbol and every symbol after it.
/// Returns the final cumulative shift.
fn apply_optical(
    compensator: &OpticalCompensator,
    symbols: &[SpacingSymbol],
    densities: &[f64],
    positions: &mut [SymbolPosition],
) -> f64 {
    let mut cumulative = 0.0;
    for i in 1..positions.len() {
        cumulative += compensator.compensate(&symbols[i - 1].context, &symbols[i].context, densities[i]);
        positions[i].x_position += cumulative;
    }
    cumulative
}

/// Pull a run that optical corrections pushed past `target_width` back
/// inside it. Room granted after the last symbol goes first, then the
/// granted room between symbols in proportion; if that is not enough the
/// whole run is scaled.
fn fit_within(result: &mut SpacingResult, target_width: f64) {
    let excess = result.total_width - target_width;
    let n = result.positions.len();
    if n == 0 || !(excess > FIT_EPSILON) {
        return;
    }

    let trailing = result.positions[n - 1].compressible_space;
    let inner: f64 = result.positions[..n - 1].iter().map(|p| p.compressible_space).sum();
    if trailing + inner >= excess {
        let from_trailing = trailing.min(excess);
        let from_inner = excess - from_trailing;
        let mut shift = 0.0;
        for (i, p) in result.positions.iter_mut().enumerate() {
            p.x_position -= shift;
            let take = if i + 1 == n {
                from_trailing
            } else if inner > 0.0 {
                from_inner * p.compressible_space / inner
            } else {
                0.0
            };
            p.compressible_space -= take;
            p.padding -= take;
            shift += take;
        }
    } else {
        let k = target_width / result.total_width;
        for p in &mut result.positions {
            p.x_position *= k;
            p.width *= k;
            p.padding *= k;
            p.compressible_space *= k;
        }
        result.mode = SpacingMode::Compressed;
    }
    result.total_width = target_width;
}
