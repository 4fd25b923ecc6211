//! Measure placement — walks the staff with the cursor, decides system
//! breaks and gives every symbol a provisional position; then re-spaces each
//! system against the shortest duration found anywhere in it.

use std::ops::Range;

use super::constants::*;
use super::cursor::{LayoutCursor, LayoutPhase};
use super::intelligent::{IntelligentSpacingEngine, SpacingMode, SpacingSymbol};
use super::optical::{OpticalContext, SymbolKind};
use super::options::LayoutOptions;
use super::{PlacedSymbol, PositionedElement};
use crate::glyphs::{self, names, GlyphMetricsProvider, MeasurementCache};
use crate::model::*;

// ═══════════════════════════════════════════════════════════════════════
// Placement structures
// ═══════════════════════════════════════════════════════════════════════

/// Notehead data needed later by the beam stage.
#[derive(Debug, Clone)]
pub(crate) struct BeamSource {
    pub(crate) value: NoteValue,
    pub(crate) duration: f64,
    /// Empty for rests
    pub(crate) staff_positions: Vec<i32>,
}

/// One symbol handed to the spacing engine: a note, rest, chord, interior
/// barline or mid-measure change.
#[derive(Debug, Clone)]
pub(crate) struct MusicalUnit {
    pub(crate) element_index: usize,
    /// Elements drawn at the unit's x (tuplet brackets, tempo marks)
    pub(crate) followers: Vec<usize>,
    pub(crate) symbol: SpacingSymbol,
    /// Accidental room in front of the notehead
    pub(crate) head_offset: f64,
    /// Onset from the start of the bar in whole notes; `None` for symbols
    /// without duration
    pub(crate) onset: Option<f64>,
    pub(crate) beam: Option<BeamSource>,
}

#[derive(Debug, Clone)]
pub(crate) struct MeasurePlan {
    pub(crate) measure_index: usize,
    pub(crate) system_index: usize,
    pub(crate) time: TimeSignature,
    pub(crate) first_in_system: bool,
    /// Left edge
    pub(crate) x: f64,
    pub(crate) system_y: f64,
    pub(crate) middle_line_y: f64,
    /// Where the first unit may start
    pub(crate) content_start: f64,
    /// Width handed to the spacing engine
    pub(crate) budget: f64,
    pub(crate) end_padding: f64,
    /// Narrowest the measure may become (0 for compressed overflow)
    pub(crate) min_width: f64,
    /// Right edge
    pub(crate) barline_x: f64,
    pub(crate) units: Vec<MusicalUnit>,
    /// Closing barline, drawn flush against `barline_x`
    pub(crate) closing: Option<usize>,
    pub(crate) elements: Range<usize>,
}

impl MeasurePlan {
    pub(crate) fn width(&self) -> f64 {
        self.barline_x - self.x
    }

    /// Move the measure and everything in it by `dx`.
    pub(crate) fn translate(&mut self, elements: &mut [PositionedElement<'_>], dx: f64) {
        if dx == 0.0 {
            return;
        }
        self.x += dx;
        self.content_start += dx;
        self.barline_x += dx;
        for e in &mut elements[self.elements.clone()] {
            e.x += dx;
        }
    }

    pub(crate) fn set_barline_x(&mut self, elements: &mut [PositionedElement<'_>], barline_x: f64) {
        self.barline_x = barline_x;
        if let Some(i) = self.closing {
            elements[i].x = barline_x - elements[i].width;
        }
    }

    fn rebase(&mut self, offset: usize) {
        self.elements = self.elements.start + offset..self.elements.end + offset;
        self.closing = self.closing.map(|i| i + offset);
        for unit in &mut self.units {
            unit.element_index += offset;
            for f in &mut unit.followers {
                *f += offset;
            }
        }
    }
}

pub(crate) struct Placement<'s> {
    pub(crate) elements: Vec<PositionedElement<'s>>,
    pub(crate) plans: Vec<MeasurePlan>,
}

/// Clef, key and meter in force at the current point of the staff.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Running {
    clef: Clef,
    fifths: i32,
    time: TimeSignature,
}

impl Default for Running {
    fn default() -> Self {
        Self {
            clef: Clef::treble(),
            fifths: 0,
            time: TimeSignature::common(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrefixKind {
    Clef,
    Key,
    Time,
}

/// A measure split into leading barline, system prefix, body and trailing
/// barline.
struct Sections<'s> {
    leading: Option<(&'s MusicalElement, BarlineStyle)>,
    prefix: &'s [MusicalElement],
    body: &'s [MusicalElement],
    trailing: Option<(&'s MusicalElement, BarlineStyle)>,
}

impl<'s> Sections<'s> {
    fn of(measure: &'s Measure) -> Self {
        let all = measure.elements.as_slice();
        let (leading, rest) = match all.split_first() {
            Some((first, rest)) => match barline_style(first) {
                Some(style) => (Some((first, style)), rest),
                None => (None, all),
            },
            None => (None, all),
        };
        let (trailing, rest) = match rest.split_last() {
            Some((last, init)) => match barline_style(last) {
                Some(style) => (Some((last, style)), init),
                None => (None, rest),
            },
            None => (None, rest),
        };
        let prefix_len = rest.iter().take_while(|e| e.is_system_element()).count();
        let (prefix, body) = rest.split_at(prefix_len);
        Self { leading, prefix, body, trailing }
    }
}

/// Elements of the measure being planned.
struct Emitter<'s> {
    elements: Vec<PositionedElement<'s>>,
    measure_index: usize,
    system_index: usize,
    glyph_total: f64,
}

impl<'s> Emitter<'s> {
    fn push(&mut self, symbol: PlacedSymbol<'s>, x: f64, y: f64, width: f64) -> usize {
        self.glyph_total += width;
        self.elements.push(PositionedElement {
            symbol,
            measure_index: self.measure_index,
            system_index: self.system_index,
            x,
            y,
            width,
        });
        self.elements.len() - 1
    }
}

/// Units of the body, in reading order.
struct Body {
    units: Vec<MusicalUnit>,
    /// Followers waiting for the next unit
    pending: Vec<usize>,
    onset: f64,
    top: f64,
    middle: f64,
}

struct Draft<'s> {
    elements: Vec<PositionedElement<'s>>,
    plan: MeasurePlan,
    running: Running,
}

// ═══════════════════════════════════════════════════════════════════════
// Helper functions
// ═══════════════════════════════════════════════════════════════════════

fn barline_style(element: &MusicalElement) -> Option<BarlineStyle> {
    match element {
        MusicalElement::Barline(b) => Some(b.style),
        _ => None,
    }
}

pub(crate) fn barline_width(style: BarlineStyle) -> f64 {
    let thin = THIN_BARLINE_THICKNESS;
    let thick = THICK_BARLINE_THICKNESS;
    let sep = BARLINE_SEPARATION;
    let dots = REPEAT_BARLINE_DOT_SEPARATION + REPEAT_DOT_WIDTH;
    match style {
        BarlineStyle::Single => thin,
        BarlineStyle::Double => thin + sep + thin,
        BarlineStyle::Final => thin + sep + thick,
        BarlineStyle::RepeatStart | BarlineStyle::RepeatEnd => thick + sep + thin + dots,
        BarlineStyle::RepeatBoth => dots + thin + sep + thick + sep + thin + dots,
    }
}

/// Naturals needed to cancel the old key when changing to the new one.
fn cancellation_natural_count(old_fifths: i32, new_fifths: i32) -> u32 {
    if old_fifths == 0 {
        return 0;
    }
    let same_direction = (old_fifths > 0 && new_fifths > 0) || (old_fifths < 0 && new_fifths < 0);
    if same_direction {
        old_fifths.unsigned_abs().saturating_sub(new_fifths.unsigned_abs())
    } else {
        old_fifths.unsigned_abs()
    }
}

/// Index ranges of consecutive plans that share a system.
pub(crate) fn system_ranges(plans: &[MeasurePlan]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for i in 1..=plans.len() {
        if i == plans.len() || plans[i].system_index != plans[start].system_index {
            ranges.push(start..i);
            start = i;
        }
    }
    ranges
}

// ═══════════════════════════════════════════════════════════════════════
// Cursor walk
// ═══════════════════════════════════════════════════════════════════════

pub(crate) struct Placer<'a, 's> {
    options: &'a LayoutOptions,
    metrics: Option<&'a dyn GlyphMetricsProvider>,
    cache: &'a mut MeasurementCache,
    spacing: &'a IntelligentSpacingEngine,
    staff: &'s Staff,
    times: &'a [TimeSignature],
}

impl<'a, 's> Placer<'a, 's> {
    pub(crate) fn new(
        options: &'a LayoutOptions,
        metrics: Option<&'a dyn GlyphMetricsProvider>,
        cache: &'a mut MeasurementCache,
        spacing: &'a IntelligentSpacingEngine,
        staff: &'s Staff,
        times: &'a [TimeSignature],
    ) -> Self {
        Self { options, metrics, cache, spacing, staff, times }
    }

    pub(crate) fn place(mut self, cursor: &mut LayoutCursor) -> Placement<'s> {
        let left = self.options.left_edge();
        let right = left + self.options.usable_width();
        let system_height = self.options.ss(self.options.system_height);

        let mut running = Running::default();
        let mut elements: Vec<PositionedElement<'s>> = Vec::new();
        let mut plans = Vec::with_capacity(self.staff.measures.len());

        for index in 0..self.staff.measures.len() {
            cursor.transition(LayoutPhase::PlacingMeasure);
            let mut draft = self.plan_measure(index, running, cursor);
            if cursor.needs_break(draft.plan.width(), right) {
                cursor.break_system(left, system_height);
                draft = self.plan_measure(index, running, cursor);
            }
            cursor.finish_measure(draft.plan.barline_x);
            running = draft.running;

            let mut plan = draft.plan;
            plan.rebase(elements.len());
            elements.extend(draft.elements);
            plans.push(plan);
        }
        Placement { elements, plans }
    }

    /// Width of a glyph in output units.
    fn glyph_width(&mut self, name: &str) -> f64 {
        self.cache.width(self.metrics, name) * self.options.staff_space
    }

    fn key_width(&mut self, fifths: i32, previous: i32) -> f64 {
        let gap = KEY_SIGNATURE_ACCIDENTAL_GAP * self.options.staff_space;
        let accidental = if fifths >= 0 { names::ACCIDENTAL_SHARP } else { names::ACCIDENTAL_FLAT };
        let signs = fifths.unsigned_abs() as f64 * (self.glyph_width(accidental) + gap);
        let naturals = cancellation_natural_count(previous, fifths) as f64
            * (self.glyph_width(names::ACCIDENTAL_NATURAL) + gap);
        signs + naturals
    }

    /// Stacked digits: the wider of numerator and denominator.
    fn time_width(&mut self, ts: &TimeSignature) -> f64 {
        let mut digits_width = |n: i32| -> f64 {
            n.to_string()
                .bytes()
                .filter(u8::is_ascii_digit)
                .map(|b| self.glyph_width(names::TIME_SIG_DIGITS[(b - b'0') as usize]))
                .sum()
        };
        let top = digits_width(ts.numerator);
        let bottom = digits_width(ts.denominator);
        top.max(bottom)
    }

    fn plan_measure(&mut self, index: usize, running: Running, cursor: &LayoutCursor) -> Draft<'s> {
        let staff = self.staff;
        let measure = &staff.measures[index];
        let ss = self.options.staff_space;
        let first = cursor.is_first_measure_in_system;
        let top = cursor.current_y;
        let middle = top + MIDDLE_LINE_OFFSET * ss;
        let start_x = cursor.current_x;
        let is_last = index + 1 == staff.measures.len();
        let next_opens = staff.measures.get(index + 1).is_some_and(Measure::starts_with_barline);

        let sections = Sections::of(measure);
        let mut out = Emitter {
            elements: Vec::new(),
            measure_index: index,
            system_index: cursor.current_system,
            glyph_total: 0.0,
        };
        let mut state = running;
        let mut x = start_x;

        // ── Leading barline and system prefix ───────────────────────────
        if let (Some((bar, style)), false) = (sections.leading, first) {
            let w = barline_width(style) * ss;
            out.push(PlacedSymbol::Score(bar), x, top, w);
            x += w;
        }
        let last_kind = self.place_prefix(&mut out, sections.prefix, first, &mut state, &mut x, top);
        if let (Some((bar, style)), true) = (sections.leading, first) {
            let w = barline_width(style) * ss;
            out.push(PlacedSymbol::Score(bar), x, top, w);
            x += w;
        }

        // ── Body ────────────────────────────────────────────────────────
        let mut body = Body { units: Vec::new(), pending: Vec::new(), onset: 0.0, top, middle };
        for element in sections.body {
            self.add_body_element(&mut out, &mut body, &mut state, element, 1.0);
        }

        let mut gap = match last_kind {
            Some(PrefixKind::Clef) => GAP_AFTER_CLEF,
            Some(PrefixKind::Key) => GAP_AFTER_KEY_SIGNATURE,
            Some(PrefixKind::Time) => GAP_AFTER_TIME_SIGNATURE,
            None => self.options.measure_start_padding,
        };
        if body.units.first().is_some_and(|u| u.symbol.context.has_accidental) {
            gap += FIRST_ACCIDENTAL_GAP;
        }
        let content_start = x + gap * ss;

        // provisional offsets: base spacing scaled by duration
        let base = self.options.ss(self.options.base_spacing());
        let mut offsets = Vec::with_capacity(body.units.len());
        let mut content_width = 0.0;
        for unit in &body.units {
            offsets.push(content_width);
            let dots = out.elements[unit.element_index].symbol.element().dots();
            content_width += unit.symbol.width + self.unit_gap(unit, dots, base);
        }

        // ── Width: glyph sum with a floor, overflow compression ─────────
        let closing_style = match sections.trailing {
            Some((_, style)) => Some(style),
            None if !next_opens => Some(if is_last { BarlineStyle::Final } else { BarlineStyle::Single }),
            None => None,
        };
        let closing_width = closing_style.map_or(0.0, |s| barline_width(s) * ss);
        let musical = body.units.iter().filter(|u| u.symbol.duration.is_some()).count();
        let glyph_sum = out.glyph_total
            + closing_width
            + musical.saturating_sub(1) as f64 * self.options.ss(self.options.note_min_spacing);
        let floor = glyph_sum.max(self.options.ss(self.options.measure_min_width));

        let prefix_width = content_start - start_x;
        let end_padding = self.options.ss(self.options.measure_end_padding);
        // never below the collision-free width, unless the system cannot hold it
        let symbols: Vec<SpacingSymbol> = body.units.iter().map(|u| u.symbol.clone()).collect();
        let textual = self.spacing.textual_width(&symbols);
        let mut budget = content_width.max(textual).max(floor - prefix_width - end_padding);
        let mut min_width = floor;
        let usable = self.options.usable_width();
        if first && prefix_width + budget + end_padding > usable {
            let fitted = (usable - prefix_width - end_padding).max(0.0);
            log::debug!(
                "measure {} needs {:.1} but a system holds {:.1}, compressing",
                measure.number,
                prefix_width + budget + end_padding,
                usable
            );
            budget = fitted;
            min_width = 0.0;
        }
        let scale = if content_width > 0.0 { (budget / content_width).min(1.0) } else { 1.0 };

        // trailing followers ride on the last unit
        match body.units.last_mut() {
            Some(last) => last.followers.append(&mut body.pending),
            None => {
                for &f in &body.pending {
                    out.elements[f].x = content_start;
                }
            }
        }
        for (unit, offset) in body.units.iter().zip(&offsets) {
            let unit_x = content_start + offset * scale;
            out.elements[unit.element_index].x = unit_x + unit.head_offset;
            for &f in &unit.followers {
                out.elements[f].x = unit_x;
            }
        }

        // ── Closing barline ─────────────────────────────────────────────
        let barline_x = content_start + budget + end_padding;
        let closing = closing_style.map(|style| {
            let w = barline_width(style) * ss;
            let symbol = match sections.trailing {
                Some((bar, _)) => PlacedSymbol::Score(bar),
                None => PlacedSymbol::Generated(MusicalElement::Barline(Barline { style })),
            };
            out.push(symbol, barline_x - w, top, w)
        });

        let plan = MeasurePlan {
            measure_index: index,
            system_index: cursor.current_system,
            time: self.times[index],
            first_in_system: first,
            x: start_x,
            system_y: top,
            middle_line_y: middle,
            content_start,
            budget,
            end_padding,
            min_width,
            barline_x,
            units: body.units,
            closing,
            elements: 0..out.elements.len(),
        };
        Draft { elements: out.elements, plan, running: state }
    }

    /// Clef, key, time then tempo. At a system start the running clef and
    /// key are always shown; elsewhere only real changes are.
    fn place_prefix(
        &mut self,
        out: &mut Emitter<'s>,
        prefix: &'s [MusicalElement],
        first: bool,
        state: &mut Running,
        x: &mut f64,
        top: f64,
    ) -> Option<PrefixKind> {
        let ss = self.options.staff_space;
        let mut last: Option<PrefixKind> = None;
        let mut place = |out: &mut Emitter<'s>, symbol: PlacedSymbol<'s>, width: f64, kind: PrefixKind, x: &mut f64| {
            if last.is_some() {
                *x += PREFIX_ITEM_GAP * ss;
            }
            out.push(symbol, *x, top, width);
            *x += width;
            last = Some(kind);
        };

        // clef
        let own_clef = prefix.iter().find_map(|e| match e {
            MusicalElement::Clef(c) => Some((e, *c)),
            _ => None,
        });
        let clef = match own_clef {
            Some((e, c)) if first || c != state.clef => Some((PlacedSymbol::Score(e), c)),
            None if first => Some((PlacedSymbol::Generated(MusicalElement::Clef(state.clef)), state.clef)),
            _ => None,
        };
        if let Some((_, c)) = own_clef {
            state.clef = c;
        }
        if let Some((symbol, c)) = clef {
            let w = self.glyph_width(glyphs::clef_glyph(c.sign));
            place(out, symbol, w, PrefixKind::Clef, x);
        }

        // key signature
        let own_key = prefix.iter().find_map(|e| match e {
            MusicalElement::KeySignature(k) => Some((e, *k)),
            _ => None,
        });
        let key = match own_key {
            Some((e, k)) if k.fifths != state.fifths => {
                Some((PlacedSymbol::Score(e), k.fifths, state.fifths))
            }
            Some((e, k)) if first && k.fifths != 0 => Some((PlacedSymbol::Score(e), k.fifths, 0)),
            None if first && state.fifths != 0 => Some((
                PlacedSymbol::Generated(MusicalElement::KeySignature(KeySignature { fifths: state.fifths })),
                state.fifths,
                0,
            )),
            _ => None,
        };
        if let Some((_, k)) = own_key {
            state.fifths = k.fifths;
        }
        if let Some((symbol, fifths, previous)) = key {
            let w = self.key_width(fifths, previous);
            place(out, symbol, w, PrefixKind::Key, x);
        }

        // time signature
        if let Some((e, ts)) = prefix.iter().find_map(|e| match e {
            MusicalElement::TimeSignature(ts) => Some((e, *ts)),
            _ => None,
        }) {
            if first || ts != state.time {
                let w = self.time_width(&ts);
                place(out, PlacedSymbol::Score(e), w, PrefixKind::Time, x);
            }
            state.time = ts;
        }

        // tempo marks take no horizontal room
        for e in prefix.iter().filter(|e| matches!(e, MusicalElement::Tempo(_))) {
            out.push(PlacedSymbol::Score(e), *x, top - TEMPO_MARK_RAISE * ss, 0.0);
        }
        last
    }

    fn add_body_element(
        &mut self,
        out: &mut Emitter<'s>,
        body: &mut Body,
        state: &mut Running,
        element: &'s MusicalElement,
        ratio: f64,
    ) {
        let ss = self.options.staff_space;
        match element {
            MusicalElement::Tempo(_) => {
                let i = out.push(PlacedSymbol::Score(element), 0.0, body.top - TEMPO_MARK_RAISE * ss, 0.0);
                body.pending.push(i);
            }
            MusicalElement::Tuplet(t) => {
                let i = out.push(PlacedSymbol::Score(element), 0.0, body.top, 0.0);
                body.pending.push(i);
                for child in &t.elements {
                    self.add_body_element(out, body, state, child, ratio * t.ratio());
                }
            }
            MusicalElement::Clef(c) => {
                if *c != state.clef {
                    state.clef = *c;
                    let w = self.glyph_width(glyphs::clef_glyph(c.sign));
                    add_plain_unit(out, body, element, w, SymbolKind::Other);
                }
            }
            MusicalElement::KeySignature(k) => {
                if k.fifths != state.fifths {
                    let w = self.key_width(k.fifths, state.fifths);
                    state.fifths = k.fifths;
                    add_plain_unit(out, body, element, w, SymbolKind::Other);
                }
            }
            MusicalElement::TimeSignature(ts) => {
                if *ts != state.time {
                    state.time = *ts;
                    let w = self.time_width(ts);
                    add_plain_unit(out, body, element, w, SymbolKind::Other);
                }
            }
            MusicalElement::Barline(b) => {
                add_plain_unit(out, body, element, barline_width(b.style) * ss, SymbolKind::Barline);
            }
            MusicalElement::Note(_) | MusicalElement::Rest(_) | MusicalElement::Chord(_) => {
                self.add_musical_unit(out, body, state.clef, element, ratio);
            }
        }
    }

    fn add_musical_unit(
        &mut self,
        out: &mut Emitter<'s>,
        body: &mut Body,
        clef: Clef,
        element: &'s MusicalElement,
        ratio: f64,
    ) {
        let ss = self.options.staff_space;
        let duration = element.duration().map(|d| d * ratio);
        let value = element.value();
        let dots = element.dots();

        let (kind, head, positions, accidentals): (SymbolKind, &str, Vec<i32>, Vec<Accidental>) = match element {
            MusicalElement::Note(n) => (
                SymbolKind::Note,
                glyphs::notehead_glyph(n.value),
                vec![clef.staff_position(&n.pitch)],
                n.pitch.accidental.into_iter().collect(),
            ),
            MusicalElement::Chord(c) => (
                SymbolKind::Chord,
                glyphs::notehead_glyph(c.value),
                c.pitches.iter().map(|p| clef.staff_position(p)).collect(),
                c.pitches.iter().filter_map(|p| p.accidental).collect(),
            ),
            MusicalElement::Rest(r) => (SymbolKind::Rest, glyphs::rest_glyph(r.value), Vec::new(), Vec::new()),
            _ => (SymbolKind::Other, names::NOTEHEAD_BLACK, Vec::new(), Vec::new()),
        };

        let head_offset = accidentals
            .iter()
            .map(|&a| self.glyph_width(glyphs::accidental_glyph(a)))
            .fold(0.0, f64::max);
        let dot_width = if dots > 0 {
            dots as f64 * (DOT_SPACING * ss + self.glyph_width(names::AUGMENTATION_DOT))
        } else {
            0.0
        };
        let glyph = self.glyph_width(head) + dot_width;

        // lowest notehead carries the element's y
        let y = positions
            .iter()
            .min()
            .map_or(body.middle, |&low| body.middle - low as f64 * ss / 2.0);
        let index = out.push(PlacedSymbol::Score(element), 0.0, y, glyph);

        let stemmed = matches!(kind, SymbolKind::Note | SymbolKind::Chord) && value != Some(NoteValue::Whole);
        let stem_up = if stemmed {
            positions
                .iter()
                .copied()
                .max_by_key(|&p| (p.abs(), p >= 0))
                .map(|p| p < 0)
        } else {
            None
        };
        let beam_level = match kind {
            SymbolKind::Note | SymbolKind::Chord => value.map_or(0, NoteValue::beam_count),
            _ => 0,
        };
        let context = OpticalContext {
            kind,
            stem_up,
            duration,
            has_accidental: !accidentals.is_empty(),
            is_dotted: dots > 0,
            beam_level,
        };

        let onset = body.onset;
        body.onset += duration.unwrap_or(0.0);
        body.units.push(MusicalUnit {
            element_index: index,
            followers: std::mem::take(&mut body.pending),
            symbol: SpacingSymbol { width: head_offset + glyph, duration, context },
            head_offset,
            onset: Some(onset),
            beam: value.map(|value| BeamSource {
                value,
                duration: duration.unwrap_or(0.0),
                staff_positions: positions,
            }),
        });
    }

    /// Gap after `unit` in the provisional walk.
    fn unit_gap(&self, unit: &MusicalUnit, dots: u8, base: f64) -> f64 {
        let ss = self.options.staff_space;
        match &unit.beam {
            Some(b) => {
                let mut gap = base * b.value.duration_factor() + DOT_SPACING * ss * dots as f64;
                if unit.symbol.context.has_accidental {
                    gap += ACCIDENTAL_SPACING * ss;
                }
                gap
            }
            None => self.options.ss(self.options.note_min_spacing),
        }
    }
}

fn add_plain_unit<'s>(
    out: &mut Emitter<'s>,
    body: &mut Body,
    element: &'s MusicalElement,
    width: f64,
    kind: SymbolKind,
) {
    let index = out.push(PlacedSymbol::Score(element), 0.0, body.top, width);
    body.units.push(MusicalUnit {
        element_index: index,
        followers: std::mem::take(&mut body.pending),
        symbol: SpacingSymbol { width, duration: None, context: OpticalContext::plain(kind) },
        head_offset: 0.0,
        onset: None,
        beam: None,
    });
}

// ═══════════════════════════════════════════════════════════════════════
// System re-spacing
// ═══════════════════════════════════════════════════════════════════════

/// Re-space the units of every measure with the spacing engine, using the
/// shortest duration of the whole system, and move later measures of the
/// system by any change in width.
pub(crate) fn respace_systems(placement: &mut Placement<'_>, spacing: &IntelligentSpacingEngine) {
    let Placement { elements, plans } = placement;
    for range in system_ranges(plans) {
        let shortest = plans[range.clone()]
            .iter()
            .flat_map(|p| &p.units)
            .filter_map(|u| u.symbol.duration)
            .filter(|&d| d > 0.0)
            .min_by(|a, b| a.total_cmp(b));

        let mut shift = 0.0;
        for plan in &mut plans[range] {
            plan.translate(elements, shift);
            let symbols: Vec<SpacingSymbol> = plan.units.iter().map(|u| u.symbol.clone()).collect();
            let result = spacing.space_with_shortest(&symbols, plan.budget, shortest);

            let content = if result.mode == SpacingMode::Empty {
                plan.budget
            } else {
                for pos in &result.positions {
                    let unit = &plan.units[pos.symbol_index];
                    let unit_x = plan.content_start + pos.x_position;
                    elements[unit.element_index].x = unit_x + unit.head_offset;
                    for &f in &unit.followers {
                        elements[f].x = unit_x;
                    }
                }
                result.total_width
            };

            let barline_x = (plan.content_start + content + plan.end_padding).max(plan.x + plan.min_width);
            shift += barline_x - plan.barline_x;
            plan.set_barline_x(elements, barline_x);
        }
    }
}
