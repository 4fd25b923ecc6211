//! Transient placement state for one layout call.

/// Stage of a layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPhase {
    PlacingMeasure,
    BreakingSystem,
    JustifyingSystem,
    AnalyzingBeams,
}

/// Where the next symbol goes. Created at the start of a layout call and
/// dropped at its end.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutCursor {
    pub current_x: f64,
    /// Top staff line of the current system
    pub current_y: f64,
    pub current_system: usize,
    pub is_first_measure_in_system: bool,
    phase: LayoutPhase,
}

impl LayoutCursor {
    pub fn new(left_edge: f64, top_y: f64) -> Self {
        Self {
            current_x: left_edge,
            current_y: top_y,
            current_system: 0,
            is_first_measure_in_system: true,
            phase: LayoutPhase::PlacingMeasure,
        }
    }

    pub fn phase(&self) -> LayoutPhase {
        self.phase
    }

    pub fn transition(&mut self, phase: LayoutPhase) {
        if self.phase != phase {
            log::trace!("layout phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Whether a measure of `width` has to move to a new system.
    pub fn needs_break(&self, width: f64, right_edge: f64) -> bool {
        !self.is_first_measure_in_system && self.current_x + width > right_edge
    }

    /// Start the next system at the left edge, one system height down.
    pub fn break_system(&mut self, left_edge: f64, system_height: f64) {
        self.transition(LayoutPhase::BreakingSystem);
        self.current_system += 1;
        self.current_x = left_edge;
        self.current_y += system_height;
        self.is_first_measure_in_system = true;
        log::debug!("system {} starts at y={:.1}", self.current_system, self.current_y);
        self.transition(LayoutPhase::PlacingMeasure);
    }

    pub fn finish_measure(&mut self, barline_x: f64) {
        self.current_x = barline_x;
        self.is_first_measure_in_system = false;
    }
}
