//! Symbolic score model consumed by the layout engine.
//!
//! A [`Staff`] owns its measures, a [`Measure`] owns its elements. The model
//! is built by the caller (a parser or builder) and only read by layout.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// One staff of music: an ordered run of measures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Staff {
    pub measures: Vec<Measure>,
}

/// A single measure (bar) of music.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Measure {
    /// Measure number as printed
    pub number: i32,
    /// Elements in reading order
    pub elements: Vec<MusicalElement>,
    /// Time signature inherited from an earlier measure, when this one has
    /// none of its own. Filled in by [`Staff::propagate_time_signatures`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_time: Option<TimeSignature>,
}

/// The closed set of symbols a measure can contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MusicalElement {
    Clef(Clef),
    KeySignature(KeySignature),
    TimeSignature(TimeSignature),
    Tempo(TempoMark),
    Note(Note),
    Rest(Rest),
    Chord(Chord),
    Barline(Barline),
    Tuplet(Tuplet),
}

/// Clef sign: "G" (treble), "F" (bass), "C" (alto/tenor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClefSign {
    G,
    F,
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clef {
    pub sign: ClefSign,
    /// Staff line the clef sits on, 1 = bottom line
    pub line: i32,
    /// Octave transposition (e.g., -1 for guitar's octave-lower treble clef)
    #[serde(default)]
    pub octave_change: i32,
}

/// Key signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    /// Number of sharps (positive) or flats (negative)
    pub fifths: i32,
}

/// Time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Numerator (e.g., 3 in 3/4)
    pub numerator: i32,
    /// Denominator (e.g., 4 in 3/4)
    pub denominator: i32,
}

/// Metronome mark. Drawn above the staff, takes no horizontal room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoMark {
    pub beat: NoteValue,
    pub per_minute: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Note name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

/// Displayed accidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Accidental {
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    DoubleFlat,
}

/// Written pitch of a notehead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    pub step: Step,
    /// Octave number (middle C = C4)
    pub octave: i32,
    /// Accidental printed in front of the notehead, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accidental: Option<Accidental>,
}

/// Notated rhythmic value, before dots and tuplet scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NoteValue {
    #[serde(rename = "whole")]
    Whole,
    #[serde(rename = "half")]
    Half,
    #[serde(rename = "quarter")]
    Quarter,
    #[serde(rename = "eighth")]
    Eighth,
    #[serde(rename = "16th")]
    Sixteenth,
    #[serde(rename = "32nd")]
    ThirtySecond,
    #[serde(rename = "64th")]
    SixtyFourth,
    #[serde(rename = "128th")]
    HundredTwentyEighth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: Pitch,
    pub value: NoteValue,
    #[serde(default)]
    pub dots: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub value: NoteValue,
    #[serde(default)]
    pub dots: u8,
}

/// Several noteheads sharing one stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub pitches: Vec<Pitch>,
    pub value: NoteValue,
    #[serde(default)]
    pub dots: u8,
}

/// Visual barline style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarlineStyle {
    Single,
    Double,
    Final,
    RepeatStart,
    RepeatEnd,
    RepeatBoth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barline {
    pub style: BarlineStyle,
}

/// `actual` notes in the time of `normal` (3:2 for triplets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuplet {
    pub actual: u32,
    pub normal: u32,
    pub elements: Vec<MusicalElement>,
}

// ═══════════════════════════════════════════════════════════════════════
// Durations
// ═══════════════════════════════════════════════════════════════════════

impl NoteValue {
    /// Length as a fraction of a whole note.
    pub fn fraction(self) -> f64 {
        match self {
            NoteValue::Whole => 1.0,
            NoteValue::Half => 0.5,
            NoteValue::Quarter => 0.25,
            NoteValue::Eighth => 0.125,
            NoteValue::Sixteenth => 0.0625,
            NoteValue::ThirtySecond => 0.03125,
            NoteValue::SixtyFourth => 0.015625,
            NoteValue::HundredTwentyEighth => 0.0078125,
        }
    }

    /// Number of beams (or flags) the value carries.
    pub fn beam_count(self) -> u8 {
        match self {
            NoteValue::Eighth => 1,
            NoteValue::Sixteenth => 2,
            NoteValue::ThirtySecond => 3,
            NoteValue::SixtyFourth => 4,
            NoteValue::HundredTwentyEighth => 5,
            _ => 0,
        }
    }

    /// Multiplier applied to the base gap after a symbol of this value.
    pub fn duration_factor(self) -> f64 {
        match self {
            NoteValue::Whole => 2.0,
            NoteValue::Half => 1.5,
            NoteValue::Quarter => 1.0,
            NoteValue::Eighth => 0.8,
            NoteValue::Sixteenth => 0.7,
            NoteValue::ThirtySecond => 0.6,
            NoteValue::SixtyFourth => 0.55,
            NoteValue::HundredTwentyEighth => 0.5,
        }
    }
}

/// Dotted length: each dot adds half of the previous addition.
fn dotted(value: NoteValue, dots: u8) -> f64 {
    value.fraction() * (2.0 - 0.5f64.powi(dots as i32))
}

impl MusicalElement {
    /// Clef, key, time and tempo: rendered as part of a system prefix.
    pub fn is_system_element(&self) -> bool {
        matches!(
            self,
            MusicalElement::Clef(_)
                | MusicalElement::KeySignature(_)
                | MusicalElement::TimeSignature(_)
                | MusicalElement::Tempo(_)
        )
    }

    /// Notes, rests, chords and tuplets.
    pub fn is_musical(&self) -> bool {
        matches!(
            self,
            MusicalElement::Note(_)
                | MusicalElement::Rest(_)
                | MusicalElement::Chord(_)
                | MusicalElement::Tuplet(_)
        )
    }

    /// Sounding length as a fraction of a whole note.
    pub fn duration(&self) -> Option<f64> {
        match self {
            MusicalElement::Note(n) => Some(dotted(n.value, n.dots)),
            MusicalElement::Rest(r) => Some(dotted(r.value, r.dots)),
            MusicalElement::Chord(c) => Some(dotted(c.value, c.dots)),
            MusicalElement::Tuplet(t) => {
                let inner: f64 = t.elements.iter().filter_map(|e| e.duration()).sum();
                Some(inner * t.ratio())
            }
            _ => None,
        }
    }

    pub fn value(&self) -> Option<NoteValue> {
        match self {
            MusicalElement::Note(n) => Some(n.value),
            MusicalElement::Rest(r) => Some(r.value),
            MusicalElement::Chord(c) => Some(c.value),
            _ => None,
        }
    }

    pub fn dots(&self) -> u8 {
        match self {
            MusicalElement::Note(n) => n.dots,
            MusicalElement::Rest(r) => r.dots,
            MusicalElement::Chord(c) => c.dots,
            _ => 0,
        }
    }

    /// Whether any notehead carries a printed accidental.
    pub fn has_accidental(&self) -> bool {
        match self {
            MusicalElement::Note(n) => n.pitch.accidental.is_some(),
            MusicalElement::Chord(c) => c.pitches.iter().any(|p| p.accidental.is_some()),
            MusicalElement::Tuplet(t) => t.elements.first().is_some_and(|e| e.has_accidental()),
            _ => false,
        }
    }

    pub fn is_barline(&self) -> bool {
        matches!(self, MusicalElement::Barline(_))
    }
}

impl Tuplet {
    /// Duration scaling applied to every child.
    pub fn ratio(&self) -> f64 {
        if self.actual == 0 {
            1.0
        } else {
            self.normal as f64 / self.actual as f64
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Meter
// ═══════════════════════════════════════════════════════════════════════

impl TimeSignature {
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Self { numerator, denominator }
    }

    /// 4/4, used when nothing earlier in the staff says otherwise.
    pub const fn common() -> Self {
        Self::new(4, 4)
    }

    /// Reject non-positive numerators or denominators.
    pub fn validate(&self) -> Result<()> {
        if self.numerator <= 0 || self.denominator <= 0 {
            return Err(LayoutError::InvalidTimeSignature {
                numerator: self.numerator,
                denominator: self.denominator,
            });
        }
        Ok(())
    }

    /// Bar length as a fraction of a whole note.
    pub fn bar_length(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// 6/8, 9/8, 12/8 and friends.
    pub fn is_compound(&self) -> bool {
        self.numerator > 3 && self.numerator % 3 == 0
    }

    /// Length of the felt beat: a dotted unit in compound meters.
    pub fn beat_length(&self) -> f64 {
        let unit = 1.0 / self.denominator as f64;
        if self.is_compound() {
            unit * 3.0
        } else {
            unit
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Pitch and clef geometry
// ═══════════════════════════════════════════════════════════════════════

impl Step {
    fn index(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 1,
            Step::E => 2,
            Step::F => 3,
            Step::G => 4,
            Step::A => 5,
            Step::B => 6,
        }
    }
}

impl Pitch {
    pub const fn new(step: Step, octave: i32) -> Self {
        Self { step, octave, accidental: None }
    }

    pub const fn with_accidental(mut self, accidental: Accidental) -> Self {
        self.accidental = Some(accidental);
        self
    }

    /// Diatonic step count from C0.
    pub fn diatonic_index(&self) -> i32 {
        self.octave * 7 + self.step.index()
    }
}

impl Clef {
    pub const fn treble() -> Self {
        Self { sign: ClefSign::G, line: 2, octave_change: 0 }
    }

    pub const fn bass() -> Self {
        Self { sign: ClefSign::F, line: 4, octave_change: 0 }
    }

    pub const fn alto() -> Self {
        Self { sign: ClefSign::C, line: 3, octave_change: 0 }
    }

    pub const fn tenor() -> Self {
        Self { sign: ClefSign::C, line: 4, octave_change: 0 }
    }

    /// Diatonic index of the pitch sitting on the middle staff line.
    fn middle_line_index(&self) -> i32 {
        let reference = match self.sign {
            ClefSign::G => 4 * 7 + 4, // G4
            ClefSign::F => 3 * 7 + 3, // F3
            ClefSign::C => 4 * 7,     // C4
        };
        reference + (3 - self.line) * 2 + self.octave_change * 7
    }

    /// Staff position in half-spaces: 0 = middle line, positive = up.
    pub fn staff_position(&self, pitch: &Pitch) -> i32 {
        pitch.diatonic_index() - self.middle_line_index()
    }
}

impl Default for Clef {
    fn default() -> Self {
        Self::treble()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Staff helpers
// ═══════════════════════════════════════════════════════════════════════

impl Measure {
    pub fn new(number: i32, elements: Vec<MusicalElement>) -> Self {
        Self { number, elements, inherited_time: None }
    }

    /// The measure's own time signature, if it states one.
    pub fn own_time_signature(&self) -> Option<TimeSignature> {
        self.elements.iter().find_map(|e| match e {
            MusicalElement::TimeSignature(ts) => Some(*ts),
            _ => None,
        })
    }

    pub fn starts_with_barline(&self) -> bool {
        self.elements.first().is_some_and(|e| e.is_barline())
    }

    pub fn ends_with_barline(&self) -> bool {
        self.elements.last().is_some_and(|e| e.is_barline())
    }
}

impl Staff {
    pub fn new(measures: Vec<Measure>) -> Self {
        Self { measures }
    }

    /// Effective time signature of each measure: its own, else the nearest
    /// preceding explicit one, else 4/4.
    pub fn effective_time_signatures(&self) -> Result<Vec<TimeSignature>> {
        let mut current = TimeSignature::common();
        let mut out = Vec::with_capacity(self.measures.len());
        for measure in &self.measures {
            if let Some(ts) = measure.own_time_signature() {
                ts.validate()?;
                current = ts;
            }
            out.push(current);
        }
        Ok(out)
    }

    /// Record the inherited time signature on every measure without one.
    pub fn propagate_time_signatures(&mut self) -> Result<()> {
        let effective = self.effective_time_signatures()?;
        for (measure, ts) in self.measures.iter_mut().zip(effective) {
            measure.inherited_time = if measure.own_time_signature().is_some() {
                None
            } else {
                Some(ts)
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn treble_clef_positions() {
        let clef = Clef::treble();
        assert_eq!(clef.staff_position(&Pitch::new(Step::B, 4)), 0);
        assert_eq!(clef.staff_position(&Pitch::new(Step::E, 4)), -4);
        assert_eq!(clef.staff_position(&Pitch::new(Step::F, 5)), 4);
    }

    #[test]
    fn bass_and_alto_middle_lines() {
        assert_eq!(Clef::bass().staff_position(&Pitch::new(Step::D, 3)), 0);
        assert_eq!(Clef::alto().staff_position(&Pitch::new(Step::C, 4)), 0);
        assert_eq!(Clef::tenor().staff_position(&Pitch::new(Step::A, 3)), 0);
    }

    #[test]
    fn dotted_and_tuplet_durations() {
        let dotted_eighth = MusicalElement::Note(Note {
            pitch: Pitch::new(Step::C, 5),
            value: NoteValue::Eighth,
            dots: 1,
        });
        assert_eq!(dotted_eighth.duration(), Some(0.1875));

        let triplet = MusicalElement::Tuplet(Tuplet {
            actual: 3,
            normal: 2,
            elements: vec![
                MusicalElement::Rest(Rest { value: NoteValue::Eighth, dots: 0 });
                3
            ],
        });
        let d = triplet.duration().unwrap();
        assert!((d - 0.25).abs() < 1e-12);
    }

    #[test]
    fn time_signature_inheritance() {
        let mut staff = Staff::new(vec![
            Measure::new(1, vec![MusicalElement::TimeSignature(TimeSignature::new(3, 4))]),
            Measure::new(2, vec![]),
            Measure::new(3, vec![MusicalElement::TimeSignature(TimeSignature::new(6, 8))]),
            Measure::new(4, vec![]),
        ]);
        staff.propagate_time_signatures().unwrap();
        assert_eq!(staff.measures[0].inherited_time, None);
        assert_eq!(staff.measures[1].inherited_time, Some(TimeSignature::new(3, 4)));
        assert_eq!(staff.measures[3].inherited_time, Some(TimeSignature::new(6, 8)));
    }

    #[test]
    fn default_meter_is_common_time() {
        let staff = Staff::new(vec![Measure::new(1, vec![])]);
        assert_eq!(staff.effective_time_signatures().unwrap(), vec![TimeSignature::common()]);
    }

    #[test]
    fn rejects_zero_denominator() {
        let staff = Staff::new(vec![Measure::new(
            1,
            vec![MusicalElement::TimeSignature(TimeSignature::new(3, 0))],
        )]);
        assert_eq!(
            staff.effective_time_signatures(),
            Err(LayoutError::InvalidTimeSignature { numerator: 3, denominator: 0 })
        );
    }

    #[test]
    fn compound_meter_beat() {
        let ts = TimeSignature::new(6, 8);
        assert!(ts.is_compound());
        assert!((ts.beat_length() - 0.375).abs() < 1e-12);
        assert!(!TimeSignature::new(3, 8).is_compound());
    }
}
