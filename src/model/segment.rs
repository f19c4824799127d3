//! Segments: vertical time slices of a measure.

use serde::{Deserialize, Serialize};

use super::chord::Placement;
use super::duration::Fraction;
use super::ChordRestId;
use crate::glyphs::SymId;
use crate::shape::{Rect, Shape};

/// Segment kinds in the order they sort at a shared tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentType {
    BeginBarLine,
    Clef,
    KeySig,
    Ambitus,
    TimeSig,
    StartRepeatBarLine,
    BarLine,
    ChordRest,
    Breath,
    EndBarLine,
    TimeSigAnnounce,
    KeySigAnnounce,
}

impl SegmentType {
    pub fn is_chord_rest(self) -> bool {
        self == SegmentType::ChordRest
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClefType {
    #[default]
    G,
    G8vb,
    G8va,
    F,
    F8vb,
    /// Alto
    C3,
    /// Tenor
    C4,
    Percussion,
}

impl ClefType {
    pub fn sym(self) -> SymId {
        match self {
            ClefType::G | ClefType::G8vb | ClefType::G8va => SymId::GClef,
            ClefType::F | ClefType::F8vb => SymId::FClef,
            ClefType::C3 | ClefType::C4 => SymId::CClef,
            ClefType::Percussion => SymId::UnpitchedPercussionClef,
        }
    }

    /// Staff position (half spaces from the top line) of the glyph origin.
    pub fn line(self) -> i32 {
        match self {
            ClefType::G | ClefType::G8vb | ClefType::G8va => 6,
            ClefType::F | ClefType::F8vb => 2,
            ClefType::C3 | ClefType::Percussion => 4,
            ClefType::C4 => 2,
        }
    }

    /// Diatonic step (octave * 7 + step, C = 0) sitting on the top line.
    fn top_line_step(self) -> i32 {
        match self {
            ClefType::G | ClefType::Percussion => 5 * 7 + 3,
            ClefType::G8vb => 4 * 7 + 3,
            ClefType::G8va => 6 * 7 + 3,
            ClefType::F => 3 * 7 + 5,
            ClefType::F8vb => 2 * 7 + 5,
            ClefType::C3 => 4 * 7 + 4,
            ClefType::C4 => 4 * 7 + 2,
        }
    }

    /// Staff line of a diatonic step (`octave * 7 + step`, C4 = 28).
    pub fn line_of_step(self, step: i32) -> i32 {
        self.top_line_step() - step
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeySigEvent {
    /// Number of sharps (positive) or flats (negative)
    pub key: i32,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub atonal: bool,
}

impl KeySigEvent {
    pub fn new(key: i32) -> Self {
        KeySigEvent { key, custom: false, atonal: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BarLineType {
    #[default]
    Normal,
    Double,
    StartRepeat,
    EndRepeat,
    Broken,
    End,
    Dotted,
    EndStartRepeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clef {
    pub ty: ClefType,
    pub generated: bool,
    /// Drawn small (mid-system clef changes)
    pub small: bool,
    pub show_courtesy: bool,
    pub visible: bool,
    pub bbox: Rect,
}

impl Clef {
    pub fn new(ty: ClefType, generated: bool) -> Self {
        Clef { ty, generated, small: false, show_courtesy: true, visible: true, bbox: Rect::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySig {
    pub event: KeySigEvent,
    pub generated: bool,
    pub show_courtesy: bool,
    /// Naturals cancelling the previous key (layout output)
    pub naturals: u32,
    pub bbox: Rect,
}

impl KeySig {
    pub fn new(event: KeySigEvent, generated: bool) -> Self {
        KeySig { event, generated, show_courtesy: true, naturals: 0, bbox: Rect::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSig {
    pub sig: Fraction,
    /// Local time signature stretch (staff-local meters)
    pub stretch: Fraction,
    pub generated: bool,
    pub show_courtesy: bool,
    pub bbox: Rect,
}

impl TimeSig {
    pub fn new(sig: Fraction, generated: bool) -> Self {
        TimeSig { sig, stretch: Fraction::new(1, 1), generated, show_courtesy: true, bbox: Rect::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarLine {
    pub ty: BarLineType,
    pub generated: bool,
    pub bbox: Rect,
}

impl BarLine {
    pub fn new(ty: BarLineType, generated: bool) -> Self {
        BarLine { ty, generated, bbox: Rect::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breath {
    /// Pause in seconds pushed to the tempo map
    pub pause: f64,
    pub bbox: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambitus {
    pub top_line: i32,
    pub bottom_line: i32,
    pub bbox: Rect,
}

/// Content of one track slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SegmentElement {
    ChordRest(ChordRestId),
    Clef(Clef),
    KeySig(KeySig),
    TimeSig(TimeSig),
    BarLine(BarLine),
    Breath(Breath),
    Ambitus(Ambitus),
}

impl SegmentElement {
    /// Layout-synthesized element. Chords and rests are always authored.
    pub fn generated(&self) -> bool {
        match self {
            SegmentElement::ChordRest(_) | SegmentElement::Breath(_) | SegmentElement::Ambitus(_) => false,
            SegmentElement::Clef(c) => c.generated,
            SegmentElement::KeySig(k) => k.generated,
            SegmentElement::TimeSig(t) => t.generated,
            SegmentElement::BarLine(b) => b.generated,
        }
    }

    pub fn cr(&self) -> Option<ChordRestId> {
        match self {
            SegmentElement::ChordRest(id) => Some(*id),
            _ => None,
        }
    }

    /// Bounding box of a non chord/rest element, relative to the segment.
    pub fn bbox(&self) -> Option<Rect> {
        match self {
            SegmentElement::ChordRest(_) => None,
            SegmentElement::Clef(c) => c.visible.then_some(c.bbox),
            SegmentElement::KeySig(k) => Some(k.bbox),
            SegmentElement::TimeSig(t) => Some(t.bbox),
            SegmentElement::BarLine(b) => Some(b.bbox),
            SegmentElement::Breath(b) => Some(b.bbox),
            SegmentElement::Ambitus(a) => Some(a.bbox),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AnnotationKind {
    RehearsalMark,
    TempoText {
        /// Quarter notes per second
        tempo: f64,
    },
    Harmony,
    StaffText,
    SystemText,
    Dynamic,
    FiguredBass,
    Symbol,
}

impl AnnotationKind {
    /// Annotations tolerated inside (and merged into) a multi-measure rest.
    pub fn is_mm_rest_compatible(self) -> bool {
        matches!(
            self,
            AnnotationKind::RehearsalMark
                | AnnotationKind::TempoText { .. }
                | AnnotationKind::Harmony
                | AnnotationKind::StaffText
        )
    }

    /// Comparison ignoring payload.
    pub fn same_kind(&self, other: &AnnotationKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Text or symbol attached to a segment rather than to one voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub track: usize,
    pub text: String,
    pub placement: Placement,
    pub autoplace: bool,
    pub visible: bool,
    /// Applies to every staff (system text, tempo, rehearsal marks)
    pub system_flag: bool,

    // ── layout output ──
    pub x: f64,
    pub y: f64,
    pub bbox: Rect,
}

impl Annotation {
    pub fn new(kind: AnnotationKind, track: usize, text: impl Into<String>) -> Self {
        let system_flag = matches!(
            kind,
            AnnotationKind::RehearsalMark | AnnotationKind::TempoText { .. } | AnnotationKind::SystemText
        );
        let placement = match kind {
            AnnotationKind::Dynamic | AnnotationKind::FiguredBass => Placement::Below,
            _ => Placement::Above,
        };
        Annotation {
            kind,
            track,
            text: text.into(),
            placement,
            autoplace: true,
            visible: true,
            system_flag,
            x: 0.0,
            y: 0.0,
            bbox: Rect::default(),
        }
    }

    pub fn staff_idx(&self) -> usize {
        self.track / super::VOICES
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub ty: SegmentType,
    /// Absolute tick
    pub tick: i32,
    /// Ticks to the next chord/rest segment (chord/rest segments only)
    pub ticks: i32,
    /// One slot per track
    pub elements: Vec<Option<SegmentElement>>,
    pub annotations: Vec<Annotation>,
    pub enabled: bool,
    /// Additional space requested before the segment, in spatium units
    pub extra_leading_space: f64,

    // ── layout output ──
    /// Position relative to the measure
    pub x: f64,
    pub width: f64,
    /// Footprint per staff, relative to the segment origin
    pub shapes: Vec<Shape>,
    /// Aligned dot column per staff
    pub dot_pos_x: Vec<f64>,
}

impl Segment {
    pub fn new(ty: SegmentType, tick: i32, nstaves: usize) -> Self {
        Segment {
            ty,
            tick,
            ticks: 0,
            elements: vec![None; nstaves * super::VOICES],
            annotations: Vec::new(),
            enabled: true,
            extra_leading_space: 0.0,
            x: 0.0,
            width: 0.0,
            shapes: vec![Shape::new(); nstaves],
            dot_pos_x: vec![0.0; nstaves],
        }
    }

    pub fn element(&self, track: usize) -> Option<&SegmentElement> {
        self.elements.get(track).and_then(|e| e.as_ref())
    }

    pub fn element_mut(&mut self, track: usize) -> Option<&mut SegmentElement> {
        self.elements.get_mut(track).and_then(|e| e.as_mut())
    }

    pub fn cr(&self, track: usize) -> Option<ChordRestId> {
        self.element(track).and_then(|e| e.cr())
    }

    pub fn is_empty(&self) -> bool {
        self.elements.iter().all(|e| e.is_none())
    }

    pub fn nstaves(&self) -> usize {
        self.shapes.len()
    }

    pub fn min_right(&self) -> f64 {
        self.shapes.iter().fold(0.0, |d, s| d.max(s.right()))
    }

    pub fn min_left(&self) -> f64 {
        self.shapes.iter().fold(0.0, |d, s| d.max(s.left()))
    }

    pub fn resize_staves(&mut self, nstaves: usize) {
        self.elements.resize(nstaves * super::VOICES, None);
        self.shapes.resize(nstaves, Shape::new());
        self.dot_pos_x.resize(nstaves, 0.0);
    }
}
