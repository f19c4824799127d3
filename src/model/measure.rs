//! Measures and frames, the units packed into systems.

use serde::{Deserialize, Serialize};

use super::duration::Fraction;
use super::segment::{Segment, SegmentType};
use super::{MeasureId, SystemId};
use crate::shape::Shape;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionBreak {
    /// Pause in seconds after the section
    pub pause: f64,
    pub start_with_long_names: bool,
    pub start_with_measure_one: bool,
}

impl Default for SectionBreak {
    fn default() -> Self {
        SectionBreak { pause: 0.0, start_with_long_names: true, start_with_measure_one: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkKind {
    /// Segno, coda, fine and similar navigation targets
    Marker,
    /// D.C., D.S. and similar instructions
    Jump,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureMark {
    pub kind: MarkKind,
    pub label: String,
    /// Drawn at the right end of the measure
    pub right_aligned: bool,
}

/// Per-staff measure data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MStaff {
    /// Union of the segment shapes, relative to the measure
    pub shape: Shape,
    /// Staff hidden in the system this measure belongs to
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub tick: i32,
    /// Actual length
    pub len: Fraction,
    /// Nominal time signature
    pub timesig: Fraction,
    /// Sorted by (tick, type)
    pub segments: Vec<Segment>,
    /// Displayed measure number (0-based)
    pub no: i32,
    /// Added to the running measure number
    pub no_offset: i32,
    /// Not counted in the measure numbering
    pub irregular: bool,
    pub repeat_start: bool,
    pub repeat_end: bool,
    pub line_break: bool,
    pub page_break: bool,
    pub section_break: Option<SectionBreak>,
    /// User forced the end of a multi-measure rest here
    pub break_mm_rest: bool,
    pub user_stretch: f64,
    pub marks: Vec<MeasureMark>,
    /// Substitute multi-measure rest starting at this measure
    pub mm_rest: Option<MeasureId>,
    /// 0: ordinary, -1: hidden inside a multi-measure rest, n > 0: substitute spanning n measures
    pub mm_rest_count: i32,
    pub prev: Option<MeasureId>,
    pub next: Option<MeasureId>,

    // ── layout output ──
    pub system: Option<SystemId>,
    pub has_system_header: bool,
    pub has_system_trailer: bool,
    pub has_courtesy_keysig: bool,
    /// Position relative to the system
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub mstaves: Vec<MStaff>,
}

impl Measure {
    pub fn new(tick: i32, len: Fraction, nstaves: usize) -> Self {
        Measure {
            tick,
            len,
            timesig: len,
            segments: Vec::new(),
            no: 0,
            no_offset: 0,
            irregular: false,
            repeat_start: false,
            repeat_end: false,
            line_break: false,
            page_break: false,
            section_break: None,
            break_mm_rest: false,
            user_stretch: 1.0,
            marks: Vec::new(),
            mm_rest: None,
            mm_rest_count: 0,
            prev: None,
            next: None,
            system: None,
            has_system_header: false,
            has_system_trailer: false,
            has_courtesy_keysig: false,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            mstaves: vec![MStaff::default(); nstaves],
        }
    }

    pub fn ticks(&self) -> i32 {
        self.len.ticks()
    }

    pub fn end_tick(&self) -> i32 {
        self.tick + self.ticks()
    }

    pub fn is_mm_rest(&self) -> bool {
        self.mm_rest_count > 0
    }

    pub fn nstaves(&self) -> usize {
        self.mstaves.len()
    }

    pub fn find_segment(&self, ty: SegmentType, tick: i32) -> Option<usize> {
        self.segments.iter().position(|s| s.ty == ty && s.tick == tick)
    }

    pub fn first_of(&self, ty: SegmentType) -> Option<usize> {
        self.segments.iter().position(|s| s.ty == ty)
    }

    /// Index of the segment of the given type and tick, inserted in sort
    /// order if missing.
    pub fn get_segment(&mut self, ty: SegmentType, tick: i32) -> usize {
        if let Some(idx) = self.find_segment(ty, tick) {
            return idx;
        }
        let nstaves = self.nstaves();
        let pos = self.segments.partition_point(|s| (s.tick, s.ty) < (tick, ty));
        self.segments.insert(pos, Segment::new(ty, tick, nstaves));
        pos
    }

    pub fn chord_rest_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.ty.is_chord_rest())
    }

    pub fn end_barline_segment(&self) -> Option<usize> {
        self.find_segment(SegmentType::EndBarLine, self.end_tick())
    }

    /// Recompute each chord/rest segment's distance to the next one; the
    /// last runs to the end of the measure.
    pub fn update_segment_ticks(&mut self) {
        let end = self.end_tick();
        let mut next_tick = end;
        for s in self.segments.iter_mut().rev() {
            if s.ty.is_chord_rest() {
                s.ticks = next_tick - s.tick;
                next_tick = s.tick;
            }
        }
    }

    /// Staff shapes are kept in sync with the staff count.
    pub fn resize_staves(&mut self, nstaves: usize) {
        self.mstaves.resize(nstaves, MStaff::default());
        for s in &mut self.segments {
            s.resize_staves(nstaves);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    /// Horizontal gap inside a system
    HBox,
    /// Vertical frame occupying its own system
    VBox,
    /// Text frame occupying its own system
    TBox,
}

/// A box: fixed-size non-musical content in the measure list. Box
/// dimensions and gaps are in spatium units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub kind: FrameKind,
    pub tick: i32,
    /// Horizontal boxes only; vertical boxes span the system width
    pub box_width: f64,
    /// Vertical and text boxes only
    pub box_height: f64,
    pub top_gap: f64,
    pub bottom_gap: f64,
    pub line_break: bool,
    pub page_break: bool,
    pub section_break: Option<SectionBreak>,
    pub prev: Option<MeasureId>,
    pub next: Option<MeasureId>,

    // ── layout output ──
    pub system: Option<SystemId>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn new(kind: FrameKind, tick: i32) -> Self {
        Frame {
            kind,
            tick,
            box_width: 0.0,
            box_height: 0.0,
            top_gap: 0.0,
            bottom_gap: 0.0,
            line_break: false,
            page_break: false,
            section_break: None,
            prev: None,
            next: None,
            system: None,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }
}

/// Closed set of items in the measure list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureBase {
    Measure(Measure),
    Frame(Frame),
}

impl MeasureBase {
    pub fn tick(&self) -> i32 {
        match self {
            MeasureBase::Measure(m) => m.tick,
            MeasureBase::Frame(f) => f.tick,
        }
    }

    pub fn end_tick(&self) -> i32 {
        match self {
            MeasureBase::Measure(m) => m.end_tick(),
            MeasureBase::Frame(f) => f.tick,
        }
    }

    pub fn set_tick(&mut self, tick: i32) {
        match self {
            MeasureBase::Measure(m) => m.tick = tick,
            MeasureBase::Frame(f) => f.tick = tick,
        }
    }

    pub fn prev(&self) -> Option<MeasureId> {
        match self {
            MeasureBase::Measure(m) => m.prev,
            MeasureBase::Frame(f) => f.prev,
        }
    }

    pub fn next(&self) -> Option<MeasureId> {
        match self {
            MeasureBase::Measure(m) => m.next,
            MeasureBase::Frame(f) => f.next,
        }
    }

    pub fn set_prev(&mut self, id: Option<MeasureId>) {
        match self {
            MeasureBase::Measure(m) => m.prev = id,
            MeasureBase::Frame(f) => f.prev = id,
        }
    }

    pub fn set_next(&mut self, id: Option<MeasureId>) {
        match self {
            MeasureBase::Measure(m) => m.next = id,
            MeasureBase::Frame(f) => f.next = id,
        }
    }

    pub fn system(&self) -> Option<SystemId> {
        match self {
            MeasureBase::Measure(m) => m.system,
            MeasureBase::Frame(f) => f.system,
        }
    }

    pub fn set_system(&mut self, system: Option<SystemId>) {
        match self {
            MeasureBase::Measure(m) => m.system = system,
            MeasureBase::Frame(f) => f.system = system,
        }
    }

    pub fn line_break(&self) -> bool {
        match self {
            MeasureBase::Measure(m) => m.line_break,
            MeasureBase::Frame(f) => f.line_break,
        }
    }

    pub fn page_break(&self) -> bool {
        match self {
            MeasureBase::Measure(m) => m.page_break,
            MeasureBase::Frame(f) => f.page_break,
        }
    }

    pub fn section_break(&self) -> Option<&SectionBreak> {
        match self {
            MeasureBase::Measure(m) => m.section_break.as_ref(),
            MeasureBase::Frame(f) => f.section_break.as_ref(),
        }
    }

    /// Any break that ends the system after this item.
    pub fn system_break(&self) -> bool {
        self.line_break() || self.page_break() || self.section_break().is_some()
    }

    pub fn x(&self) -> f64 {
        match self {
            MeasureBase::Measure(m) => m.x,
            MeasureBase::Frame(f) => f.x,
        }
    }

    pub fn width(&self) -> f64 {
        match self {
            MeasureBase::Measure(m) => m.width,
            MeasureBase::Frame(f) => f.width,
        }
    }

    pub fn set_pos(&mut self, x: f64, y: f64) {
        match self {
            MeasureBase::Measure(m) => {
                m.x = x;
                m.y = y;
            }
            MeasureBase::Frame(f) => {
                f.x = x;
                f.y = y;
            }
        }
    }

    pub fn set_width(&mut self, w: f64) {
        match self {
            MeasureBase::Measure(m) => m.width = w,
            MeasureBase::Frame(f) => f.width = w,
        }
    }

    pub fn is_measure(&self) -> bool {
        matches!(self, MeasureBase::Measure(_))
    }

    pub fn is_vbox_like(&self) -> bool {
        matches!(self, MeasureBase::Frame(f) if f.kind != FrameKind::HBox)
    }

    pub fn is_hbox(&self) -> bool {
        matches!(self, MeasureBase::Frame(f) if f.kind == FrameKind::HBox)
    }

    pub fn as_measure(&self) -> Option<&Measure> {
        match self {
            MeasureBase::Measure(m) => Some(m),
            MeasureBase::Frame(_) => None,
        }
    }

    pub fn as_measure_mut(&mut self) -> Option<&mut Measure> {
        match self {
            MeasureBase::Measure(m) => Some(m),
            MeasureBase::Frame(_) => None,
        }
    }

    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            MeasureBase::Frame(f) => Some(f),
            MeasureBase::Measure(_) => None,
        }
    }
}
