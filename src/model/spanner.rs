//! Spanners and the per-system fragments they are drawn as.

use serde::{Deserialize, Serialize};

use super::chord::Placement;
use super::{NoteId, SystemId};
use crate::shape::Shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HairpinType {
    Crescendo,
    Decrescendo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpannerKind {
    Tie,
    Slur,
    Hairpin(HairpinType),
    Volta {
        /// Ending label, e.g. "1."
        label: String,
    },
    Ottava,
    Glissando,
}

impl SpannerKind {
    pub fn is_tie(&self) -> bool {
        matches!(self, SpannerKind::Tie)
    }

    pub fn is_volta(&self) -> bool {
        matches!(self, SpannerKind::Volta { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpannerSegmentType {
    Single,
    Begin,
    Middle,
    End,
}

/// Visual fragment of a spanner within one system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpannerSegment {
    pub system: SystemId,
    pub ty: SpannerSegmentType,
    /// x relative to the system, y relative to the top line of the
    /// spanner's staff
    pub x: f64,
    pub y: f64,
    pub width: f64,
    /// Footprint relative to (x, y)
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanner {
    pub kind: SpannerKind,
    pub track: usize,
    pub track2: usize,
    pub tick: i32,
    pub tick2: i32,
    /// Anchors of note-attached spanners (ties, glissandi)
    pub start_note: Option<NoteId>,
    pub end_note: Option<NoteId>,
    pub placement: Placement,
    pub autoplace: bool,
    pub visible: bool,
    /// Offset the user dragged the spanner by, in absolute units
    pub user_y_offset: f64,

    // ── layout output ──
    pub segments: Vec<SpannerSegment>,
}

impl Spanner {
    pub fn new(kind: SpannerKind, track: usize, tick: i32, tick2: i32) -> Self {
        let placement = match kind {
            SpannerKind::Hairpin(_) => Placement::Below,
            _ => Placement::Above,
        };
        Spanner {
            kind,
            track,
            track2: track,
            tick,
            tick2,
            start_note: None,
            end_note: None,
            placement,
            autoplace: true,
            visible: true,
            user_y_offset: 0.0,
            segments: Vec::new(),
        }
    }

    pub fn ticks(&self) -> i32 {
        self.tick2 - self.tick
    }

    pub fn staff_idx(&self) -> usize {
        self.track / super::VOICES
    }

    /// Overlaps the closed tick range `[stick, etick]`.
    pub fn overlaps(&self, stick: i32, etick: i32) -> bool {
        self.tick <= etick && self.tick2 >= stick
    }
}
