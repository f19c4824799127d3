//! Arena score model.
//!
//! Every entity that other entities point at lives in a flat arena on the
//! [`Score`] and is addressed through a `Copy` handle. Ownership is
//! explicit: a measure owns its segments, a chord owns its notes, a beam
//! only lists the chords/rests it spans.

mod beam;
mod builder;
mod chord;
mod duration;
mod groups;
mod maps;
mod measure;
mod note;
mod segment;
mod spanner;
mod staff;
mod system;

use serde::{Deserialize, Serialize};

pub use beam::Beam;
pub use builder::{ChordSpec, ScoreBuilder};
pub use chord::{
    Articulation, ArticulationKind, BeamMode, Chord, ChordRest, ChordRestKind, CrossMeasure, GraceKind, Lyrics,
    Placement, Rest, Tremolo,
};
pub use duration::{DurationType, Fraction, NoteHeadType, TDuration, DIVISION};
pub use groups::{GroupNode, Groups};
pub use maps::{SigEvent, SigMap, TempoMap, DEFAULT_TEMPO};
pub use measure::{Frame, FrameKind, MStaff, MarkKind, Measure, MeasureBase, MeasureMark, SectionBreak};
pub use note::{
    Accidental, AccidentalType, Direction, DirectionH, Fingering, FingeringKind, Note, NoteHeadGroup,
};
pub use segment::{
    Ambitus, Annotation, AnnotationKind, BarLine, BarLineType, Breath, Clef, ClefType, KeySig, KeySigEvent,
    Segment, SegmentElement, SegmentType, TimeSig,
};
pub use spanner::{HairpinType, Spanner, SpannerKind, SpannerSegment, SpannerSegmentType};
pub use staff::{HideMode, Staff, StaffTimeSig};
pub use system::{Page, SysStaff, System, SystemDivider};

use crate::style::Style;

/// Voices per staff.
pub const VOICES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeasureId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChordRestId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeamId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpannerId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutMode {
    /// Systems broken into pages
    #[default]
    Page,
    /// Pages without vertical justification, systems centred in the gaps
    Float,
    /// One endless system, no stretching
    Line,
    /// Systems stacked on a single endless page
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub style: Style,
    pub layout_mode: LayoutMode,
    /// Lay out vertical and text frames (off for parts that hide them)
    pub show_vbox: bool,
    pub staves: Vec<Staff>,

    /// Measure arena; the score order is the linked list from `first`
    pub measures: Vec<MeasureBase>,
    pub first: Option<MeasureId>,
    pub last: Option<MeasureId>,

    pub chord_rests: Vec<ChordRest>,
    pub notes: Vec<Note>,
    /// Freed slots are `None`
    pub beams: Vec<Option<Beam>>,
    pub spanners: Vec<Option<Spanner>>,

    /// System arena
    pub systems: Vec<System>,
    /// Systems in layout order
    pub system_list: Vec<SystemId>,
    pub pages: Vec<Page>,

    pub tempo_map: TempoMap,
    pub sig_map: SigMap,
}

impl Score {
    pub fn new(style: Style) -> Self {
        Score {
            style,
            layout_mode: LayoutMode::Page,
            show_vbox: true,
            staves: Vec::new(),
            measures: Vec::new(),
            first: None,
            last: None,
            chord_rests: Vec::new(),
            notes: Vec::new(),
            beams: Vec::new(),
            spanners: Vec::new(),
            systems: Vec::new(),
            system_list: Vec::new(),
            pages: Vec::new(),
            tempo_map: TempoMap::default(),
            sig_map: SigMap::default(),
        }
    }

    pub fn nstaves(&self) -> usize {
        self.staves.len()
    }

    pub fn ntracks(&self) -> usize {
        self.staves.len() * VOICES
    }

    pub fn spatium(&self) -> f64 {
        self.style.spatium
    }

    // ── measure list ──

    pub fn mb(&self, id: MeasureId) -> &MeasureBase {
        &self.measures[id.0]
    }

    pub fn mb_mut(&mut self, id: MeasureId) -> &mut MeasureBase {
        &mut self.measures[id.0]
    }

    pub fn measure(&self, id: MeasureId) -> Option<&Measure> {
        self.measures.get(id.0).and_then(|m| m.as_measure())
    }

    pub fn measure_mut(&mut self, id: MeasureId) -> Option<&mut Measure> {
        self.measures.get_mut(id.0).and_then(|m| m.as_measure_mut())
    }

    pub fn is_measure(&self, id: MeasureId) -> bool {
        self.mb(id).is_measure()
    }

    pub fn add_measure_base(&mut self, mb: MeasureBase) -> MeasureId {
        self.measures.push(mb);
        MeasureId(self.measures.len() - 1)
    }

    /// Score-order iterator over measures and frames.
    pub fn measure_bases(&self) -> MeasureIter<'_> {
        MeasureIter { score: self, cur: self.first }
    }

    pub fn first_measure(&self) -> Option<MeasureId> {
        let mut cur = self.first;
        while let Some(id) = cur {
            if self.is_measure(id) {
                return Some(id);
            }
            cur = self.mb(id).next();
        }
        None
    }

    pub fn last_measure(&self) -> Option<MeasureId> {
        let mut cur = self.last;
        while let Some(id) = cur {
            if self.is_measure(id) {
                return Some(id);
            }
            cur = self.mb(id).prev();
        }
        None
    }

    /// Next item in the list, skipping frames unless `show_vbox` is set.
    pub fn next_layout_item(&self, id: MeasureId) -> Option<MeasureId> {
        if self.show_vbox {
            self.mb(id).next()
        } else {
            self.next_measure(id)
        }
    }

    pub fn next_measure(&self, id: MeasureId) -> Option<MeasureId> {
        let mut cur = self.mb(id).next();
        while let Some(m) = cur {
            if self.is_measure(m) {
                return Some(m);
            }
            cur = self.mb(m).next();
        }
        None
    }

    pub fn prev_measure(&self, id: MeasureId) -> Option<MeasureId> {
        let mut cur = self.mb(id).prev();
        while let Some(m) = cur {
            if self.is_measure(m) {
                return Some(m);
            }
            cur = self.mb(m).prev();
        }
        None
    }

    /// Previous displayed measure.
    pub fn prev_measure_mm(&self, id: MeasureId) -> Option<MeasureId> {
        let mut cur = self.prev_measure(id);
        while let Some(m) = cur {
            let measure = self.measure(m)?;
            if self.style.create_multi_measure_rests {
                if let Some(mmr) = measure.mm_rest {
                    return Some(mmr);
                }
                if measure.mm_rest_count < 0 {
                    cur = self.prev_measure(m);
                    continue;
                }
            }
            return Some(m);
        }
        None
    }

    /// Measure of the score list containing `tick`.
    pub fn tick2measure(&self, tick: i32) -> Option<MeasureId> {
        let mut found = None;
        let mut cur = self.first_measure();
        while let Some(id) = cur {
            let m = self.measure(id)?;
            if m.tick > tick {
                break;
            }
            found = Some(id);
            cur = self.next_measure(id);
        }
        let id = found?;
        let m = self.measure(id)?;
        (tick < m.end_tick() || self.next_measure(id).is_none()).then_some(id)
    }

    // ── elements ──

    pub fn cr(&self, id: ChordRestId) -> &ChordRest {
        &self.chord_rests[id.0]
    }

    pub fn cr_mut(&mut self, id: ChordRestId) -> &mut ChordRest {
        &mut self.chord_rests[id.0]
    }

    pub fn note(&self, id: NoteId) -> &Note {
        &self.notes[id.0]
    }

    pub fn note_mut(&mut self, id: NoteId) -> &mut Note {
        &mut self.notes[id.0]
    }

    pub fn add_chord_rest(&mut self, cr: ChordRest) -> ChordRestId {
        self.chord_rests.push(cr);
        ChordRestId(self.chord_rests.len() - 1)
    }

    pub fn add_note(&mut self, note: Note) -> NoteId {
        self.notes.push(note);
        NoteId(self.notes.len() - 1)
    }

    /// Notes of a chord, lowest first; empty for rests.
    pub fn chord_notes(&self, id: ChordRestId) -> &[NoteId] {
        self.cr(id).chord().map_or(&[], |c| c.notes.as_slice())
    }

    pub fn beam(&self, id: BeamId) -> Option<&Beam> {
        self.beams.get(id.0).and_then(|b| b.as_ref())
    }

    pub fn beam_mut(&mut self, id: BeamId) -> Option<&mut Beam> {
        self.beams.get_mut(id.0).and_then(|b| b.as_mut())
    }

    pub fn add_beam(&mut self, beam: Beam) -> BeamId {
        if let Some(pos) = self.beams.iter().position(|b| b.is_none()) {
            self.beams[pos] = Some(beam);
            return BeamId(pos);
        }
        self.beams.push(Some(beam));
        BeamId(self.beams.len() - 1)
    }

    pub fn free_beam(&mut self, id: BeamId) {
        if let Some(slot) = self.beams.get_mut(id.0) {
            *slot = None;
        }
    }

    pub fn spanner(&self, id: SpannerId) -> Option<&Spanner> {
        self.spanners.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn spanner_mut(&mut self, id: SpannerId) -> Option<&mut Spanner> {
        self.spanners.get_mut(id.0).and_then(|s| s.as_mut())
    }

    pub fn add_spanner(&mut self, spanner: Spanner) -> SpannerId {
        self.spanners.push(Some(spanner));
        SpannerId(self.spanners.len() - 1)
    }

    pub fn remove_spanner(&mut self, id: SpannerId) -> Option<Spanner> {
        self.spanners.get_mut(id.0).and_then(Option::take)
    }

    pub fn spanner_ids(&self) -> impl Iterator<Item = SpannerId> + '_ {
        self.spanners.iter().enumerate().filter(|(_, s)| s.is_some()).map(|(i, _)| SpannerId(i))
    }

    pub fn system(&self, id: SystemId) -> &System {
        &self.systems[id.0]
    }

    pub fn system_mut(&mut self, id: SystemId) -> &mut System {
        &mut self.systems[id.0]
    }

    /// Segment holding a chord/rest: the chord/rest segment of its measure
    /// at its tick. Grace chords resolve to their main chord's segment.
    pub fn cr_segment(&self, id: ChordRestId) -> Option<(MeasureId, usize)> {
        let cr = self.cr(id);
        let main = cr.parent.map_or(cr, |p| self.cr(p));
        let m = self.measure(main.measure)?;
        m.find_segment(SegmentType::ChordRest, main.tick).map(|s| (main.measure, s))
    }

    /// Page-independent x of a chord/rest: measure x + segment x + element x.
    pub fn cr_system_x(&self, id: ChordRestId) -> f64 {
        let Some((mid, sidx)) = self.cr_segment(id) else {
            return 0.0;
        };
        let Some(m) = self.measure(mid) else {
            return 0.0;
        };
        m.x + m.segments[sidx].x + self.cr(id).x
    }

    /// Chord/rest segments of the score list in tick order.
    pub fn chord_rest_segments(&self) -> Vec<(MeasureId, usize)> {
        let mut out = Vec::new();
        let mut cur = self.first_measure();
        while let Some(id) = cur {
            if let Some(m) = self.measure(id) {
                for (i, s) in m.segments.iter().enumerate() {
                    if s.ty.is_chord_rest() {
                        out.push((id, i));
                    }
                }
            }
            cur = self.next_measure(id);
        }
        out
    }
}

pub struct MeasureIter<'a> {
    score: &'a Score,
    cur: Option<MeasureId>,
}

impl Iterator for MeasureIter<'_> {
    type Item = MeasureId;

    fn next(&mut self) -> Option<MeasureId> {
        let id = self.cur?;
        self.cur = self.score.mb(id).next();
        Some(id)
    }
}
