//! The layout engine.
//!
//! A pass walks the measure list once, in tick order. Each measure is
//! prepared when the cursor reaches it (numbering, stems, beams, chord
//! layout, segment shapes), measures are packed into systems by
//! `collect_system` and systems onto pages by `collect_page`.
//!
//! Structural edits (generated clefs, key and time signatures, barlines,
//! multi-measure rests) go through [`Change`]s and are reported to the
//! [`ChangeLog`]; positions, widths and shapes are written in place.

mod accidentals;
mod beams;
mod chordrest;
mod chords;
mod constants;
mod header;
mod measure;
mod mmrest;
mod page;
mod spacing;
mod spanners;
mod system;
mod text;

pub use spacing::{sff2, stretch_for, Spring, SpringMap};

use log::{debug, warn};

use crate::glyphs::{GlyphMetrics, SymId};
use crate::model::{
    ChordRestId, Fraction, LayoutMode, MeasureId, Page, Score, SegmentElement, SegmentType, SystemId,
};
use crate::undo::{self, Change, ChangeLog, SegmentRef};

/// Traversal state of one layout pass.
#[derive(Debug, Clone)]
pub struct LayoutContext {
    pub start_with_long_names: bool,
    pub first_system: bool,
    pub page_changed: bool,
    pub system_changed: bool,
    /// Index of the next page to fill
    pub cur_page: usize,
    pub tick: i32,
    /// Systems of the previous pass still available for reuse
    pub system_list: Vec<SystemId>,
    /// Last system the current page held before this pass
    pub page_old_system: Option<SystemId>,
    /// Last measure the current system held before this pass
    pub system_old_measure: Option<MeasureId>,
    pub range_layout: bool,
    pub range_done: bool,
    pub end_tick: i32,

    pub cur_system: Option<SystemId>,
    pub prev_measure: Option<MeasureId>,
    pub cur_measure: Option<MeasureId>,
    pub next_measure: Option<MeasureId>,
    pub measure_no: i32,
    pub sig: Fraction,
}

impl Default for LayoutContext {
    fn default() -> Self {
        LayoutContext {
            start_with_long_names: true,
            first_system: true,
            page_changed: false,
            system_changed: false,
            cur_page: 0,
            tick: 0,
            system_list: Vec::new(),
            page_old_system: None,
            system_old_measure: None,
            range_layout: false,
            range_done: false,
            end_tick: 0,
            cur_system: None,
            prev_measure: None,
            cur_measure: None,
            next_measure: None,
            measure_no: 0,
            sig: Fraction::default(),
        }
    }
}

impl LayoutContext {
    pub fn new() -> Self {
        LayoutContext::default()
    }
}

/// A layout pass over one score.
pub struct Layout<'a> {
    pub(crate) score: &'a mut Score,
    glyphs: &'a dyn GlyphMetrics,
    log: &'a mut dyn ChangeLog,
}

impl<'a> Layout<'a> {
    pub fn new(score: &'a mut Score, glyphs: &'a dyn GlyphMetrics, log: &'a mut dyn ChangeLog) -> Self {
        Layout { score, glyphs, log }
    }

    pub fn score(&self) -> &Score {
        self.score
    }

    /// Apply a structural edit and report it.
    fn change(&mut self, change: Change) {
        undo::apply(self.score, &change);
        self.log.record(change);
    }

    fn add_element(&mut self, mid: MeasureId, ty: SegmentType, tick: i32, track: usize, element: SegmentElement) {
        let at = SegmentRef::new(mid, ty, tick);
        self.change(Change::AddElement { at, track, element });
    }

    /// Remove whatever occupies a track slot; nothing happens for an
    /// empty slot.
    fn remove_element(&mut self, mid: MeasureId, ty: SegmentType, tick: i32, track: usize) {
        let Some(element) = self
            .score
            .measure(mid)
            .and_then(|m| m.find_segment(ty, tick).map(|s| &m.segments[s]))
            .and_then(|s| s.element(track))
            .cloned()
        else {
            return;
        };
        let at = SegmentRef::new(mid, ty, tick);
        self.change(Change::RemoveElement { at, track, element });
    }

    fn remove_segment(&mut self, mid: MeasureId, ty: SegmentType, tick: i32) {
        let Some(segment) =
            self.score.measure(mid).and_then(|m| m.find_segment(ty, tick).map(|s| m.segments[s].clone()))
        else {
            return;
        };
        let at = SegmentRef::new(mid, ty, tick);
        self.change(Change::RemoveSegment { at, segment });
    }

    /// Width of a black notehead at the score's spatium.
    fn note_head_width(&self) -> f64 {
        self.glyphs.width(SymId::NoteheadBlack, self.score.spatium())
    }

    // ── entry points ──

    /// Lay out the whole score from the first measure.
    pub fn do_layout(&mut self) {
        if self.score.staves.is_empty() || self.score.first.is_none() {
            self.score.system_list.clear();
            self.score.pages.clear();
            let page = self.score.style.page.clone();
            self.score.pages.push(Page { width: page.width, height: page.height, ..Default::default() });
            debug!("layout: empty score");
            return;
        }

        self.connect_ties();

        let mut lc = LayoutContext::new();
        lc.system_list = std::mem::take(&mut self.score.system_list);

        self.get_next_measure(&mut lc);
        self.get_next_measure(&mut lc);
        self.collect_system(&mut lc);
        while self.collect_page(&mut lc) {}

        if self.score.layout_mode == LayoutMode::Line {
            let width = self
                .score
                .pages
                .first()
                .and_then(|p| p.systems.first())
                .map(|s| self.score.system(*s).width);
            if let (Some(w), Some(page)) = (width, self.score.pages.first_mut()) {
                page.width = w;
            }
        }

        self.discard_systems(&lc.system_list);
        self.score.pages.truncate(lc.cur_page);
    }

    /// Lay out only the systems and pages touching `[stick, etick]`,
    /// keeping everything before the page the range starts on.
    pub fn do_layout_range(&mut self, stick: i32, etick: i32) {
        if stick < 0 || etick < 0 {
            self.do_layout();
            return;
        }
        let Some(mut m) = self.score.tick2measure(stick) else {
            warn!("layout range: no measure at tick {stick}, doing a full layout");
            self.do_layout();
            return;
        };
        if let Some(prev) = self.score.prev_measure_mm(m) {
            m = prev;
        }
        if let Some(measure) = self.score.measure(m) {
            if measure.system.is_none() {
                if let Some(mmr) = measure.mm_rest {
                    m = mmr;
                }
            }
        }

        let Some(first_system) = self.range_start_system(m) else {
            debug!("layout range: measure at tick {stick} was never laid out, doing a full layout");
            self.do_layout();
            return;
        };
        let Some(system_index) = self.score.system_list.iter().position(|s| *s == first_system) else {
            self.do_layout();
            return;
        };
        let Some(first_item) = self.score.system(first_system).first_measure() else {
            self.do_layout();
            return;
        };
        let Some(page_idx) = self.score.system(first_system).page else {
            self.do_layout();
            return;
        };

        self.connect_ties();

        let mut lc = LayoutContext::new();
        lc.system_list = self.score.system_list.split_off(system_index);
        lc.cur_page = page_idx;
        lc.cur_system = system_index.checked_sub(1).map(|i| self.score.system_list[i]);
        lc.prev_measure = None;
        lc.cur_measure = self.score.mb(first_item).prev();
        lc.next_measure = Some(first_item);
        lc.measure_no = self.measure_no_of(first_item);
        lc.tick = self.score.mb(first_item).tick();
        lc.range_layout = true;
        lc.end_tick = etick;

        self.get_next_measure(&mut lc);
        self.collect_system(&mut lc);

        loop {
            if !self.collect_page(&mut lc) {
                break;
            }
            let Some(page) = lc.cur_page.checked_sub(1).and_then(|i| self.score.pages.get(i)) else {
                break;
            };
            let last_tick = page
                .systems
                .first()
                .and_then(|s| self.score.system(*s).last_measure())
                .map(|m| self.score.mb(m).tick());
            if lc.range_done && last_tick.is_some_and(|t| t > etick) {
                break;
            }
        }

        if lc.cur_system.is_none() {
            self.score.pages.truncate(lc.cur_page);
        }
        self.score.system_list.extend(lc.system_list);
    }

    /// First system of the page holding measure `m`.
    fn range_start_system(&self, m: MeasureId) -> Option<SystemId> {
        let system = self.score.mb(m).system()?;
        let page = self.score.system(system).page?;
        self.score.pages.get(page)?.systems.first().copied()
    }

    /// Measure number a pass restarting at `id` continues from.
    fn measure_no_of(&self, id: MeasureId) -> i32 {
        if let Some(m) = self.score.measure(id) {
            return m.no;
        }
        self.score.next_measure(id).and_then(|n| self.score.measure(n)).map_or(0, |m| m.no)
    }

    /// Drop systems left over from the previous pass.
    fn discard_systems(&mut self, systems: &[SystemId]) {
        for &sid in systems {
            debug!("layout: discarding system {}", sid.0);
            self.drop_spanner_segments(sid);
            self.score.system_mut(sid).clear();
        }
    }

    /// Chord or rest of `track` starting at `tick`, else the last one
    /// before it, else the first one after it.
    pub fn search_note(&self, tick: i32, track: usize) -> Option<ChordRestId> {
        let mut before = None;
        for (mid, sidx) in self.score.chord_rest_segments() {
            let Some(cr) = self.score.measure(mid).and_then(|m| m.segments[sidx].cr(track)) else {
                continue;
            };
            let t = self.score.cr(cr).tick;
            if t == tick {
                return Some(cr);
            }
            if t > tick {
                return before.or(Some(cr));
            }
            before = Some(cr);
        }
        before
    }

    /// Recompute stems, ties, note-anchored spanners and annotation boxes
    /// without collecting systems again.
    pub fn layout_spanner(&mut self) {
        for (mid, sidx) in self.score.chord_rest_segments() {
            let ntracks = self.score.ntracks();
            for track in 0..ntracks {
                let Some(cr) = self.score.measure(mid).and_then(|m| m.segments[sidx].cr(track)) else {
                    continue;
                };
                if self.score.cr(cr).is_chord() {
                    self.layout_stem1(cr);
                    self.layout_fingerings(cr);
                    let shape = self.chord_rest_shape(cr);
                    self.score.cr_mut(cr).shape = shape;
                }
            }
            self.layout_segment_annotations(mid, sidx);
        }
        let systems = self.score.system_list.clone();
        for sid in systems {
            self.layout_note_spanners(sid);
        }
    }
}
