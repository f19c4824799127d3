//! Packing measures into systems.
//!
//! `collect_system` pulls measures off the cursor until the next one no
//! longer fits, finalizes headers, trailers and end barlines, distributes
//! the leftover width and then lays out everything that depends on final
//! horizontal positions: beams, text, lyrics alignment, spanners and the
//! vertical staff distances of the system.

use log::debug;

use super::{Layout, LayoutContext};
use crate::model::{
    AnnotationKind, Frame, HideMode, LayoutMode, MeasureBase, MeasureId, Placement, SpannerId, SysStaff, System,
    SystemId, VOICES,
};
use crate::shape::{Rect, Shape};
use crate::style::VerticalAlignRange;

impl Layout<'_> {
    // ── system list ──

    /// Reuse the next system of the previous pass or start a fresh one.
    fn get_next_system(&mut self, lc: &mut LayoutContext) -> SystemId {
        let is_vbox = lc.cur_measure.is_some_and(|m| self.score.mb(m).is_vbox_like());
        let sid = if lc.system_list.is_empty() {
            self.score.systems.push(System::default());
            lc.system_old_measure = None;
            SystemId(self.score.systems.len() - 1)
        } else {
            let sid = lc.system_list.remove(0);
            lc.system_old_measure = self.score.system(sid).last_measure();
            self.drop_spanner_segments(sid);
            self.score.system_mut(sid).clear();
            sid
        };
        self.score.system_list.push(sid);

        let nstaves = if is_vbox { 0 } else { self.score.nstaves() };
        let system = self.score.system_mut(sid);
        system.staves.resize(nstaves, SysStaff::default());
        for s in &mut system.staves {
            s.show = true;
        }
        system.vbox = is_vbox;
        lc.cur_system = Some(sid);
        sid
    }

    /// Forget the spanner fragments drawn in a system.
    pub(super) fn drop_spanner_segments(&mut self, sid: SystemId) {
        let ids: Vec<SpannerId> = self.score.system(sid).spanners.clone();
        for id in ids {
            if let Some(sp) = self.score.spanner_mut(id) {
                sp.segments.retain(|seg| seg.system != sid);
            }
        }
        self.score.system_mut(sid).spanners.clear();
    }

    /// The vertical or text frame a system consists of.
    pub(super) fn system_vbox(&self, sid: SystemId) -> Option<&Frame> {
        let system = self.score.system(sid);
        if !system.vbox {
            return None;
        }
        system.first_measure().and_then(|m| self.score.mb(m).as_frame())
    }

    fn hbox_width(&self, id: MeasureId) -> f64 {
        match self.score.mb(id).as_frame() {
            Some(f) if self.score.mb(id).is_hbox() => self.score.style.p(f.box_width),
            _ => 0.0,
        }
    }

    fn measure_stretch(&self, mid: MeasureId) -> f64 {
        let user_stretch = self.score.measure(mid).map_or(1.0, |m| m.user_stretch);
        (user_stretch * self.score.style.measure_spacing).max(1.0)
    }

    // ── collection ──

    /// Collect the next system starting at the cursor. Returns `None` (and
    /// clears the current system) when the cursor ran off the end.
    pub(super) fn collect_system(&mut self, lc: &mut LayoutContext) -> Option<SystemId> {
        let Some(first) = lc.cur_measure else {
            lc.cur_system = None;
            return None;
        };
        let mut ragged_right = self.score.style.no_horizontal_stretch;
        let sid = self.get_next_system(lc);
        self.score.system_mut(sid).long_names = lc.start_with_long_names;
        let xo = self.hbox_width(first);
        self.layout_system(sid, xo);

        let style = &self.score.style;
        let min_measure_width = style.p(style.min_measure_width);
        let system_width = style.system_width();
        let layout_mode = self.score.layout_mode;
        let line_mode = layout_mode == LayoutMode::Line;
        let mut min_width = self.score.system(sid).left_margin;
        let mut first_measure = true;

        while let Some(cur) = lc.cur_measure {
            let old_system = self.score.mb(cur).system();
            self.score.mb_mut(cur).set_system(Some(sid));
            self.score.system_mut(sid).measures.push(cur);

            let mut cautionary_w = 0.0;
            let mut ww = 0.0;
            if self.score.mb(cur).is_hbox() {
                ww = self.hbox_width(cur);
            } else if self.score.is_measure(cur) {
                self.remove_system_trailer(cur);
                if first_measure {
                    self.add_system_header(cur, lc.first_system);
                    ww = self.compute_min_width(cur, true);
                } else {
                    self.remove_system_header(cur);
                    ww = self.compute_min_width(cur, false);
                }
                first_measure = false;
                let stretch = self.measure_stretch(cur);
                ww += self.create_end_barlines(cur, true) * stretch;
                ww = ww.max(min_measure_width);
                self.score.mb_mut(cur).set_width(ww);

                let (w, has_courtesy) = self.cautionary_width(cur);
                cautionary_w = w * stretch;
                if !has_courtesy {
                    ww += cautionary_w;
                }
            }

            // at least one measure per system, even an oversized one
            if !line_mode && self.score.system(sid).measures.len() > 1 && min_width + ww > system_width {
                self.score.system_mut(sid).measures.pop();
                self.score.mb_mut(cur).set_system(old_system);
                break;
            }

            if let Some(prev) = lc.prev_measure {
                if self.score.is_measure(prev) && self.score.mb(prev).system() == Some(sid) {
                    let v = self.create_end_barlines(prev, false);
                    ww += v * self.measure_stretch(prev);
                }
            }

            let item = self.score.mb(cur);
            let pbreak = match layout_mode {
                LayoutMode::Page | LayoutMode::System => item.system_break() || item.is_vbox_like(),
                LayoutMode::Float | LayoutMode::Line => item.is_vbox_like(),
            };
            if lc.range_layout && lc.end_tick < item.tick() && lc.system_old_measure == Some(cur) {
                lc.range_done = true;
                break;
            }

            self.get_next_measure(lc);
            min_width += ww;

            let next_is_box = lc.cur_measure.is_some_and(|m| self.score.mb(m).is_vbox_like());
            if !line_mode && (pbreak || next_is_box || min_width + min_measure_width > system_width) {
                break;
            }
            // the courtesy allowance only matters for the measure that ends the system
            min_width -= cautionary_w;
        }

        if !self.score.system(sid).vbox {
            if let Some(prev) = lc.prev_measure.filter(|p| self.score.is_measure(*p)) {
                self.create_end_barlines(prev, true);
            }
            self.hide_empty_staves(sid, lc.first_system);
        }

        if lc.cur_measure.is_none() && min_width / system_width <= self.score.style.last_system_fill_limit {
            ragged_right = true;
        }

        if !line_mode {
            let last = self.score.system(sid).measures.iter().rev().copied().find(|m| self.score.is_measure(*m));
            if let Some(m) = last {
                if self.add_system_trailer(m) {
                    let is_first = self.score.system(sid).first_measure() == Some(m);
                    self.compute_min_width(m, is_first);
                    let ww = self.score.mb(m).width().max(min_measure_width);
                    self.score.mb_mut(m).set_width(ww);
                }
            }
            self.score.system_mut(sid).width = system_width;
        }

        self.justify_system(sid, line_mode || ragged_right);

        let measures: Vec<MeasureId> =
            self.score.system(sid).measures.iter().copied().filter(|m| self.score.is_measure(*m)).collect();
        self.layout_system_beams(&measures);
        self.layout_system_annotations(&measures);
        self.align_lyrics(&measures);
        for &mid in &measures {
            self.update_measure_shapes(mid);
        }
        self.layout_system_spanners(sid, &measures);
        self.layout2(sid);

        if let Some(lm) = self.score.system(sid).last_measure() {
            let section_break = self.score.mb(lm).section_break().cloned();
            lc.first_system = section_break.is_some() && layout_mode != LayoutMode::Float;
            lc.start_with_long_names = lc.first_system && section_break.is_some_and(|b| b.start_with_long_names);
        }
        lc.system_changed = lc.system_old_measure != self.score.system(sid).last_measure();
        debug!("system {}: {} items", sid.0, self.score.system(sid).measures.len());
        Some(sid)
    }

    /// Share the leftover width among the measures by their duration
    /// weight and place every item of the system. A ragged system keeps
    /// its measures at their minimum widths.
    fn justify_system(&mut self, sid: SystemId, unstretched: bool) {
        let line_mode = self.score.layout_mode == LayoutMode::Line;
        let system_width = self.score.style.system_width();
        let left_margin = self.score.system(sid).left_margin;
        let items = self.score.system(sid).measures.clone();

        let mut min_width = left_margin;
        let mut total_weight = 0.0;
        for &mb in &items {
            if self.score.mb(mb).is_hbox() {
                min_width += self.hbox_width(mb);
            } else if let Some(m) = self.score.measure(mb) {
                min_width += m.width;
                total_weight += f64::from(m.ticks()) * m.user_stretch.max(1.0);
            }
        }
        let rest = if unstretched || total_weight <= 0.0 { 0.0 } else { (system_width - min_width) / total_weight };

        let mut x = left_margin;
        for mb in items {
            let ww = if let Some(m) = self.score.measure(mb) {
                let target = m.width + rest * f64::from(m.ticks()) * m.user_stretch.max(1.0);
                self.score.mb_mut(mb).set_pos(x, 0.0);
                self.stretch_measure(mb, target);
                target
            } else if self.score.mb(mb).is_hbox() {
                let w = self.hbox_width(mb);
                self.score.mb_mut(mb).set_pos(x, 0.0);
                self.score.mb_mut(mb).set_width(w);
                w
            } else {
                self.score.mb_mut(mb).set_pos(x, 0.0);
                self.score.mb_mut(mb).set_width(system_width);
                0.0
            };
            x += ww;
        }
        if line_mode {
            self.score.system_mut(sid).width = x;
        }
    }

    /// Left margin of a system: instrument names and the bracket column,
    /// plus the width of a leading horizontal box.
    fn layout_system(&mut self, sid: SystemId, xo: f64) {
        let style = &self.score.style;
        let font = style.p(style.instrument_name_font_size);
        let long_names = self.score.system(sid).long_names;
        let mut name_width = 0.0_f64;
        for staff in &self.score.staves {
            let name = if long_names { &staff.long_name } else { &staff.short_name };
            if let Some(name) = name {
                name_width = name_width.max(self.glyphs.text_width(name, font));
            }
        }
        let mut margin = 0.0;
        if name_width > 0.0 {
            margin += name_width + style.p(style.instrument_name_distance);
        }
        if self.score.nstaves() > 1 {
            margin += style.p(style.bracket_width);
        }
        self.score.system_mut(sid).left_margin = margin + xo;
    }

    // ── empty staves ──

    /// No chord in any voice of the staff.
    fn is_measure_rest(&self, mid: MeasureId, staff_idx: usize) -> bool {
        let Some(m) = self.score.measure(mid) else {
            return true;
        };
        m.chord_rest_segments().all(|s| {
            s.elements
                .iter()
                .skip(staff_idx * VOICES)
                .take(VOICES)
                .flatten()
                .filter_map(|e| e.cr())
                .all(|id| self.score.cr(id).is_rest())
        })
    }

    /// A chord of another staff of the same part moved into `staff_idx`.
    fn has_cross_staff_notes(&self, sid: SystemId, staff_idx: usize) -> bool {
        let part = self.score.staves[staff_idx].part;
        let part_staves: Vec<usize> =
            (0..self.score.nstaves()).filter(|i| self.score.staves[*i].part == part).collect();
        if part_staves.len() < 2 {
            return false;
        }
        for &mid in &self.score.system(sid).measures {
            let Some(m) = self.score.measure(mid) else {
                continue;
            };
            for seg in m.chord_rest_segments() {
                for &st in &part_staves {
                    for voice in 0..VOICES {
                        let Some(id) = seg.cr(st * VOICES + voice) else {
                            continue;
                        };
                        let cr = self.score.cr(id);
                        if cr.is_chord() && st as i32 + cr.staff_move == staff_idx as i32 {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    /// Decide per staff whether it is drawn in this system.
    pub(super) fn hide_empty_staves(&mut self, sid: SystemId, is_first_system: bool) {
        let nstaves = self.score.nstaves();
        let style = &self.score.style;
        let (hide_empty, dont_hide_first) = (style.hide_empty_staves, style.dont_hide_staves_in_first_system);
        let mut system_is_empty = true;

        for staff_idx in 0..nstaves {
            let staff = &self.score.staves[staff_idx];
            let mode = staff.hide_when_empty;
            let may_hide = mode == HideMode::Always
                || (hide_empty
                    && nstaves > 1
                    && !(is_first_system && dont_hide_first)
                    && mode != HideMode::Never);
            let show = if may_hide {
                let measures = &self.score.system(sid).measures;
                let mut hide = measures.iter().all(|m| self.is_measure_rest(*m, staff_idx));
                if hide && mode == HideMode::Instrument {
                    let part = staff.part;
                    hide = (0..nstaves)
                        .filter(|i| self.score.staves[*i].part == part)
                        .all(|i| measures.iter().all(|m| self.is_measure_rest(*m, i)));
                }
                if hide && self.has_cross_staff_notes(sid, staff_idx) {
                    hide = false;
                }
                !hide && staff.show
            } else {
                true
            };
            if show {
                system_is_empty = false;
            }
            if let Some(ss) = self.score.system_mut(sid).staves.get_mut(staff_idx) {
                ss.show = show;
            }
        }

        if system_is_empty {
            for staff_idx in 0..nstaves {
                if self.score.staves[staff_idx].show_if_empty {
                    if let Some(ss) = self.score.system_mut(sid).staves.get_mut(staff_idx) {
                        ss.show = true;
                        system_is_empty = false;
                    }
                }
            }
        }
        // never a completely empty system
        if system_is_empty {
            if let Some(ss) = self.score.system_mut(sid).staves.first_mut() {
                ss.show = true;
            }
        }
    }

    // ── text and lyrics ──

    /// Tempo changes go to the tempo map; tempo, rehearsal, staff text and
    /// dynamics are moved clear of the staff.
    fn layout_system_annotations(&mut self, measures: &[MeasureId]) {
        for &mid in measures {
            let Some(m) = self.score.measure(mid) else {
                continue;
            };
            let mut work = Vec::new();
            for (sidx, seg) in m.segments.iter().enumerate().filter(|(_, s)| s.ty.is_chord_rest()) {
                for (idx, a) in seg.annotations.iter().enumerate() {
                    work.push((sidx, idx, seg.tick, a.kind));
                }
            }
            for (sidx, idx, tick, kind) in work {
                match kind {
                    AnnotationKind::TempoText { tempo } => {
                        self.score.tempo_map.set_tempo(tick, tempo);
                        self.autoplace_annotation(mid, sidx, idx);
                    }
                    AnnotationKind::RehearsalMark | AnnotationKind::StaffText | AnnotationKind::Dynamic => {
                        self.autoplace_annotation(mid, sidx, idx);
                    }
                    _ => {}
                }
            }
        }
    }

    /// Line up the lyrics of each staff at the granularity the style asks
    /// for.
    fn align_lyrics(&mut self, measures: &[MeasureId]) {
        let nstaves = self.score.nstaves();
        let segments = |layout: &Self, mid: MeasureId| -> Vec<usize> {
            layout.score.measure(mid).map_or_else(Vec::new, |m| {
                m.segments.iter().enumerate().filter(|(_, s)| s.ty.is_chord_rest()).map(|(i, _)| i).collect()
            })
        };
        match self.score.style.vertical_align_range {
            VerticalAlignRange::Segment => {
                for &mid in measures {
                    for sidx in segments(self, mid) {
                        for staff_idx in 0..nstaves {
                            let y_max = self.find_lyrics_max_y(mid, sidx, staff_idx);
                            self.apply_lyrics_offset(mid, sidx, staff_idx, Placement::Below, y_max);
                            let y_min = self.find_lyrics_min_y(mid, sidx, staff_idx);
                            self.apply_lyrics_offset(mid, sidx, staff_idx, Placement::Above, y_min);
                        }
                    }
                }
            }
            VerticalAlignRange::Measure => {
                for &mid in measures {
                    let segs = segments(self, mid);
                    for staff_idx in 0..nstaves {
                        self.align_lyrics_over(&[(mid, segs.clone())], staff_idx);
                    }
                }
            }
            VerticalAlignRange::System => {
                let all: Vec<(MeasureId, Vec<usize>)> = measures.iter().map(|&m| (m, segments(self, m))).collect();
                for staff_idx in 0..nstaves {
                    self.align_lyrics_over(&all, staff_idx);
                }
            }
        }
    }

    fn align_lyrics_over(&mut self, range: &[(MeasureId, Vec<usize>)], staff_idx: usize) {
        let mut y_max = 0.0_f64;
        let mut y_min = 0.0_f64;
        for (mid, segs) in range {
            for &sidx in segs {
                y_max = y_max.max(self.find_lyrics_max_y(*mid, sidx, staff_idx));
                y_min = y_min.min(self.find_lyrics_min_y(*mid, sidx, staff_idx));
            }
        }
        for (mid, segs) in range {
            for &sidx in segs {
                self.apply_lyrics_offset(*mid, sidx, staff_idx, Placement::Below, y_max);
                self.apply_lyrics_offset(*mid, sidx, staff_idx, Placement::Above, y_min);
            }
        }
    }

    // ── shapes ──

    /// Footprint of one staff of a measure in measure coordinates: every
    /// segment shape plus the staff lines.
    pub(super) fn measure_staff_shape(&self, mid: MeasureId, staff_idx: usize) -> Shape {
        let mut shape = Shape::new();
        let Some(m) = self.score.measure(mid) else {
            return shape;
        };
        for seg in m.segments.iter().filter(|s| s.enabled) {
            if let Some(s) = seg.shapes.get(staff_idx) {
                shape.add(&s.translated(seg.x, 0.0));
            }
        }
        let height = self.score.staves.get(staff_idx).map_or(0.0, |s| s.height_sp()) * self.score.spatium();
        shape.add_rect(Rect::new(0.0, 0.0, m.width, height));
        shape
    }

    fn update_measure_shapes(&mut self, mid: MeasureId) {
        for staff_idx in 0..self.score.nstaves() {
            let shape = self.measure_staff_shape(mid, staff_idx);
            if let Some(ms) = self.score.measure_mut(mid).and_then(|m| m.mstaves.get_mut(staff_idx)) {
                ms.shape = shape;
            }
        }
    }

    /// Union of a staff's measure shapes, in system coordinates.
    fn system_staff_shape(&self, sid: SystemId, staff_idx: usize) -> Shape {
        let mut shape = Shape::new();
        for &mid in &self.score.system(sid).measures {
            if let Some(ms) = self.score.measure(mid).and_then(|m| m.mstaves.get(staff_idx).map(|s| (m.x, s))) {
                shape.add(&ms.1.shape.translated(ms.0, 0.0));
            }
        }
        shape
    }

    // ── vertical layout ──

    /// Place the visible staves of a system below each other and set the
    /// system height.
    fn layout2(&mut self, sid: SystemId) {
        let style = &self.score.style;
        if let Some(frame) = self.system_vbox(sid) {
            let height = style.p(frame.box_height);
            self.score.system_mut(sid).height = height;
            if let Some(m) = self.score.system(sid).first_measure() {
                if let MeasureBase::Frame(f) = self.score.mb_mut(m) {
                    f.height = height;
                }
            }
            return;
        }

        let sp = self.score.spatium();
        let (staff_distance, akkolade_distance) = (style.p(style.staff_distance), style.p(style.akkolade_distance));
        let shapes: Vec<Shape> = (0..self.score.nstaves()).map(|i| self.system_staff_shape(sid, i)).collect();
        let heights: Vec<f64> = self.score.staves.iter().map(|s| s.height_sp() * sp).collect();

        let mut y = 0.0;
        let mut prev: Option<usize> = None;
        let mut bottom = 0.0;
        for staff_idx in 0..self.score.nstaves() {
            let show = self.score.system(sid).staves.get(staff_idx).is_some_and(|s| s.show);
            if show {
                if let Some(p) = prev {
                    let same_part = self.score.staves[p].part == self.score.staves[staff_idx].part;
                    let dist = if same_part { akkolade_distance } else { staff_distance }
                        + self.score.staves[staff_idx].user_dist * sp;
                    let clearance = shapes[p].min_vertical_distance(&shapes[staff_idx]);
                    y += (heights[p] + dist).max(clearance);
                }
                prev = Some(staff_idx);
                bottom = y + heights[staff_idx];
            }
            if let Some(ss) = self.score.system_mut(sid).staves.get_mut(staff_idx) {
                ss.y = y;
                ss.height = if show { heights[staff_idx] } else { 0.0 };
            }
        }
        self.score.system_mut(sid).height = bottom;
    }

    /// How far the content of the first visible staff reaches above it.
    pub(super) fn min_top(&self, sid: SystemId) -> f64 {
        let Some(staff_idx) = self.score.system(sid).first_visible_staff() else {
            return 0.0;
        };
        let shape = self.system_staff_shape(sid, staff_idx);
        if shape.is_empty() {
            return 0.0;
        }
        (-shape.top()).max(0.0)
    }

    /// How far the content of the last visible staff reaches below it.
    pub(super) fn min_bottom(&self, sid: SystemId) -> f64 {
        let system = self.score.system(sid);
        let Some(staff_idx) = system.last_visible_staff() else {
            return 0.0;
        };
        let shape = self.system_staff_shape(sid, staff_idx);
        if shape.is_empty() {
            return 0.0;
        }
        (shape.bottom() - system.staves[staff_idx].height).max(0.0)
    }

    /// Distance between the bottom of `s1` and the top of `s2`.
    pub(super) fn min_distance(&self, s1: SystemId, s2: SystemId) -> f64 {
        if let Some(f) = self.system_vbox(s1) {
            return self.score.style.p(f.bottom_gap);
        }
        if let Some(f) = self.system_vbox(s2) {
            return self.score.style.p(f.top_gap);
        }
        let style = &self.score.style;
        let min = style.p(style.min_system_distance);
        let (Some(last), Some(first)) =
            (self.score.system(s1).last_visible_staff(), self.score.system(s2).first_visible_staff())
        else {
            return min;
        };
        let upper = self.system_staff_shape(s1, last);
        let lower = self.system_staff_shape(s2, first);
        let clearance = upper.min_vertical_distance(&lower) - self.score.system(s1).staves[last].height;
        min.max(clearance)
    }

    /// Page break requested after the last item of a system.
    pub(super) fn system_page_break(&self, sid: SystemId) -> bool {
        self.score.system(sid).last_measure().is_some_and(|m| self.score.mb(m).page_break())
    }
}
