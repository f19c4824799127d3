//! Stems, rests and the footprint of single chords and rests.

use super::chords::head_sym;
use super::constants::ARTICULATION_GAP;
use super::Layout;
use crate::glyphs::SymId;
use crate::model::{ChordRestId, ChordRestKind, Direction, DurationType, MeasureId, NoteId, Placement, VOICES};
use crate::shape::{Rect, Shape};

/// Rest glyph for a duration; whole-measure rests use the whole rest.
pub(super) fn rest_sym(ty: DurationType) -> SymId {
    match ty {
        DurationType::Long => SymId::RestLonga,
        DurationType::Breve => SymId::RestDoubleWhole,
        DurationType::Whole | DurationType::Measure => SymId::RestWhole,
        DurationType::Half => SymId::RestHalf,
        DurationType::Quarter => SymId::RestQuarter,
        DurationType::Eighth => SymId::Rest8th,
        DurationType::D16th => SymId::Rest16th,
        DurationType::D32nd => SymId::Rest32nd,
        DurationType::D64th => SymId::Rest64th,
        DurationType::D128th => SymId::Rest128th,
    }
}

fn flag_sym(hooks: u32, up: bool) -> SymId {
    match (hooks, up) {
        (1, true) => SymId::Flag8thUp,
        (1, false) => SymId::Flag8thDown,
        (2, true) => SymId::Flag16thUp,
        (2, false) => SymId::Flag16thDown,
        (3, true) => SymId::Flag32ndUp,
        (3, false) => SymId::Flag32ndDown,
        (_, true) => SymId::Flag64thUp,
        (_, false) => SymId::Flag64thDown,
    }
}

/// Decimal digits of a positive number, most significant first.
pub(super) fn digits(mut n: i32) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        out.push((n % 10) as u8);
        n /= 10;
        if n <= 0 {
            break;
        }
    }
    out.reverse();
    out
}

impl Layout<'_> {
    /// More than one voice has content on `staff_idx` in this measure.
    pub(super) fn has_voices(&self, mid: MeasureId, staff_idx: usize) -> bool {
        let Some(m) = self.score.measure(mid) else {
            return false;
        };
        let start = staff_idx * VOICES;
        m.chord_rest_segments().any(|s| (start + 1..start + VOICES).any(|t| s.cr(t).is_some()))
    }

    /// Magnification and stem direction of a chord/rest and its grace
    /// chords, ahead of beaming.
    pub(super) fn prepare_chord_rest(&mut self, id: ChordRestId, voices: bool) {
        let staff_mag = self.score.staves.get(self.score.cr(id).staff_idx()).map_or(1.0, |s| s.mag);
        let small = self.score.cr(id).chord().is_some_and(|c| c.small);
        let mag = if small { staff_mag * self.score.style.small_note_mag } else { staff_mag };
        self.score.cr_mut(id).mag = mag;

        let graces = self.score.cr(id).chord().map(|c| c.grace_notes.clone()).unwrap_or_default();
        let grace_mag = mag * self.score.style.grace_note_mag;
        for g in graces {
            self.score.cr_mut(g).mag = grace_mag;
            self.compute_up(g, voices);
            self.layout_stem1(g);
        }
        self.compute_up(id, voices);
        self.layout_stem1(id);
    }

    /// Stem direction of a chord whose direction is not decided by a beam.
    pub(super) fn compute_up(&mut self, id: ChordRestId, voices: bool) {
        let cr = self.score.cr(id);
        let Some(chord) = cr.chord() else {
            return;
        };
        let up = if cr.staff_move != 0 {
            cr.staff_move > 0
        } else if chord.stem_direction != Direction::Auto {
            chord.stem_direction == Direction::Up
        } else if chord.is_grace() {
            true
        } else if voices {
            cr.voice() % 2 == 0
        } else {
            let middle = self.score.staves.get(cr.staff_idx()).map_or(4, |s| s.lines - 1);
            match (chord.notes.first(), chord.notes.last()) {
                (Some(&bottom), Some(&top)) => {
                    let ud = (self.score.note(top).line - middle) + (self.score.note(bottom).line - middle);
                    ud > 0
                }
                _ => true,
            }
        };
        if let Some(c) = self.score.cr_mut(id).chord_mut() {
            c.up = up;
        }
    }

    /// Stem presence, hook and default stem length.
    pub(super) fn layout_stem1(&mut self, id: ChordRestId) {
        let cr = self.score.cr(id);
        let Some(chord) = cr.chord() else {
            return;
        };
        let ty = cr.duration_type();
        let hooks = ty.hooks();
        let has_stem = !chord.no_stem && (ty.has_stem() || chord.is_grace());
        let has_hook = has_stem && hooks > 0 && cr.beam.is_none();
        let stem_len = if has_stem { self.default_stem_len(id, hooks, has_hook) } else { 0.0 };
        if let Some(c) = self.score.cr_mut(id).chord_mut() {
            c.has_stem = has_stem;
            c.has_hook = has_hook;
            c.stem_len = stem_len;
        }
    }

    /// Stem length from the far note: the note spread plus the nominal
    /// length, extended to reach the middle line on normal-size chords.
    fn default_stem_len(&self, id: ChordRestId, hooks: u32, has_hook: bool) -> f64 {
        let cr = self.score.cr(id);
        let Some(chord) = cr.chord() else {
            return 0.0;
        };
        let (Some(&bottom), Some(&top)) = (chord.notes.first(), chord.notes.last()) else {
            return 0.0;
        };
        let staff_idx = cr.staff_idx();
        let staff_sp = self.staff_spatium(staff_idx);
        let step = staff_sp * 0.5;
        let (top_line, bottom_line) = (self.score.note(top).line, self.score.note(bottom).line);
        let spread = f64::from(bottom_line - top_line) * step;

        let sp = self.score.spatium() * cr.mag;
        let mut len = self.score.style.stem_length * sp;
        if has_hook && hooks > 2 {
            len += f64::from(hooks - 2) * 0.5 * sp;
        }
        if !chord.is_grace() && !chord.small {
            let middle = self.score.staves.get(staff_idx).map_or(4, |s| s.lines - 1);
            let middle_y = f64::from(middle) * step;
            if chord.up {
                let tip = f64::from(top_line) * step - len;
                if tip > middle_y {
                    len += tip - middle_y;
                }
            } else {
                let tip = f64::from(bottom_line) * step + len;
                if tip < middle_y {
                    len += middle_y - tip;
                }
            }
        }
        spread + len
    }

    /// Finish a chord/rest after notehead placement: grace chord
    /// positions, rest position, lyrics and the footprint.
    pub(super) fn layout_chord_rest(&mut self, id: ChordRestId) {
        if self.score.cr(id).is_rest() {
            self.layout_rest(id);
        } else {
            self.layout_graces(id);
        }
        self.layout_lyrics(id);
        let shape = self.chord_rest_shape(id);
        self.score.cr_mut(id).shape = shape;
    }

    /// Place grace chords left (before) or right (after) of their chord.
    fn layout_graces(&mut self, id: ChordRestId) {
        let graces = self.score.cr(id).chord().map(|c| c.grace_notes.clone()).unwrap_or_default();
        if graces.is_empty() {
            return;
        }
        let main_x = self.score.cr(id).x;
        let own = self.element_shape(id).translated(-main_x, 0.0);
        let (lw, rw) = (own.left(), own.right());
        let mnd = self.score.style.p(self.score.style.min_note_distance);
        let grace_mag = self.score.style.grace_note_mag;

        let mut before = Vec::new();
        let mut after = Vec::new();
        for g in graces {
            self.score.cr_mut(g).x = 0.0;
            let extent = self.element_shape(g);
            let is_after = self.score.cr(g).chord().is_some_and(|c| c.is_grace_after());
            if is_after {
                after.push((g, extent));
            } else {
                before.push((g, extent));
            }
        }

        let mut xl = -(lw + mnd);
        for (g, extent) in before.iter().rev() {
            xl -= extent.right();
            self.score.cr_mut(*g).x = main_x + xl;
            xl -= extent.left() + mnd * grace_mag;
        }
        let mut xr = rw;
        for (g, extent) in &after {
            xr += extent.left() + mnd * grace_mag;
            self.score.cr_mut(*g).x = main_x + xr;
            xr += extent.right();
        }
        for (g, _) in before.into_iter().chain(after) {
            let shape = self.element_shape(g);
            self.score.cr_mut(g).shape = shape;
        }
    }

    fn layout_rest(&mut self, id: ChordRestId) {
        let (staff_idx, mid, ty, line_offset, voice) = {
            let cr = self.score.cr(id);
            let offset = match &cr.kind {
                ChordRestKind::Rest(r) => r.line_offset,
                ChordRestKind::Chord(_) => 0,
            };
            (cr.staff_idx(), cr.measure, cr.duration.ty, offset, cr.voice())
        };
        let lines = self.score.staves.get(staff_idx).map_or(5, |s| s.lines);
        let whole_like = matches!(ty, DurationType::Whole | DurationType::Measure);
        let mut line = if whole_like { lines - 3 } else { lines - 1 };
        if self.has_voices(mid, staff_idx) {
            line += if voice % 2 == 0 { -4 } else { 4 };
        }
        line += line_offset;
        let y = f64::from(line) * 0.5 * self.staff_spatium(staff_idx);
        let cr = self.score.cr_mut(id);
        cr.x = 0.0;
        cr.y = y;
    }

    /// Footprint of a chord/rest including its grace chords, relative to
    /// the segment origin.
    pub(super) fn chord_rest_shape(&self, id: ChordRestId) -> Shape {
        let mut shape = self.element_shape(id);
        if let Some(chord) = self.score.cr(id).chord() {
            for &g in &chord.grace_notes {
                shape.add(&self.element_shape(g));
            }
        }
        shape
    }

    /// Footprint of one chord or rest, relative to the segment origin.
    pub(super) fn element_shape(&self, id: ChordRestId) -> Shape {
        if self.score.cr(id).is_rest() {
            self.rest_shape(id)
        } else {
            self.chord_shape(id)
        }
    }

    fn rest_shape(&self, id: ChordRestId) -> Shape {
        let cr = self.score.cr(id);
        let sp = self.score.spatium() * cr.mag;
        let mut shape = Shape::new();
        let in_mm_rest = self.score.measure(cr.measure).filter(|m| m.is_mm_rest());
        if let Some(m) = in_mm_rest {
            // horizontal bar through the middle of the staff, count above
            let staff_sp = self.staff_spatium(cr.staff_idx());
            let lines = self.score.staves.get(cr.staff_idx()).map_or(5, |s| s.lines);
            let middle = f64::from(lines - 1) * 0.5 * staff_sp;
            let width = self.mm_rest_width(id);
            shape.add_rect(Rect::new(cr.x, middle - 0.5 * sp, width, sp));
            let digits = digits(m.mm_rest_count);
            let dw: f64 = digits.iter().map(|d| self.glyphs.width(SymId::TimeSig(*d), sp)).sum();
            let digit = self.glyphs.bbox(SymId::TimeSig(0), sp);
            shape.add_rect(Rect::new(cr.x + (width - dw) * 0.5, -sp + digit.top(), dw, digit.height));
            return shape;
        }

        let sym = rest_sym(cr.duration.ty);
        let bbox = self.glyphs.bbox(sym, sp);
        shape.add_rect(bbox.translated(cr.x, cr.y));
        let dots = cr.dots();
        if dots > 0 {
            let style = &self.score.style;
            let dot = self.glyphs.bbox(SymId::AugmentationDot, sp);
            let dd = style.dot_dot_distance * sp;
            let x0 = cr.x + bbox.right() + style.dot_note_distance * sp;
            // dots of a rest always sit in a space
            let half = 0.5 * self.staff_spatium(cr.staff_idx());
            let on_line = ((cr.y / half).round() as i32) & 1 == 0;
            let y = if on_line { cr.y - half } else { cr.y };
            for k in 0..dots {
                shape.add_rect(dot.translated(x0 + f64::from(k) * dd, y));
            }
        }
        shape
    }

    /// Width of the bar of a multi-measure rest: at least the minimum,
    /// otherwise whatever the measure was stretched to.
    pub(super) fn mm_rest_width(&self, id: ChordRestId) -> f64 {
        let cr = self.score.cr(id);
        let min = self.score.style.p(self.score.style.min_mm_rest_width);
        let Some((mid, sidx)) = self.score.cr_segment(id) else {
            return min;
        };
        let Some(m) = self.score.measure(mid) else {
            return min;
        };
        let x1 = m.segments[sidx].x;
        let x2 = m.end_barline_segment().map_or(m.width, |s| m.segments[s].x);
        let sp = self.score.spatium() * cr.mag;
        (x2 - x1 - 2.0 * sp).max(min)
    }

    /// Vertical offset of a note's dots from the note.
    fn dot_offset(&self, n: NoteId, staff_sp: f64) -> f64 {
        let note = self.score.note(n);
        if note.on_line() {
            match note.dot_y {
                Direction::Down => 0.5 * staff_sp,
                Direction::Up | Direction::Auto => -0.5 * staff_sp,
            }
        } else {
            match note.dot_y {
                Direction::Up => -staff_sp,
                Direction::Down => staff_sp,
                Direction::Auto => 0.0,
            }
        }
    }

    /// First dot x relative to the chord.
    fn dot_x(&self, id: ChordRestId) -> f64 {
        let cr = self.score.cr(id);
        let dnd = self.score.style.p(self.score.style.dot_note_distance) * cr.mag;
        if !cr.is_grace() {
            if let Some((mid, sidx)) = self.score.cr_segment(id) {
                if let Some(seg) = self.score.measure(mid).map(|m| &m.segments[sidx]) {
                    if let Some(d) = seg.dot_pos_x.get(cr.staff_idx()) {
                        return *d - cr.x + dnd;
                    }
                }
            }
        }
        let notes = cr.chord().map_or(&[][..], |c| c.notes.as_slice());
        let right = notes
            .iter()
            .map(|&n| self.score.note(n).x + self.head_width(n))
            .fold(0.0_f64, f64::max);
        right + dnd
    }

    fn chord_shape(&self, id: ChordRestId) -> Shape {
        let cr = self.score.cr(id);
        let mut shape = Shape::new();
        let Some(chord) = cr.chord() else {
            return shape;
        };
        let x0 = cr.x;
        let sp = self.score.spatium();
        let staff_sp = self.staff_spatium(cr.staff_idx());

        for &n in &chord.notes {
            let note = self.score.note(n);
            let scale = sp * self.note_mag(n);
            let head = self.glyphs.bbox(head_sym(note.head_group, self.note_head_type(n)), scale);
            shape.add_rect(head.translated(x0 + note.x, note.y));
            if let Some(acc) = &note.accidental {
                let amag = if acc.small { self.score.style.small_note_mag } else { 1.0 };
                let r = self.glyphs.bbox(acc.ty.sym(), scale * amag);
                shape.add_rect(r.translated(x0 + note.x + acc.x, note.y));
            }
        }

        let dots = cr.dots();
        if dots > 0 {
            let dot = self.glyphs.bbox(SymId::AugmentationDot, sp * cr.mag);
            let dd = self.score.style.p(self.score.style.dot_dot_distance) * cr.mag;
            let dx = self.dot_x(id);
            for &n in &chord.notes {
                let note = self.score.note(n);
                if note.dots_hidden || !note.visible {
                    continue;
                }
                let y = note.y + self.dot_offset(n, staff_sp);
                for k in 0..dots {
                    shape.add_rect(dot.translated(x0 + dx + f64::from(k) * dd, y));
                }
            }
        }

        let (Some(&bottom), Some(&top)) = (chord.notes.first(), chord.notes.last()) else {
            return shape;
        };
        if chord.has_stem {
            let lw = self.score.style.p(self.score.style.stem_width) * cr.mag;
            let sx = self.stem_pos_x(id);
            let (x, y1, y2) = if chord.up {
                let base = self.score.note(bottom).y;
                (sx - lw, base - chord.stem_len, base)
            } else {
                let base = self.score.note(top).y;
                (0.0, base, base + chord.stem_len)
            };
            shape.add_rect(Rect::new(x0 + x, y1, lw, y2 - y1));
            if chord.has_hook {
                let hooks = cr.duration_type().hooks();
                let flag = self.glyphs.bbox(flag_sym(hooks, chord.up), sp * cr.mag);
                let tip = if chord.up { y1 } else { y2 };
                shape.add_rect(flag.translated(x0 + x, tip));
            }
        }

        if !cr.articulations.is_empty() {
            let msp = sp * cr.mag;
            let head_w = self.note_head_width() * cr.mag;
            let head_x = x0 + self.score.note(bottom).x;
            let mut above_y = shape.top() - 0.5 * msp;
            let mut below_y = shape.bottom() + 0.5 * msp;
            for a in &cr.articulations {
                let r = self.glyphs.bbox(a.kind.sym(), msp);
                let above = if a.kind.is_fermata() { a.placement == Placement::Above } else { !chord.up };
                let x = head_x + (head_w - r.width) * 0.5;
                if above {
                    let y = if a.kind.is_fermata() { above_y.min(-0.5 * msp) } else { above_y };
                    let placed = r.translated(x, y);
                    above_y = placed.top() - ARTICULATION_GAP * msp;
                    shape.add_rect(placed);
                } else {
                    let placed = r.translated(x, below_y + r.height);
                    below_y = placed.bottom() + ARTICULATION_GAP * msp;
                    shape.add_rect(placed);
                }
            }
        }
        shape
    }
}
