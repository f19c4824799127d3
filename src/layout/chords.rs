//! Notehead placement within one segment and staff.
//!
//! `layout_chords1` offsets the up-stem and down-stem voices against each
//! other, `layout_chords2` decides which heads are mirrored to the far side
//! of the stem and `layout_chords3` turns all of that into note positions,
//! dot placement and the accidental stack.

use super::accidentals::{AcEl, AccidentalStack};
use super::constants::*;
use super::Layout;
use crate::glyphs::SymId;
use crate::model::{
    ChordRestId, Direction, DirectionH, MeasureId, NoteHeadGroup, NoteHeadType, NoteId, SegmentType, VOICES,
};

/// Notehead glyph for a head group and resolved head type.
pub(super) fn head_sym(group: NoteHeadGroup, ty: NoteHeadType) -> SymId {
    match group {
        NoteHeadGroup::Cross => SymId::NoteheadXBlack,
        NoteHeadGroup::Diamond => SymId::NoteheadDiamondBlack,
        NoteHeadGroup::Normal => match ty {
            NoteHeadType::Breve => SymId::NoteheadDoubleWhole,
            NoteHeadType::Whole => SymId::NoteheadWhole,
            NoteHeadType::Half => SymId::NoteheadHalf,
            NoteHeadType::Quarter | NoteHeadType::Auto => SymId::NoteheadBlack,
        },
    }
}

/// Sort notes top line last (lowest note first), the order chords keep.
pub(super) fn sort_by_line_desc(layout: &Layout<'_>, notes: &mut [NoteId]) {
    notes.sort_by(|a, b| layout.score.note(*b).line.cmp(&layout.score.note(*a).line));
}

impl Layout<'_> {
    /// Staff space of a staff, including the staff magnification.
    pub(super) fn staff_spatium(&self, staff_idx: usize) -> f64 {
        let mag = self.score.staves.get(staff_idx).map_or(1.0, |s| s.mag);
        self.score.spatium() * mag
    }

    /// Head type with `Auto` resolved against the chord's value.
    pub(super) fn note_head_type(&self, n: NoteId) -> NoteHeadType {
        let note = self.score.note(n);
        if note.head_type == NoteHeadType::Auto {
            self.score.cr(note.chord).duration_type().head_type()
        } else {
            note.head_type
        }
    }

    /// Magnification of a note: its chord's, further reduced for small notes.
    pub(super) fn note_mag(&self, n: NoteId) -> f64 {
        let note = self.score.note(n);
        let mag = self.score.cr(note.chord).mag;
        if note.small {
            mag * self.score.style.small_note_mag
        } else {
            mag
        }
    }

    pub(super) fn head_width(&self, n: NoteId) -> f64 {
        let note = self.score.note(n);
        let sym = head_sym(note.head_group, self.note_head_type(n));
        self.glyphs.width(sym, self.score.spatium() * self.note_mag(n))
    }

    /// Stem x for a nominal notehead, scaled by the chord magnification.
    pub(super) fn stem_pos_x(&self, cr: ChordRestId) -> f64 {
        let c = self.score.cr(cr);
        if c.up() {
            self.note_head_width() * c.mag
        } else {
            0.0
        }
    }

    /// Stem thickness, `None` for stemless chords.
    pub(super) fn stem_line_width(&self, cr: ChordRestId) -> Option<f64> {
        let c = self.score.cr(cr);
        c.chord()
            .filter(|ch| ch.has_stem)
            .map(|_| self.score.style.p(self.score.style.stem_width) * c.mag)
    }

    fn chord_dots(&self, cr: ChordRestId) -> u8 {
        self.score.cr(cr).dots()
    }

    /// Offset the voices of one staff in a chord/rest segment against each
    /// other and lay out every chord in it.
    pub fn layout_chords1(&mut self, measure: MeasureId, seg: usize, staff_idx: usize) {
        let Some(segment) = self.score.measure(measure).and_then(|m| m.segments.get(seg)) else {
            return;
        };
        let start_track = staff_idx * VOICES;
        let tracks: Vec<ChordRestId> =
            (start_track..start_track + VOICES).filter_map(|t| segment.cr(t)).collect();

        let staff_mag = self.score.staves.get(staff_idx).map_or(1.0, |s| s.mag);
        let nominal_width = self.note_head_width() * staff_mag;

        let mut up_notes: Vec<NoteId> = Vec::new();
        let mut down_notes: Vec<NoteId> = Vec::new();
        let (mut up_voices, mut down_voices) = (0, 0);
        let (mut max_up_mag, mut max_down_mag) = (0.0_f64, 0.0_f64);
        let (mut up_dots, mut down_dots) = (0u8, 0u8);
        let (mut up_hooks, mut down_hooks) = (false, false);
        let (mut up_grace, mut down_grace) = (false, false);

        for &id in &tracks {
            let Some(chord) = self.score.cr(id).chord() else {
                continue;
            };
            let graces = chord.grace_notes.clone();
            let notes = chord.notes.clone();
            let hook = chord.has_hook;
            let mut has_grace_before = false;
            for g in graces {
                let (gnotes, gup, before) = match self.score.cr(g).chord() {
                    Some(gc) => (gc.notes.clone(), gc.up, gc.is_grace_before()),
                    None => continue,
                };
                has_grace_before |= before;
                self.layout_chords2(&gnotes, gup);
                self.layout_chords3(&gnotes, staff_idx, None);
            }
            let cr = self.score.cr(id);
            if cr.up() {
                up_voices += 1;
                up_notes.extend_from_slice(&notes);
                up_dots = up_dots.max(cr.dots());
                max_up_mag = max_up_mag.max(cr.mag);
                up_hooks |= hook;
                up_grace |= has_grace_before;
            } else {
                down_voices += 1;
                down_notes.extend_from_slice(&notes);
                down_dots = down_dots.max(cr.dots());
                max_down_mag = max_down_mag.max(cr.mag);
                down_hooks |= hook;
                down_grace |= has_grace_before;
            }
        }

        if up_voices + down_voices > 0 {
            let mut max_up_width = nominal_width * max_up_mag;
            let mut max_down_width = nominal_width * max_down_mag;

            if up_voices > 1 {
                sort_by_line_desc(self, &mut up_notes);
            }
            if up_voices > 0 {
                let hw = self.layout_chords2(&up_notes, true);
                max_up_width = max_up_width.max(hw);
            }
            if down_voices > 1 {
                sort_by_line_desc(self, &mut down_notes);
            }
            if down_voices > 0 {
                let hw = self.layout_chords2(&down_notes, false);
                max_down_width = max_down_width.max(hw);
            }

            let sp = self.staff_spatium(staff_idx);
            let mut up_offset = 0.0;
            let mut down_offset = 0.0;
            let mut dot_adjust = 0.0;
            let mut dot_adjust_threshold = 0.0;

            // centering of whole notes, breves and small chords
            let mut center_up = 0.0;
            let mut oversize_up = 0.0;
            let mut center_down = 0.0;
            let mut center_adjust_up = 0.0;
            let mut center_adjust_down = 0.0;
            let center_threshold = CENTER_THRESHOLD * sp;

            // excess over nominal, for staff mag only and for staff and chord mag
            let head_diff = max_up_width - nominal_width;
            let head_diff2 = max_up_width - nominal_width * (max_up_mag / staff_mag);
            if head_diff > center_threshold {
                center_up = head_diff * -0.5;
                max_up_width += center_up;
                if head_diff2 > center_threshold {
                    center_up += head_diff2;
                    oversize_up = head_diff2;
                }
            } else if -head_diff > center_threshold {
                center_up = -head_diff * 0.5;
                if head_diff2 > center_threshold {
                    center_up += head_diff2;
                    oversize_up = head_diff2;
                }
                center_adjust_down = center_up;
            }

            let head_diff = max_down_width - nominal_width;
            if head_diff > center_threshold {
                center_down = head_diff * -0.5;
                max_down_width = nominal_width - center_down;
            } else if -head_diff > center_threshold {
                center_down = -head_diff * 0.5;
                center_adjust_up = center_down;
            }

            if up_voices > 0 && down_voices > 0 {
                let bottom_up_note = up_notes[0];
                let top_down_note = down_notes[down_notes.len() - 1];
                let bottom_up_chord = self.score.note(bottom_up_note).chord;
                let top_down_chord = self.score.note(top_down_note).chord;
                let separation =
                    if self.score.cr(bottom_up_chord).staff_move == self.score.cr(top_down_chord).staff_move {
                        self.score.note(top_down_note).line - self.score.note(bottom_up_note).line
                    } else {
                        2
                    };

                if separation == 1 {
                    // second
                    down_offset = max_up_width;
                    match (self.stem_line_width(top_down_chord), self.stem_line_width(bottom_up_chord)) {
                        (Some(lw), Some(_)) => down_offset -= lw,
                        _ => down_offset += SECOND_MARGIN * sp,
                    }
                } else if separation < 1 {
                    let top_down_line = self.score.note(top_down_note).line;
                    let bottom_up_line = self.score.note(bottom_up_note).line;
                    let mut overlap: Vec<NoteId> = Vec::with_capacity(8);
                    for &n in &up_notes {
                        if self.score.note(n).line >= top_down_line - 1 {
                            overlap.push(n);
                        } else {
                            break;
                        }
                    }
                    for &n in down_notes.iter().rev() {
                        if self.score.note(n).line <= bottom_up_line + 1 {
                            overlap.push(n);
                        } else {
                            break;
                        }
                    }
                    sort_by_line_desc(self, &mut overlap);

                    let conflict = self.classify_overlap(&overlap, separation);

                    if conflict.share_heads {
                        self.hide_shared_dots(&overlap);
                    } else if conflict.unison && separation == 0 && (!down_grace || up_grace) {
                        down_offset = max_up_width + VOICE_CLEARANCE * sp;
                    } else if conflict.unison {
                        up_offset = max_down_width + VOICE_CLEARANCE * sp;
                    } else if conflict.second_up_higher {
                        up_offset = max_down_width + SECOND_CLEARANCE * sp;
                    } else if (down_hooks && !up_hooks) && !(up_dots > 0 && down_dots == 0) {
                        down_offset = max_up_width + VOICE_CLEARANCE * sp;
                    } else if conflict.second_down_higher {
                        if down_dots > 0 && up_dots == 0 {
                            down_offset = max_up_width + VOICE_CLEARANCE * sp;
                        } else {
                            up_offset = max_down_width - SECOND_CLEARANCE * sp;
                            if down_hooks {
                                up_offset += VOICE_CLEARANCE * sp;
                            }
                        }
                    } else {
                        // no direct conflict: the down-stem part may sit on
                        // the left as long as stems clear the opposing heads
                        let mut clear_left = 0.0;
                        let mut clear_right = 0.0;
                        if let Some(lw) = self.stem_line_width(top_down_chord) {
                            clear_left = lw + VOICE_CLEARANCE * sp;
                        }
                        match self.stem_line_width(bottom_up_chord) {
                            Some(lw) => {
                                clear_right =
                                    lw + (max_down_width - max_up_width).max(0.0) + VOICE_CLEARANCE * sp;
                            }
                            None => down_dots = 0,
                        }
                        up_offset = f64::max(clear_left, clear_right);
                        if down_hooks {
                            up_offset = up_offset.max(max_down_width + SECOND_MARGIN * sp);
                            dot_adjust_threshold = max_up_width - VOICE_CLEARANCE * sp;
                        }
                        if center_down > 0.0 {
                            center_down = 0.0;
                            center_adjust_up = 0.0;
                            dot_adjust_threshold = (up_offset - max_down_width) + max_up_width - VOICE_CLEARANCE * sp;
                        }
                    }
                }

                // only one set of dots: place it between the chords
                if (up_dots > 0) != (down_dots > 0) {
                    let (dots, mag) = if up_dots > 0 { (up_dots, max_up_mag) } else { (down_dots, max_down_mag) };
                    let style = &self.score.style;
                    let dot_width = self.glyphs.width(SymId::AugmentationDot, self.score.spatium());
                    dot_adjust = style.p(style.dot_note_distance) + dot_width;
                    if dots > 1 {
                        dot_adjust += style.p(style.dot_dot_distance) * f64::from(dots - 1);
                    }
                    dot_adjust *= mag;
                    dot_adjust = (dot_adjust - dot_adjust_threshold).max(0.0);
                }
                if separation == 1 {
                    dot_adjust += SECOND_MARGIN * sp;
                }
            }

            for &id in &tracks {
                let cr = self.score.cr_mut(id);
                if !cr.is_chord() {
                    continue;
                }
                if cr.up() {
                    if up_offset != 0.0 {
                        cr.x += up_offset + center_adjust_up + oversize_up;
                        if down_dots > 0 && up_dots == 0 {
                            cr.x += dot_adjust;
                        }
                    } else {
                        cr.x += center_up;
                    }
                } else if down_offset != 0.0 {
                    cr.x += down_offset + center_adjust_down;
                    if up_dots > 0 && down_dots == 0 {
                        cr.x += dot_adjust;
                    }
                } else {
                    cr.x += center_down;
                }
            }

            let mut notes = Vec::with_capacity(up_notes.len() + down_notes.len());
            notes.extend_from_slice(&up_notes);
            notes.extend_from_slice(&down_notes);
            if up_voices + down_voices > 1 {
                sort_by_line_desc(self, &mut notes);
            }
            self.layout_chords3(&notes, staff_idx, Some((measure, seg)));
        }

        for id in tracks {
            self.layout_chord_rest(id);
        }
    }

    /// Classify the overlapping notes of an up/down conflict.
    fn classify_overlap(&self, overlap: &[NoteId], separation: i32) -> OverlapConflict {
        let mut c = OverlapConflict { share_heads: true, ..Default::default() };
        let Some(&first) = overlap.first() else {
            return c;
        };
        let mut match_pending = false;
        let mut last_line = 1000;
        let mut p = first;
        for &n in overlap {
            let note = self.score.note(n);
            if note.mirror && separation < 0 {
                // mirrored notes never share and never conflict
                c.share_heads = false;
                continue;
            }
            let line = note.line;
            match last_line - line {
                0 => {
                    c.unison = true;
                    match_pending = false;
                    let pn = self.score.note(p);
                    let nchord = self.score.cr(note.chord);
                    let pchord = self.score.cr(pn.chord);
                    let n_small = nchord.chord().is_some_and(|ch| ch.small);
                    let p_small = pchord.chord().is_some_and(|ch| ch.small);
                    let n_head = self.note_head_type(n);
                    let p_head = self.note_head_type(p);
                    if note.head_group != pn.head_group
                        || note.tpc != pn.tpc
                        || note.mirror
                        || pn.mirror
                        || n_small != p_small
                    {
                        c.share_heads = false;
                    } else {
                        // shared automatically when everything matches; the
                        // user can force sharing through an explicit head
                        // type or by hiding exactly one of the heads
                        let n_stem = nchord.chord().is_some_and(|ch| ch.has_stem);
                        let p_stem = pchord.chord().is_some_and(|ch| ch.has_stem);
                        let differs = nchord.dots() != pchord.dots()
                            || !n_stem
                            || !p_stem
                            || n_head != p_head
                            || note.small
                            || pn.small;
                        let not_forced = (note.head_type == NoteHeadType::Auto && pn.head_type == NoteHeadType::Auto)
                            || n_head != p_head;
                        if differs && not_forced && note.visible == pn.visible {
                            c.share_heads = false;
                        }
                    }
                }
                1 => {
                    if separation < 0 {
                        if self.score.cr(note.chord).up() {
                            c.second_up_higher = true;
                        } else {
                            c.second_down_higher = true;
                        }
                        c.share_heads = false;
                    }
                }
                _ => {
                    if match_pending {
                        c.share_heads = false;
                    }
                    match_pending = true;
                }
            }
            p = n;
            last_line = line;
        }
        if match_pending {
            c.share_heads = false;
        }
        c
    }

    /// Unisons sharing a head keep only one set of dots.
    fn hide_shared_dots(&mut self, overlap: &[NoteId]) {
        for i in (1..overlap.len()).rev().step_by(2) {
            let p = overlap[i - 1];
            let n = overlap[i];
            let pc = self.score.note(p).chord;
            let nc = self.score.note(n).chord;
            let nudged = |id: ChordRestId| self.score.cr(id).chord().is_some_and(|c| c.is_nudged());
            if !(nudged(pc) || nudged(nc)) && self.chord_dots(pc) == self.chord_dots(nc) {
                let on_line = self.score.note(p).on_line();
                let p_voice_odd = self.score.cr(pc).voice() & 1 == 1;
                // on a line the lower voice loses its dots, in a space the upper
                let hide_p = if on_line { p_voice_odd } else { !p_voice_odd };
                if hide_p {
                    self.score.note_mut(p).dots_hidden = true;
                } else {
                    self.score.note_mut(n).dots_hidden = true;
                }
            }
        }
    }

    /// Decide which heads of a stem group are mirrored. `notes` is sorted
    /// lowest first; up-stem groups are walked bottom up, down-stem groups
    /// top down, so the first head met wins a conflict. Returns the widest
    /// non-mirrored head.
    pub fn layout_chords2(&mut self, notes: &[NoteId], up: bool) -> f64 {
        if notes.is_empty() {
            return 0.0;
        }
        let order: Vec<NoteId> = if up { notes.to_vec() } else { notes.iter().rev().copied().collect() };

        let mut max_width = 0.0_f64;
        // start far away so the first note never conflicts
        let mut ll = 1000;
        let mut lvisible = false;
        let first_chord = self.score.cr(self.score.note(order[0]).chord);
        let mut is_left = first_chord.up();
        let mut lmove = first_chord.staff_move;

        for n in order {
            let (line, visible, user_mirror, chord_id) = {
                let note = self.score.note(n);
                (note.line, note.visible, note.user_mirror, note.chord)
            };
            let (chord_up, mv) = {
                let c = self.score.cr(chord_id);
                (c.up(), c.staff_move)
            };

            let conflict = (ll - line).abs() < 2 && lmove == mv && visible && lvisible;
            if conflict || chord_up != is_left {
                is_left = !is_left;
            }
            let nmirror = chord_up != is_left;

            self.score.cr_mut(chord_id).x = 0.0;
            let mirror = match user_mirror {
                DirectionH::Auto => nmirror,
                DirectionH::Left => !chord_up,
                DirectionH::Right => chord_up,
            };
            {
                let note = self.score.note_mut(n);
                note.dots_hidden = false;
                note.mirror = mirror;
            }
            if !mirror {
                max_width = max_width.max(self.head_width(n));
            }

            lvisible = visible;
            lmove = mv;
            ll = line;
        }
        max_width
    }

    /// Position notes, dots and accidentals of a line-sorted note list
    /// (lowest first). `segment` is `None` for grace chords, whose dots are
    /// not aligned with the segment.
    pub fn layout_chords3(&mut self, notes: &[NoteId], staff_idx: usize, segment: Option<(MeasureId, usize)>) {
        let sp = self.staff_spatium(staff_idx);
        let step_distance = sp * 0.5;
        let mut stack = AccidentalStack::default();
        let mut left_notes: Vec<NoteId> = Vec::new();

        // leftmost notehead
        let mut lx = 10000.0_f64;
        let mut up_dot_pos_x = 0.0_f64;
        let mut down_dot_pos_x = 0.0_f64;

        let n_notes = notes.len();
        for i in (0..n_notes).rev() {
            let n = notes[i];
            let (line, fixed, acc, chord_id) = {
                let note = self.score.note(n);
                (note.line, note.fixed, note.accidental.clone(), note.chord)
            };
            if let Some(acc) = acc.filter(|_| !fixed) {
                let mag = self.note_mag(n) * if acc.small { self.score.style.small_note_mag } else { 1.0 };
                let scale = self.score.spatium() * mag;
                let sym = acc.ty.sym();
                let bbox = self.glyphs.bbox(sym, scale);
                let y = f64::from(line) * step_distance;
                let mut el = AcEl {
                    note: n,
                    x: 0.0,
                    top: y + bbox.top(),
                    bottom: y + bbox.bottom(),
                    line,
                    next: None,
                    width: bbox.width,
                    bbox_x: bbox.x,
                    mag,
                    ascent: 0.0,
                    descent: 0.0,
                    right_clear: 0.0,
                    left_clear: 0.0,
                };
                if let Some(ne) = self.glyphs.cut_out_ne(sym, scale) {
                    el.ascent = ne.y - bbox.top();
                    el.right_clear = bbox.right() - ne.x;
                }
                if let Some(sw) = self.glyphs.cut_out_sw(sym, scale) {
                    el.descent = bbox.bottom() - sw.y;
                    el.left_clear = sw.x - bbox.left();
                }
                stack.push(el);
            }

            let hw = self.head_width(n);
            let chord_up = self.score.cr(chord_id).up();
            let chord_x = self.score.cr(chord_id).x;
            let stem_x = self.stem_pos_x(chord_id);
            let overlap_mirror = match self.stem_line_width(chord_id) {
                Some(lw) => lw,
                None if self.score.cr(chord_id).duration_type().head_type() == NoteHeadType::Whole => {
                    self.score.style.p(self.score.style.stem_width) * self.score.cr(chord_id).mag
                }
                None => 0.0,
            };

            let mirror = self.score.note(n).mirror;
            let x = match (mirror, chord_up) {
                (true, true) => stem_x - overlap_mirror,
                (true, false) => stem_x - hw + overlap_mirror,
                (false, true) => stem_x - hw,
                (false, false) => 0.0,
            };
            {
                let note = self.score.note_mut(n);
                note.y = f64::from(line) * step_distance;
                note.x = x;
            }

            // segment-relative x; a mirrored note left of the origin only
            // displaces accidentals it actually meets
            let sx = x + chord_x;
            if mirror && !chord_up && sx < 0.0 {
                left_notes.push(n);
            } else if sx < lx {
                lx = sx;
            }

            let xx = x + hw + chord_x;
            let mut dot_position = self.score.note(n).user_dot_position;
            if self.chord_dots(chord_id) > 0 {
                if chord_up {
                    up_dot_pos_x = up_dot_pos_x.max(xx);
                } else {
                    down_dot_pos_x = down_dot_pos_x.max(xx);
                }
                let note = self.score.note(n);
                if dot_position == Direction::Auto && n_notes > 1 && note.visible && !note.dots_hidden {
                    dot_position = self.resolve_dot_conflict(notes, i);
                }
            }
            self.score.note_mut(n).dot_y = dot_position;
        }

        if let Some((mid, sidx)) = segment {
            if let Some(s) = self.score.measure_mut(mid).and_then(|m| m.segments.get_mut(sidx)) {
                if let Some(d) = s.dot_pos_x.get_mut(staff_idx) {
                    *d = up_dot_pos_x.max(down_dot_pos_x);
                }
            }
        }

        if stack.is_empty() {
            return;
        }
        if lx >= 10000.0 {
            // every head is a mirrored left note
            lx = 0.0;
        }

        let style = &self.score.style;
        let pd = style.p(style.accidental_distance);
        let pnd = style.p(style.accidental_note_distance);
        let left: Vec<(i32, f64)> = left_notes
            .iter()
            .map(|&n| {
                let note = self.score.note(n);
                (note.line, note.x + self.score.cr(note.chord).x)
            })
            .collect();
        let staff_lines = self.score.staves.get(staff_idx).map_or(5, |s| s.lines);
        let placed = stack.layout(&left, staff_lines, pnd, pd, sp);

        for (n, ax) in placed {
            let note = self.score.note(n);
            let x = ax + lx - (note.x + self.score.cr(note.chord).x);
            if let Some(acc) = self.score.note_mut(n).accidental.as_mut() {
                acc.x = x;
            }
        }
    }

    /// Dot placement of note `i` of a lowest-first list when it collides
    /// with a neighbour one step away or a dotted unison.
    fn resolve_dot_conflict(&mut self, notes: &[NoteId], i: usize) -> Direction {
        let n = notes[i];
        let line = self.score.note(n).line;
        let usable = |layout: &Self, id: NoteId| {
            let note = layout.score.note(id);
            note.visible && !note.dots_hidden
        };
        let above = notes.get(i + 1).copied().filter(|&a| usable(self, a));
        let below = if i > 0 { Some(notes[i - 1]).filter(|&b| usable(self, b)) } else { None };
        let interval_above = above.map_or(1000, |a| line - self.score.note(a).line);
        let interval_below = below.map_or(1000, |b| self.score.note(b).line - line);
        let voice = |layout: &Self, id: NoteId| layout.score.cr(layout.score.note(id).chord).voice();
        let above_dotted = above.is_some_and(|a| self.chord_dots(self.score.note(a).chord) > 0);

        let mut dir = Direction::Auto;
        if line & 1 == 0 {
            // line
            if interval_above == 1 && interval_below != 1 {
                dir = Direction::Down;
            } else if interval_below == 1 && interval_above != 1 {
                dir = Direction::Up;
            } else if interval_above == 0 && above_dotted {
                if let Some(a) = above {
                    if voice(self, a) & 1 == voice(self, n) & 1 {
                        self.score.note_mut(a).dot_y = Direction::Up;
                        dir = Direction::Down;
                    }
                }
            }
        } else if interval_above == 0 && above_dotted {
            // space
            if let Some(a) = above {
                if voice(self, n) & 1 == 0 {
                    dir = Direction::Up;
                } else if voice(self, a) & 1 == 0 {
                    self.score.note_mut(a).dot_y = Direction::Up;
                } else {
                    dir = Direction::Down;
                }
            }
        }
        dir
    }

    /// Lay out every voice of a chord/rest segment on each staff.
    pub(super) fn layout_segment_chords(&mut self, measure: MeasureId, seg: usize) {
        let Some(ty) = self.score.measure(measure).and_then(|m| m.segments.get(seg)).map(|s| s.ty) else {
            return;
        };
        if ty != SegmentType::ChordRest {
            return;
        }
        for staff_idx in 0..self.score.nstaves() {
            self.layout_chords1(measure, seg, staff_idx);
        }
    }
}

#[derive(Debug, Default)]
struct OverlapConflict {
    share_heads: bool,
    unison: bool,
    second_up_higher: bool,
    second_down_higher: bool,
}
