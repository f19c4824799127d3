//! Beam grouping and beam geometry.
//!
//! Grouping runs per measure and track before horizontal spacing: a single
//! pass over the chord/rest segments decides which elements share a beam
//! and the stem direction of each beam. Geometry runs once the system is
//! stretched, when stem x positions are final.

use std::collections::BTreeMap;

use log::debug;

use super::constants::BEAM_MIN_STEM;
use super::Layout;
use crate::model::{
    Beam, BeamId, BeamMode, ChordRestId, CrossMeasure, Direction, DurationType, Fraction, Groups, MeasureId,
    TDuration, DIVISION, VOICES,
};
use crate::shape::{Rect, Shape};

/// Running state of the grouping over one track.
#[derive(Debug, Default)]
struct BeamRun {
    /// Open beam still accepting elements
    beam: Option<BeamId>,
    /// Candidate first element of the next beam
    a1: Option<ChordRestId>,
}

impl Layout<'_> {
    /// Group the chords/rests of every shown staff of a measure into beams.
    pub(super) fn create_beams(&mut self, mid: MeasureId) {
        self.clear_measure_beams(mid);
        let cross_measure = self.score.style.cross_measure_values;
        let Some(m) = self.score.measure(mid) else {
            return;
        };
        let (mtick, msig) = (m.tick, m.timesig);
        let ntracks = self.score.ntracks();
        let per_track: Vec<Vec<ChordRestId>> = (0..ntracks)
            .map(|track| m.chord_rest_segments().filter_map(|s| s.cr(track)).collect())
            .collect();

        for (track, crs) in per_track.into_iter().enumerate() {
            let Some(staff) = self.score.staves.get(track / VOICES) else {
                continue;
            };
            if !staff.show || crs.is_empty() {
                continue;
            }
            let groups = staff.group(mtick, msig);
            let (ts, stretch) = staff.timesig(mtick).map_or((msig, Fraction::new(1, 1)), |t| (t.sig, t.stretch));
            let scale = |rtick: i32| rtick * stretch.numerator / stretch.denominator.max(1);

            // shortest value on each beat, simple meters only
            let check_beats = ts.denominator == 4;
            let mut beats: BTreeMap<i32, DurationType> = BTreeMap::new();
            if check_beats {
                for &id in &crs {
                    let cr = self.score.cr(id);
                    let beat = scale(cr.tick - mtick) / DIVISION;
                    let d = cr.duration_type();
                    beats.entry(beat).and_modify(|b| *b = (*b).max(d)).or_insert(d);
                }
            }

            let mut run = BeamRun::default();
            let mut prev: Option<ChordRestId> = None;
            for id in crs {
                if self.score.cr(id).is_chord() {
                    self.beam_grace_notes(id, false);
                    self.beam_grace_notes(id, true);
                    if !self.score.cr(id).is_grace() {
                        self.cross_measure_setup(id, cross_measure);
                    }
                }
                let rtick = self.score.cr(id).tick - mtick;
                let tick = scale(rtick);
                let d = self.score.cr(id).duration_type();
                let mut bm = self.end_beam(id, prev, d, &groups, tick);
                if bm == BeamMode::Auto && check_beats && rtick != 0 && tick % DIVISION == 0 {
                    // re-evaluate as if this element had the shortest value
                    // of this beat and the previous one
                    let beat = tick / DIVISION;
                    if let (Some(cur), Some(before)) = (beats.get(&beat), beats.get(&(beat - 1))) {
                        bm = self.end_beam(id, prev, (*cur).max(*before), &groups, tick);
                    }
                }
                prev = Some(id);

                let cr = self.score.cr(id);
                if cr.duration_type().hooks() > 0 && cr.cross_measure == CrossMeasure::Second {
                    bm = BeamMode::NoBeam;
                }
                self.beam_step(&mut run, id, bm, track, false);
            }
            self.close_run(run, false);
        }
    }

    /// Beam mode of an element: the user's choice, else the grouping rule.
    fn end_beam(&self, id: ChordRestId, prev: Option<ChordRestId>, d: DurationType, groups: &Groups, tick: i32) -> BeamMode {
        let cr = self.score.cr(id);
        if cr.is_grace() || cr.beam_mode != BeamMode::Auto {
            return cr.beam_mode;
        }
        if cr.is_rest() {
            return BeamMode::NoBeam;
        }
        let mut val = groups.beam_mode(tick, d);
        if val == BeamMode::Auto && tick != 0 && cr.voice() > 0 {
            // a hole in a secondary voice breaks the beam
            if prev.is_some_and(|p| self.score.cr(p).end_tick() < cr.tick) {
                val = BeamMode::Begin;
            }
        }
        val
    }

    /// Beam the grace chords on one side of `main` among themselves.
    pub(super) fn beam_grace_notes(&mut self, main: ChordRestId, after: bool) {
        let track = self.score.cr(main).track;
        let graces: Vec<ChordRestId> = self
            .score
            .cr(main)
            .chord()
            .map(|c| {
                c.grace_notes
                    .iter()
                    .copied()
                    .filter(|g| self.score.cr(*g).chord().is_some_and(|gc| gc.is_grace_after() == after))
                    .collect()
            })
            .unwrap_or_default();
        let mut run = BeamRun::default();
        for g in graces {
            let bm = self.score.cr(g).beam_mode;
            self.beam_step(&mut run, g, bm, track, true);
        }
        self.close_run(run, true);
    }

    fn beam_step(&mut self, run: &mut BeamRun, id: ChordRestId, bm: BeamMode, track: usize, grace: bool) {
        if self.score.cr(id).duration_type().is_quarter_or_longer() || bm == BeamMode::NoBeam {
            if let Some(b) = run.beam.take() {
                self.finish_beam(b, grace);
            }
            if let Some(a1) = run.a1.take() {
                self.remove_beam(a1);
            }
            self.remove_beam(id);
            return;
        }

        let mut pending = Some(id);
        if let Some(b) = run.beam {
            let mut end = bm == BeamMode::Begin;
            if !end {
                self.beam_add(b, id);
                pending = None;
                end = bm == BeamMode::End;
            }
            if end {
                self.finish_beam(b, grace);
                run.beam = None;
            }
        }
        let Some(id) = pending else {
            return;
        };

        let Some(a1) = run.a1 else {
            run.a1 = Some(id);
            return;
        };
        let gap = !grace && self.score.cr(a1).end_tick() < self.score.cr(id).tick;
        if !bm.is_mid() && (bm == BeamMode::Begin || gap) {
            self.remove_beam(a1);
            run.a1 = Some(id);
            return;
        }
        let mut beam = Beam::new(track);
        beam.grace = grace;
        let b = self.score.add_beam(beam);
        self.beam_add(b, a1);
        self.beam_add(b, id);
        run.a1 = None;
        if bm == BeamMode::End {
            self.finish_beam(b, grace);
        } else {
            run.beam = Some(b);
        }
    }

    fn close_run(&mut self, run: BeamRun, grace: bool) {
        if let Some(b) = run.beam {
            self.finish_beam(b, grace);
        } else if let Some(a1) = run.a1 {
            self.remove_beam(a1);
        }
    }

    fn finish_beam(&mut self, b: BeamId, grace: bool) {
        if grace {
            self.layout_grace_beam(b);
        } else {
            self.layout_beam1(b);
        }
    }

    /// Insert an element keeping the beam in tick order.
    fn beam_add(&mut self, b: BeamId, id: ChordRestId) {
        let tick = self.score.cr(id).tick;
        let ticks: Vec<i32> = match self.score.beam(b) {
            Some(beam) => beam.elements.iter().map(|e| self.score.cr(*e).tick).collect(),
            None => return,
        };
        if let Some(beam) = self.score.beam_mut(b) {
            if !beam.elements.contains(&id) {
                let pos = ticks.partition_point(|t| *t <= tick);
                beam.elements.insert(pos, id);
            }
        }
        self.score.cr_mut(id).beam = Some(b);
    }

    /// Detach an element from its beam; a beam left empty is freed.
    fn remove_beam(&mut self, id: ChordRestId) {
        let Some(b) = self.score.cr_mut(id).beam.take() else {
            return;
        };
        let empty = match self.score.beam_mut(b) {
            Some(beam) => {
                beam.elements.retain(|e| *e != id);
                beam.elements.is_empty()
            }
            None => false,
        };
        if empty {
            self.score.free_beam(b);
        }
    }

    /// Free every beam touching a measure before regrouping it.
    fn clear_measure_beams(&mut self, mid: MeasureId) {
        let Some(m) = self.score.measure(mid) else {
            return;
        };
        let mut ids: Vec<ChordRestId> = Vec::new();
        for seg in m.chord_rest_segments() {
            for id in seg.elements.iter().flatten().filter_map(|e| e.cr()) {
                ids.push(id);
                if let Some(c) = self.score.cr(id).chord() {
                    ids.extend_from_slice(&c.grace_notes);
                }
            }
        }
        for id in ids {
            if let Some(b) = self.score.cr_mut(id).beam.take() {
                let members = self.score.beam(b).map(|beam| beam.elements.clone()).unwrap_or_default();
                for other in members {
                    if self.score.cr(other).beam == Some(b) {
                        self.score.cr_mut(other).beam = None;
                    }
                }
                self.score.free_beam(b);
            }
        }
    }

    /// Decide whether a chord tied into the next measure is read as one
    /// combined value.
    pub(super) fn cross_measure_setup(&mut self, id: ChordRestId, enabled: bool) {
        if !enabled {
            if self.score.cr(id).cross_measure != CrossMeasure::Unknown {
                let cr = self.score.cr_mut(id);
                cr.cross_measure = CrossMeasure::Unknown;
                cr.cross_measure_duration = None;
                self.layout_stem1(id);
            }
            return;
        }
        if self.score.cr(id).cross_measure != CrossMeasure::Unknown {
            return;
        }
        let mut state = CrossMeasure::NoCross;
        let single_note = match self.score.chord_notes(id) {
            [n] => Some(*n),
            _ => None,
        };
        if let Some(note) = single_note {
            let tie_end = self
                .score
                .note(note)
                .tie_for
                .and_then(|t| self.score.spanner(t))
                .and_then(|t| t.end_note);
            if let Some(end) = tie_end {
                let tied = self.score.note(end).chord;
                let single = self.score.chord_notes(tied).len() == 1;
                if self.score.cr(tied).measure != self.score.cr(id).measure && single {
                    let total = self.score.cr(id).duration.ticks() + self.score.cr(tied).duration.ticks();
                    if let Some(d) = TDuration::from_ticks(total) {
                        state = CrossMeasure::First;
                        let cr = self.score.cr_mut(id);
                        cr.cross_measure = CrossMeasure::First;
                        cr.cross_measure_duration = Some(d);
                        self.layout_stem1(id);
                    }
                }
                self.score.cr_mut(tied).cross_measure =
                    if state == CrossMeasure::First { CrossMeasure::Second } else { CrossMeasure::NoCross };
            }
        }
        self.score.cr_mut(id).cross_measure = state;
    }

    /// Stem direction of a finished beam, applied to all its chords.
    pub(super) fn layout_beam1(&mut self, b: BeamId) {
        let Some(elements) = self.score.beam(b).map(|beam| beam.elements.clone()) else {
            return;
        };
        let chords: Vec<ChordRestId> = elements.iter().copied().filter(|e| self.score.cr(*e).is_chord()).collect();
        let Some(&c1) = chords.first() else {
            return;
        };

        let moves: Vec<i32> = chords.iter().map(|c| self.score.cr(*c).staff_move).collect();
        let cross = moves.iter().min() != moves.iter().max();

        let cr1 = self.score.cr(c1);
        let staff_idx = cr1.staff_idx();
        let direction = cr1.chord().map_or(Direction::Auto, |c| c.stem_direction);
        let up = if direction != Direction::Auto {
            direction == Direction::Up
        } else if self.has_voices(cr1.measure, staff_idx) {
            cr1.voice() % 2 == 0
        } else {
            // the note farthest from the middle line decides; a tie goes down
            let middle = self.score.staves.get(staff_idx).map_or(4, |s| s.lines - 1);
            let (mut above, mut below) = (0, 0);
            for &c in &chords {
                let notes = self.score.chord_notes(c);
                if let (Some(&bottom), Some(&top)) = (notes.first(), notes.last()) {
                    above = above.max(middle - self.score.note(top).line);
                    below = below.max(self.score.note(bottom).line - middle);
                }
            }
            below > above
        };

        if let Some(beam) = self.score.beam_mut(b) {
            beam.up = up;
            beam.cross = cross;
        }
        for &c in &chords {
            if let Some(chord) = self.score.cr_mut(c).chord_mut() {
                chord.up = up;
            }
        }
        for e in elements {
            self.layout_stem1(e);
        }
    }

    /// Grace beams follow the stem direction of their first chord.
    fn layout_grace_beam(&mut self, b: BeamId) {
        let Some(elements) = self.score.beam(b).map(|beam| beam.elements.clone()) else {
            return;
        };
        let Some(&first) = elements.first() else {
            return;
        };
        let up = self.score.cr(first).up();
        if let Some(beam) = self.score.beam_mut(b) {
            beam.up = up;
        }
        for e in elements {
            if let Some(chord) = self.score.cr_mut(e).chord_mut() {
                chord.up = up;
            }
            self.layout_stem1(e);
        }
    }

    // ── geometry ──

    /// Beams starting in the given measures, main beams and grace beams.
    fn beams_of(&self, measures: &[MeasureId]) -> Vec<BeamId> {
        let mut out = Vec::new();
        let push_if_first = |id: ChordRestId, out: &mut Vec<BeamId>| {
            if let Some(b) = self.score.cr(id).beam {
                if self.score.beam(b).and_then(|beam| beam.elements.first()) == Some(&id) && !out.contains(&b) {
                    out.push(b);
                }
            }
        };
        for &mid in measures {
            let Some(m) = self.score.measure(mid) else {
                continue;
            };
            for seg in m.chord_rest_segments() {
                for id in seg.elements.iter().flatten().filter_map(|e| e.cr()) {
                    push_if_first(id, &mut out);
                    if let Some(c) = self.score.cr(id).chord() {
                        for &g in &c.grace_notes {
                            push_if_first(g, &mut out);
                        }
                    }
                }
            }
        }
        out
    }

    /// A beam kept within its own staff. Cross-staff beams, beams moved
    /// entirely to the staff above and grace beams are laid out once the
    /// page is known.
    fn is_top_beam(&self, b: BeamId) -> bool {
        let Some(beam) = self.score.beam(b) else {
            return false;
        };
        let moved_up = beam.elements.iter().all(|e| self.score.cr(*e).staff_move < 0);
        !beam.cross && !beam.grace && !moved_up
    }

    /// Lay out the top beams of a stretched system and add their
    /// footprints to the staff shapes of the segments they start in.
    pub(super) fn layout_system_beams(&mut self, measures: &[MeasureId]) {
        let beams: Vec<BeamId> = self.beams_of(measures).into_iter().filter(|b| self.is_top_beam(*b)).collect();
        if beams.is_empty() {
            return;
        }
        for &b in &beams {
            self.layout_beam(b);
        }

        // stems changed length: rebuild the footprints first
        for &mid in measures {
            let Some(m) = self.score.measure(mid) else {
                continue;
            };
            let crs: Vec<ChordRestId> =
                m.chord_rest_segments().flat_map(|s| s.elements.iter().flatten().filter_map(|e| e.cr())).collect();
            for id in crs {
                let shape = self.chord_rest_shape(id);
                self.score.cr_mut(id).shape = shape;
            }
            self.create_shapes(mid);
        }

        for b in beams {
            let Some((first, shape)) = self.score.beam(b).and_then(|beam| Some((*beam.elements.first()?, beam.shape.clone())))
            else {
                continue;
            };
            let staff_idx = self.score.cr(first).staff_idx();
            let Some((mid, sidx)) = self.score.cr_segment(first) else {
                continue;
            };
            if let Some(s) = self.score.measure_mut(mid).and_then(|m| m.segments[sidx].shapes.get_mut(staff_idx)) {
                s.add(&shape);
            }
        }
    }

    /// Lay out the beams left over by [`Self::layout_system_beams`].
    pub(super) fn layout_page_beams(&mut self, measures: &[MeasureId]) {
        let beams: Vec<BeamId> = self.beams_of(measures).into_iter().filter(|b| !self.is_top_beam(*b)).collect();
        for b in beams {
            self.layout_beam(b);
            let elements = self.score.beam(b).map(|beam| beam.elements.clone()).unwrap_or_default();
            for id in elements {
                let owner = self.score.cr(id).parent.unwrap_or(id);
                let shape = self.chord_rest_shape(owner);
                self.score.cr_mut(owner).shape = shape;
            }
        }
    }

    /// Slope-limited beam line through the stem tips, with every stem
    /// long enough to carry all its beams.
    pub(super) fn layout_beam(&mut self, b: BeamId) {
        let Some(beam) = self.score.beam(b) else {
            return;
        };
        let up = beam.up;
        let chords: Vec<ChordRestId> = beam.elements.iter().copied().filter(|e| self.score.cr(*e).is_chord()).collect();
        let Some(&first) = beam.elements.first() else {
            return;
        };
        let Some((m0, s0)) = self.score.cr_segment(first) else {
            return;
        };
        let Some(measure0) = self.score.measure(m0) else {
            return;
        };
        let base_x = measure0.x;
        let seg0_x = measure0.segments[s0].x;
        if chords.len() < 2 {
            debug!("beam {} has fewer than two chords", b.0);
            return;
        }

        let style = &self.score.style;
        let mag = self.score.cr(first).mag;
        let sp = self.score.spatium() * mag;
        let bw = style.p(style.beam_width) * mag;
        let spacing = bw * (1.0 + style.beam_distance);
        let levels = chords.iter().map(|c| self.score.cr(*c).duration_type().hooks()).max().unwrap_or(1).max(1);
        let min_len = BEAM_MIN_STEM * sp + f64::from(levels - 1) * spacing;

        struct Tip {
            id: ChordRestId,
            x: f64,
            ideal: f64,
            /// note nearest the beam
            near: f64,
            /// note farthest from the beam
            far: f64,
        }
        let mut tips = Vec::with_capacity(chords.len());
        for &c in &chords {
            let notes = self.score.chord_notes(c);
            let (Some(&bottom), Some(&top)) = (notes.first(), notes.last()) else {
                continue;
            };
            let cr = self.score.cr(c);
            let stem_len = cr.chord().map_or(0.0, |ch| ch.stem_len);
            let x = self.score.cr_system_x(c) - base_x + self.stem_pos_x(c);
            let (near, far) = if up {
                (self.score.note(top).y, self.score.note(bottom).y)
            } else {
                (self.score.note(bottom).y, self.score.note(top).y)
            };
            let ideal = if up { far - stem_len } else { far + stem_len };
            tips.push(Tip { id: c, x, ideal, near, far });
        }
        let (Some(t1), Some(t2)) = (tips.first(), tips.last()) else {
            return;
        };
        let (x1, x2) = (t1.x, t2.x);
        let dx = x2 - x1;
        let mut slope = if dx > 0.0 { (t2.ideal - t1.ideal) / dx } else { 0.0 };
        slope = slope.clamp(-style.beam_max_slope, style.beam_max_slope);
        if slope.abs() < style.beam_min_slope {
            slope = 0.0;
        }

        let mut y1 = t1.ideal;
        for t in &tips {
            let bound = if up { t.near - min_len } else { t.near + min_len };
            let at_start = bound - slope * (t.x - x1);
            y1 = if up { y1.min(at_start) } else { y1.max(at_start) };
        }
        let y2 = y1 + slope * dx;

        let hooks: Vec<u32> = tips.iter().map(|t| self.score.cr(t.id).duration_type().hooks()).collect();
        let mut shape = Shape::new();
        let stub = self.note_head_width() * mag;
        for level in 0..levels {
            let offset = f64::from(level) * spacing;
            let mut i = 0;
            while i < tips.len() {
                if hooks[i] <= level {
                    i += 1;
                    continue;
                }
                let start = i;
                while i + 1 < tips.len() && hooks[i + 1] > level {
                    i += 1;
                }
                let (xa, xb) = if start == i {
                    // broken beam on a single chord
                    if i + 1 < tips.len() {
                        (tips[i].x, tips[i].x + stub)
                    } else {
                        (tips[i].x - stub, tips[i].x)
                    }
                } else {
                    (tips[start].x, tips[i].x)
                };
                let ya = y1 + slope * (xa - x1);
                let yb = y1 + slope * (xb - x1);
                let top = ya.min(yb) + if up { offset } else { -offset - bw };
                let height = (ya - yb).abs() + bw;
                shape.add_rect(Rect::new(xa - seg0_x, top, xb - xa, height));
                i += 1;
            }
        }

        for t in &tips {
            let y = y1 + slope * (t.x - x1);
            let len = (t.far - y).abs();
            if let Some(chord) = self.score.cr_mut(t.id).chord_mut() {
                chord.stem_len = len;
                chord.has_hook = false;
            }
        }
        if let Some(beam) = self.score.beam_mut(b) {
            beam.slope = slope;
            beam.x1 = x1;
            beam.y1 = y1;
            beam.x2 = x2;
            beam.y2 = y2;
            beam.shape = shape;
        }
    }
}
