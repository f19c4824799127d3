//! Ties, tremolo pairs and the per-system fragments of spanners.

use log::{debug, warn};

use super::constants::{TEXT_ASCENT, TEXT_DESCENT};
use super::Layout;
use crate::model::{
    ChordRestId, MeasureId, NoteId, Placement, SegmentType, SpannerId, SpannerKind, SpannerSegment,
    SpannerSegmentType, SystemId,
};
use crate::shape::{Rect, Shape};

impl Layout<'_> {
    // ── connecting ──

    /// Next chord or rest of the same track in score order.
    fn next_chord_rest(&self, id: ChordRestId) -> Option<ChordRestId> {
        let cr = self.score.cr(id);
        let (track, tick) = (cr.track, cr.tick);
        let mut cur = Some(cr.measure);
        while let Some(mid) = cur {
            if let Some(m) = self.score.measure(mid) {
                let found = m
                    .segments
                    .iter()
                    .filter(|s| s.ty == SegmentType::ChordRest && s.tick > tick)
                    .find_map(|s| s.cr(track));
                if found.is_some() {
                    return found;
                }
            }
            cur = self.score.next_measure(mid);
        }
        None
    }

    /// Note of the next chord in the track with the pitch of `start`.
    fn find_tie_end(&self, start: NoteId) -> Option<NoteId> {
        let note = self.score.note(start);
        let next = self.next_chord_rest(note.chord)?;
        self.score.chord_notes(next).iter().copied().find(|n| self.score.note(*n).pitch == note.pitch)
    }

    /// Resolve the open ends of ties and two-note tremolos before a pass;
    /// whatever cannot be resolved is dropped.
    pub(super) fn connect_ties(&mut self) {
        let ids: Vec<SpannerId> = self.score.spanner_ids().collect();
        for id in ids {
            let Some(sp) = self.score.spanner(id) else {
                continue;
            };
            let (kind, tick, tick2, start, end) = (sp.kind.clone(), sp.tick, sp.tick2, sp.start_note, sp.end_note);
            match kind {
                SpannerKind::Tie => {
                    let Some(start) = start else {
                        warn!("tie at tick {tick} has no start note, removing it");
                        self.remove_spanner(id);
                        continue;
                    };
                    if end.is_some() {
                        continue;
                    }
                    match self.find_tie_end(start) {
                        Some(end) => {
                            let tick2 = self.score.cr(self.score.note(end).chord).tick;
                            if let Some(sp) = self.score.spanner_mut(id) {
                                sp.end_note = Some(end);
                                sp.tick2 = tick2;
                            }
                            self.score.note_mut(end).tie_back = Some(id);
                            debug!("tie at tick {tick} connected to tick {tick2}");
                        }
                        None => {
                            warn!("tie at tick {tick} has no end note, removing it");
                            self.remove_spanner(id);
                        }
                    }
                }
                SpannerKind::Glissando if start.is_none() || end.is_none() => {
                    warn!("glissando at tick {tick} has no end note, removing it");
                    self.remove_spanner(id);
                }
                _ => {
                    if tick2 < tick {
                        warn!("spanner at tick {tick} has no end element, removing it");
                        self.remove_spanner(id);
                    }
                }
            }
        }

        let chords: Vec<ChordRestId> = (0..self.score.chord_rests.len())
            .map(ChordRestId)
            .filter(|id| {
                self.score.cr(*id).chord().and_then(|c| c.tremolo.as_ref()).is_some_and(|t| t.two_notes)
            })
            .collect();
        for id in chords {
            let next = self.next_chord_rest(id);
            let measure = self.score.cr(id).measure;
            let tick = self.score.cr(id).tick;
            let chord2 = match next {
                Some(n) if self.score.cr(n).is_rest() => {
                    warn!("tremolo at tick {tick}: next element is a rest");
                    None
                }
                Some(n) if self.score.cr(n).measure != measure => {
                    warn!("tremolo at tick {tick} would cross a barline");
                    None
                }
                Some(n) => Some(n),
                None => {
                    warn!("tremolo at tick {tick} has no second chord");
                    None
                }
            };
            if let Some(c) = self.score.cr_mut(id).chord_mut() {
                match chord2 {
                    Some(n) => {
                        if let Some(t) = c.tremolo.as_mut() {
                            t.chord2 = Some(n);
                        }
                    }
                    None => c.tremolo = None,
                }
            }
        }
    }

    /// Remove a spanner and every reference to it.
    fn remove_spanner(&mut self, id: SpannerId) {
        let Some(sp) = self.score.remove_spanner(id) else {
            return;
        };
        for n in [sp.start_note, sp.end_note].into_iter().flatten() {
            let note = self.score.note_mut(n);
            if note.tie_for == Some(id) {
                note.tie_for = None;
            }
            if note.tie_back == Some(id) {
                note.tie_back = None;
            }
        }
        for system in &mut self.score.systems {
            system.spanners.retain(|s| *s != id);
        }
    }

    // ── positions ──

    /// System x of the first chord/rest at or after `tick`, the end of the
    /// system past its last measure.
    fn tick_x(&self, measures: &[MeasureId], tick: i32) -> f64 {
        for &mid in measures {
            let Some(m) = self.score.measure(mid) else {
                continue;
            };
            if tick < m.tick || tick >= m.end_tick() {
                continue;
            }
            let x = m
                .segments
                .iter()
                .find(|s| s.enabled && s.ty.is_chord_rest() && s.tick >= tick)
                .map_or(m.width, |s| s.x);
            return m.x + x;
        }
        self.system_end_x(measures)
    }

    /// System x of the start of the measure holding `tick`.
    fn measure_x(&self, measures: &[MeasureId], tick: i32) -> f64 {
        measures
            .iter()
            .filter_map(|m| self.score.measure(*m))
            .find(|m| tick >= m.tick && tick < m.end_tick())
            .map_or_else(|| self.system_end_x(measures), |m| m.x)
    }

    fn system_start_x(&self, measures: &[MeasureId]) -> f64 {
        measures.first().and_then(|m| self.score.measure(*m)).map_or(0.0, |m| {
            m.x + m.segments.iter().find(|s| s.enabled && s.ty.is_chord_rest()).map_or(0.0, |s| s.x)
        })
    }

    fn system_end_x(&self, measures: &[MeasureId]) -> f64 {
        measures.last().map_or(0.0, |m| self.score.mb(*m).x() + self.score.mb(*m).width())
    }

    /// Top and bottom of a staff's measure shapes between `x1` and `x2`.
    fn staff_extent(&self, measures: &[MeasureId], staff_idx: usize, x1: f64, x2: f64) -> (f64, f64) {
        let height = self.score.staves.get(staff_idx).map_or(0.0, |s| s.height_sp()) * self.score.spatium();
        let (mut top, mut bottom) = (0.0_f64, height);
        for &mid in measures {
            let Some((mx, shape)) =
                self.score.measure(mid).and_then(|m| m.mstaves.get(staff_idx).map(|s| (m.x, &s.shape)))
            else {
                continue;
            };
            for r in shape.rects.iter().map(|r| r.translated(mx, 0.0)) {
                if r.right() > x1 && r.left() < x2 && r.height > 0.0 {
                    top = top.min(r.top());
                    bottom = bottom.max(r.bottom());
                }
            }
        }
        (top, bottom)
    }

    fn segment_type(starts_here: bool, ends_here: bool) -> SpannerSegmentType {
        match (starts_here, ends_here) {
            (true, true) => SpannerSegmentType::Single,
            (true, false) => SpannerSegmentType::Begin,
            (false, true) => SpannerSegmentType::End,
            (false, false) => SpannerSegmentType::Middle,
        }
    }

    /// Replace the fragment a spanner has in `sid`. Returns its index.
    fn store_spanner_segment(&mut self, id: SpannerId, segment: SpannerSegment) -> Option<usize> {
        let sid = segment.system;
        let sp = self.score.spanner_mut(id)?;
        sp.segments.retain(|s| s.system != sid);
        sp.segments.push(segment);
        let idx = sp.segments.len() - 1;
        let system = self.score.system_mut(sid);
        if !system.spanners.contains(&id) {
            system.spanners.push(id);
        }
        Some(idx)
    }

    // ── system spanners ──

    /// Fragments of the tick-anchored spanners crossing a system, volta
    /// alignment, and their footprints in the measure shapes.
    pub(super) fn layout_system_spanners(&mut self, sid: SystemId, measures: &[MeasureId]) {
        let (Some(&first), Some(&last)) = (measures.first(), measures.last()) else {
            return;
        };
        let stick = self.score.mb(first).tick();
        let etick = self.score.mb(last).end_tick();
        if etick <= stick {
            return;
        }
        let score_end = self.score.last_measure().map_or(etick, |m| self.score.mb(m).end_tick());

        let ids: Vec<SpannerId> = self
            .score
            .spanner_ids()
            .filter(|id| {
                self.score.spanner(*id).is_some_and(|sp| {
                    sp.start_note.is_none() && !sp.kind.is_tie() && sp.tick < etick && sp.tick2 > stick
                })
            })
            .collect();
        let mut voltas = Vec::new();
        for id in ids {
            if let Some(sp) = self.score.spanner_mut(id) {
                if sp.kind == SpannerKind::Ottava && sp.ticks() == 0 {
                    sp.tick2 = score_end;
                }
            }
            let Some(idx) = self.layout_spanner_segment(id, sid, measures, stick, etick) else {
                continue;
            };
            if self.score.spanner(id).is_some_and(|sp| sp.kind.is_volta() && sp.autoplace) {
                voltas.push((id, idx));
            }
        }

        if voltas.len() > 1 {
            let y = voltas
                .iter()
                .filter_map(|(id, idx)| self.score.spanner(*id).map(|sp| sp.segments[*idx].y))
                .fold(0.0_f64, f64::min);
            for (id, idx) in voltas {
                if let Some(sp) = self.score.spanner_mut(id) {
                    sp.segments[idx].y = y;
                }
            }
        }

        let spanners = self.score.system(sid).spanners.clone();
        for &mid in measures {
            let Some(m) = self.score.measure(mid) else {
                continue;
            };
            let (mtick, mend, mx) = (m.tick, m.end_tick(), m.x);
            let mut shapes = Vec::new();
            for &id in &spanners {
                let Some(sp) = self.score.spanner(id) else {
                    continue;
                };
                if !sp.visible || sp.tick >= mend || sp.tick2 <= mtick {
                    continue;
                }
                for seg in sp.segments.iter().filter(|s| s.system == sid) {
                    shapes.push((sp.staff_idx(), seg.shape.translated(seg.x - mx, seg.y)));
                }
            }
            if let Some(m) = self.score.measure_mut(mid) {
                for (staff_idx, shape) in shapes {
                    if let Some(ms) = m.mstaves.get_mut(staff_idx) {
                        ms.shape.add(&shape);
                    }
                }
            }
        }
    }

    fn layout_spanner_segment(
        &mut self,
        id: SpannerId,
        sid: SystemId,
        measures: &[MeasureId],
        stick: i32,
        etick: i32,
    ) -> Option<usize> {
        let sp = self.score.spanner(id)?;
        let style = &self.score.style;
        let spatium = self.score.spatium();
        let min_distance = style.p(style.min_autoplace_distance);
        let staff_idx = sp.staff_idx();
        let starts_here = sp.tick >= stick;
        let ends_here = sp.tick2 <= etick;

        let x1 = match (starts_here, &sp.kind) {
            (false, _) => self.system_start_x(measures),
            (true, SpannerKind::Volta { .. }) => self.measure_x(measures, sp.tick),
            (true, _) => self.tick_x(measures, sp.tick),
        };
        let x2 = match (ends_here, &sp.kind) {
            (false, _) => self.system_end_x(measures),
            (true, SpannerKind::Slur) => self.tick_x(measures, sp.tick2) + self.note_head_width(),
            (true, SpannerKind::Volta { .. }) => self.measure_x(measures, sp.tick2 - 1)
                + measures
                    .iter()
                    .filter_map(|m| self.score.measure(*m))
                    .find(|m| sp.tick2 - 1 >= m.tick && sp.tick2 - 1 < m.end_tick())
                    .map_or(0.0, |m| m.width),
            (true, _) => self.tick_x(measures, sp.tick2),
        };
        let width = (x2 - x1).max(0.0);

        let (top, bottom) = if sp.autoplace {
            self.staff_extent(measures, staff_idx, x1, x2)
        } else {
            (0.0, self.score.staves.get(staff_idx).map_or(0.0, |s| s.height_sp()) * spatium)
        };

        let (y, rect) = match &sp.kind {
            SpannerKind::Slur => {
                let h = (width * 0.1).clamp(style.p(style.slur_min_height), style.p(style.slur_max_height));
                match sp.placement {
                    Placement::Above => (top - min_distance, Rect::new(0.0, -h, width, h)),
                    Placement::Below => (bottom + min_distance, Rect::new(0.0, 0.0, width, h)),
                }
            }
            SpannerKind::Hairpin(_) => {
                let h = style.p(style.hairpin_height);
                match sp.placement {
                    Placement::Above => (top - min_distance - h, Rect::new(0.0, 0.0, width, h)),
                    Placement::Below => (bottom + min_distance, Rect::new(0.0, 0.0, width, h)),
                }
            }
            SpannerKind::Volta { .. } => {
                let h = style.p(style.volta_height);
                let y = style.p(style.volta_y);
                let y = if sp.autoplace { y.min(top - min_distance - h) } else { y };
                (y, Rect::new(0.0, 0.0, width, h))
            }
            SpannerKind::Ottava => {
                let h = style.p(style.text_font_size) * (TEXT_ASCENT + TEXT_DESCENT);
                match sp.placement {
                    Placement::Above => {
                        let y = style.p(style.ottava_y);
                        let y = if sp.autoplace { y.min(top - min_distance - h) } else { y };
                        (y, Rect::new(0.0, 0.0, width, h))
                    }
                    Placement::Below => (bottom + min_distance, Rect::new(0.0, 0.0, width, h)),
                }
            }
            SpannerKind::Tie | SpannerKind::Glissando => return None,
        };

        let segment = SpannerSegment {
            system: sid,
            ty: Self::segment_type(starts_here, ends_here),
            x: x1,
            y: y + sp.user_y_offset,
            width,
            shape: Shape::from_rect(rect),
        };
        self.store_spanner_segment(id, segment)
    }

    // ── note spanners ──

    /// Fragments of ties and glissandi in a system. Runs once stems and
    /// beams of the page are final.
    pub(super) fn layout_note_spanners(&mut self, sid: SystemId) {
        let measures: Vec<MeasureId> =
            self.score.system(sid).measures.iter().copied().filter(|m| self.score.is_measure(*m)).collect();
        let (Some(&first), Some(&last)) = (measures.first(), measures.last()) else {
            return;
        };
        let stick = self.score.mb(first).tick();
        let etick = self.score.mb(last).end_tick();

        let ids: Vec<SpannerId> = self
            .score
            .spanner_ids()
            .filter(|id| {
                self.score.spanner(*id).is_some_and(|sp| {
                    sp.start_note.is_some() && sp.end_note.is_some() && sp.tick < etick && sp.tick2 >= stick
                })
            })
            .collect();
        for id in ids {
            self.layout_note_spanner(id, sid, &measures);
        }
    }

    fn layout_note_spanner(&mut self, id: SpannerId, sid: SystemId, measures: &[MeasureId]) {
        let Some(sp) = self.score.spanner(id) else {
            return;
        };
        let (Some(start), Some(end)) = (sp.start_note, sp.end_note) else {
            return;
        };
        let kind = sp.kind.clone();
        let user_y_offset = sp.user_y_offset;
        let (c1, c2) = (self.score.note(start).chord, self.score.note(end).chord);
        let in_system = |c: ChordRestId| {
            let owner = self.score.cr(c).parent.unwrap_or(c);
            self.score.mb(self.score.cr(owner).measure).system() == Some(sid)
        };
        let (starts_here, ends_here) = (in_system(c1), in_system(c2));
        let sp_tick = sp.tick;
        let stick = measures.first().map_or(0, |m| self.score.mb(*m).tick());
        if !starts_here && !ends_here && sp_tick >= stick {
            return;
        }

        let sp_abs = self.score.spatium();
        let x1 = if starts_here {
            self.score.cr_system_x(c1) + self.score.note(start).x + self.head_width(start)
        } else {
            self.system_start_x(measures)
        };
        let x2 = if ends_here {
            self.score.cr_system_x(c2) + self.score.note(end).x
        } else {
            self.system_end_x(measures)
        };
        let width = (x2 - x1).max(0.0);
        let y1 = self.score.note(start).y;
        let y2 = self.score.note(end).y;

        let (y, rect) = match kind {
            SpannerKind::Tie => {
                let h = self.score.style.p(self.score.style.slur_min_height) * 0.5;
                let y = if starts_here { y1 } else { y2 };
                let up = self.score.cr(c1).up();
                if up {
                    (y + 0.5 * sp_abs, Rect::new(0.0, 0.0, width, h))
                } else {
                    (y - 0.5 * sp_abs, Rect::new(0.0, -h, width, h))
                }
            }
            SpannerKind::Glissando => {
                let (ya, yb) = match (starts_here, ends_here) {
                    (true, true) => (y1, y2),
                    (true, false) => (y1, y1),
                    _ => (y2, y2),
                };
                (ya, Rect::new(0.0, (yb - ya).min(0.0), width, (yb - ya).abs()))
            }
            _ => return,
        };

        let segment = SpannerSegment {
            system: sid,
            ty: Self::segment_type(starts_here, ends_here),
            x: x1,
            y: y + user_y_offset,
            width,
            shape: Shape::from_rect(rect),
        };
        self.store_spanner_segment(id, segment);
    }
}
