//! Lyrics and segment annotations: base placement, autoplace against the
//! staff shape and vertical alignment of lyric lines.

use super::constants::{TEXT_ASCENT, TEXT_DESCENT};
use super::Layout;
use crate::model::{AnnotationKind, ChordRest, ChordRestId, Lyrics, MeasureId, Placement, SpannerKind, VOICES};
use crate::shape::{Rect, Shape};

/// Box of a lyric syllable relative to the segment origin.
pub(super) fn lyric_rect(cr: &ChordRest, l: &Lyrics) -> Rect {
    l.bbox.translated(cr.x + l.x, l.y + l.user_y_offset)
}

impl Layout<'_> {
    fn text_box(&self, text: &str, font: f64) -> Rect {
        let width = self.glyphs.text_width(text, font);
        Rect::new(0.0, -TEXT_ASCENT * font, width, (TEXT_ASCENT + TEXT_DESCENT) * font)
    }

    pub(super) fn layout_page_fingerings(&mut self, measures: &[MeasureId]) {
        let ids: Vec<ChordRestId> = measures
            .iter()
            .filter_map(|m| self.score.measure(*m))
            .flat_map(|m| m.chord_rest_segments())
            .flat_map(|s| s.elements.iter().filter_map(|e| e.as_ref().and_then(|e| e.cr())))
            .collect();
        for id in ids {
            self.layout_fingerings(id);
        }
    }

    /// Put fingerings beside a single notehead: above, or below on the
    /// lowest staff of a multi-staff part. With several voices the side
    /// follows the stem; unbeamed stems get extra room. In a chord they
    /// only move left of the heads.
    pub(super) fn layout_fingerings(&mut self, id: ChordRestId) {
        let cr = self.score.cr(id);
        let Some(chord) = cr.chord() else {
            return;
        };
        let notes = chord.notes.clone();
        if notes.iter().all(|n| self.score.note(*n).fingerings.is_empty()) {
            return;
        }
        let (up, has_stem, stem_len) = (chord.up, chord.has_stem, chord.stem_len);
        let (mid, beamed, staff_idx) = (cr.measure, cr.beam.is_some(), cr.staff_idx());
        let sp = self.score.spatium();

        let part = self.score.staves.get(staff_idx).map(|s| s.part);
        let part_staves: Vec<usize> =
            (0..self.score.nstaves()).filter(|&i| Some(self.score.staves[i].part) == part).collect();
        let voices = self.has_voices(mid, staff_idx);
        let below = if voices { !up } else { part_staves.len() > 1 && part_staves.last() == Some(&staff_idx) };
        let tight = voices && !beamed;

        for &n in &notes {
            let (x, y) = if notes.len() > 1 {
                (-sp, 0.0)
            } else {
                let head_height = sp * self.note_mag(n);
                let mut x = self.head_width(n) * 0.5;
                let mut y;
                if below {
                    y = head_height + sp * 0.4;
                    if tight {
                        y += 0.5 * sp;
                        if has_stem {
                            x += 0.5 * sp;
                        }
                    } else if has_stem && !up {
                        y += stem_len;
                        x -= sp * 0.4;
                    }
                } else {
                    y = -head_height - sp * 0.4;
                    if tight {
                        y -= 0.5 * sp;
                        if has_stem {
                            x -= 0.5 * sp;
                        }
                    } else if has_stem && up {
                        y -= stem_len;
                        x += sp * 0.4;
                    }
                }
                (x, y)
            };
            for f in self.score.note_mut(n).fingerings.iter_mut().filter(|f| f.kind.is_auto_positioned()) {
                f.x = x;
                f.y = y;
                if x != 0.0 && y != 0.0 {
                    f.autoplace = false;
                }
            }
        }
    }

    /// Centre each syllable under the notehead and put it on its verse line.
    pub(super) fn layout_lyrics(&mut self, id: ChordRestId) {
        if self.score.cr(id).lyrics.is_empty() {
            return;
        }
        let style = &self.score.style;
        let font = style.p(style.lyrics_font_size);
        let top_distance = style.p(style.lyrics_min_top_distance);
        let line_height = style.p(style.lyrics_line_height);
        let staff_idx = self.score.cr(id).staff_idx();
        let staff_h = self.score.staves.get(staff_idx).map_or(4.0, |s| s.height_sp()) * self.score.spatium();
        let head_w = self.note_head_width() * self.score.cr(id).mag;

        let boxes: Vec<Rect> = self.score.cr(id).lyrics.iter().map(|l| self.text_box(&l.text, font)).collect();
        let cr = self.score.cr_mut(id);
        for (l, bbox) in cr.lyrics.iter_mut().zip(boxes) {
            l.bbox = bbox;
            l.x = (head_w - bbox.width) * 0.5;
            let verse = l.verse as f64;
            l.y = match l.placement {
                Placement::Below => staff_h + top_distance - bbox.top() + verse * line_height,
                Placement::Above => -top_distance - bbox.bottom() - verse * line_height,
            };
            if l.autoplace {
                l.user_y_offset = 0.0;
            }
        }
    }

    fn annotation_font(&self, kind: AnnotationKind) -> f64 {
        let style = &self.score.style;
        style.p(match kind {
            AnnotationKind::TempoText { .. } => style.tempo_font_size,
            AnnotationKind::Dynamic => style.dynamics_font_size,
            _ => style.text_font_size,
        })
    }

    /// Default box and position of every annotation of a segment.
    pub(super) fn layout_segment_annotations(&mut self, mid: MeasureId, sidx: usize) {
        let Some(count) = self.score.measure(mid).map(|m| m.segments[sidx].annotations.len()) else {
            return;
        };
        for idx in 0..count {
            self.layout_annotation(mid, sidx, idx);
        }
    }

    fn layout_annotation(&mut self, mid: MeasureId, sidx: usize, idx: usize) {
        let Some(a) = self.score.measure(mid).map(|m| &m.segments[sidx].annotations[idx]) else {
            return;
        };
        let sp = self.score.spatium();
        let font = self.annotation_font(a.kind);
        let mut bbox = self.text_box(&a.text, font);
        if matches!(a.kind, AnnotationKind::RehearsalMark) {
            // framed
            bbox = bbox.adjusted(-0.5 * sp, -0.5 * sp, 0.5 * sp, 0.5 * sp);
        }
        let staff_h = self.score.staves.get(a.staff_idx()).map_or(4.0, |s| s.height_sp()) * sp;
        let x = match a.kind {
            AnnotationKind::Dynamic => (self.note_head_width() - bbox.width) * 0.5,
            _ => 0.0,
        };
        let y = match a.placement {
            Placement::Above => -2.0 * sp - bbox.bottom(),
            Placement::Below => staff_h + 2.0 * sp - bbox.top(),
        };
        if let Some(a) = self.score.measure_mut(mid).map(|m| &mut m.segments[sidx].annotations[idx]) {
            a.bbox = bbox;
            a.x = x;
            a.y = y;
        }
    }

    /// Move an annotation clear of the measure's staff shape and reserve
    /// its box in the segment shape.
    pub(super) fn autoplace_annotation(&mut self, mid: MeasureId, sidx: usize, idx: usize) {
        let Some(m) = self.score.measure(mid) else {
            return;
        };
        let seg = &m.segments[sidx];
        let a = &seg.annotations[idx];
        if !a.visible {
            return;
        }
        let staff_idx = a.staff_idx();
        let min_distance = self.score.style.p(self.score.style.min_autoplace_distance);
        let mut dy = 0.0;
        if a.autoplace && !self.anchors_hairpin(seg.tick, staff_idx, a.kind) {
            let staff_shape = self.measure_staff_shape(mid, staff_idx);
            let r = Shape::from_rect(a.bbox.translated(seg.x + a.x, a.y));
            match a.placement {
                Placement::Above => {
                    let d = r.min_vertical_distance(&staff_shape);
                    if d > -min_distance {
                        dy = -d - min_distance;
                    }
                }
                Placement::Below => {
                    let d = staff_shape.min_vertical_distance(&r);
                    if d > -min_distance {
                        dy = d + min_distance;
                    }
                }
            }
        }
        let Some(seg) = self.score.measure_mut(mid).map(|m| &mut m.segments[sidx]) else {
            return;
        };
        let a = &mut seg.annotations[idx];
        a.y += dy;
        let placed = a.bbox.translated(a.x, a.y);
        if let Some(shape) = seg.shapes.get_mut(staff_idx) {
            shape.add_rect(placed);
        }
    }

    /// A dynamic at the start or end of a hairpin stays where the hairpin
    /// expects it.
    fn anchors_hairpin(&self, tick: i32, staff_idx: usize, kind: AnnotationKind) -> bool {
        if kind != AnnotationKind::Dynamic {
            return false;
        }
        self.score.spanners.iter().flatten().any(|sp| {
            matches!(sp.kind, SpannerKind::Hairpin(_))
                && sp.staff_idx() == staff_idx
                && (sp.tick == tick || sp.tick2 == tick)
        })
    }

    // ── lyrics alignment ──

    /// How far the below-staff lyrics of a segment must move down to clear
    /// the rest of the staff.
    pub(super) fn find_lyrics_max_y(&mut self, mid: MeasureId, sidx: usize, staff_idx: usize) -> f64 {
        let lmtd = self.score.style.p(self.score.style.lyrics_min_top_distance);
        let mut y_max = 0.0_f64;
        for voice in 0..VOICES {
            let Some(sh) = self.reset_lyrics(mid, sidx, staff_idx * VOICES + voice, Placement::Below) else {
                continue;
            };
            let Some(seg) = self.score.measure(mid).map(|m| &m.segments[sidx]) else {
                continue;
            };
            let Some(mut staff_shape) = seg.shapes.get(staff_idx).cloned() else {
                continue;
            };
            staff_shape.remove(&sh);
            let y = staff_shape.min_vertical_distance(&sh);
            if y > -lmtd {
                y_max = y_max.max(y + lmtd);
            }
        }
        y_max
    }

    /// How far the above-staff lyrics of a segment must move up (negative).
    pub(super) fn find_lyrics_min_y(&mut self, mid: MeasureId, sidx: usize, staff_idx: usize) -> f64 {
        let lmtd = self.score.style.p(self.score.style.lyrics_min_top_distance);
        let mut y_min = 0.0_f64;
        for voice in 0..VOICES {
            let Some(sh) = self.reset_lyrics(mid, sidx, staff_idx * VOICES + voice, Placement::Above) else {
                continue;
            };
            let Some(seg) = self.score.measure(mid).map(|m| &m.segments[sidx]) else {
                continue;
            };
            let Some(mut staff_shape) = seg.shapes.get(staff_idx).cloned() else {
                continue;
            };
            staff_shape.remove(&sh);
            let y = sh.min_vertical_distance(&staff_shape);
            if y > -lmtd {
                y_min = y_min.min(-y - lmtd);
            }
        }
        y_min
    }

    /// Clear the offsets of the autoplaced lyrics of one placement in a
    /// track and return their boxes, `None` when there are none.
    fn reset_lyrics(&mut self, mid: MeasureId, sidx: usize, track: usize, placement: Placement) -> Option<Shape> {
        let id = self.score.measure(mid)?.segments[sidx].cr(track)?;
        let cr = self.score.cr_mut(id);
        if cr.lyrics.is_empty() {
            return None;
        }
        for l in cr.lyrics.iter_mut().filter(|l| l.autoplace && l.placement == placement) {
            l.user_y_offset = 0.0;
        }
        let cr = self.score.cr(id);
        let mut sh = Shape::new();
        for l in cr.lyrics.iter().filter(|l| l.autoplace && l.placement == placement) {
            sh.add_rect(lyric_rect(cr, l));
        }
        Some(sh)
    }

    /// Apply a common offset to the autoplaced lyrics of one placement and
    /// reserve their boxes (plus the bottom or top margin) in the shape.
    pub(super) fn apply_lyrics_offset(
        &mut self,
        mid: MeasureId,
        sidx: usize,
        staff_idx: usize,
        placement: Placement,
        offset: f64,
    ) {
        let lmbd = self.score.style.p(self.score.style.lyrics_min_bottom_distance);
        let mut old = Shape::new();
        let mut new = Shape::new();
        for voice in 0..VOICES {
            let track = staff_idx * VOICES + voice;
            let Some(id) = self.score.measure(mid).and_then(|m| m.segments[sidx].cr(track)) else {
                continue;
            };
            let cr = self.score.cr(id);
            for l in cr.lyrics.iter().filter(|l| l.autoplace && l.placement == placement) {
                old.add_rect(lyric_rect(cr, l));
            }
            let cr = self.score.cr_mut(id);
            for l in cr.lyrics.iter_mut().filter(|l| l.autoplace && l.placement == placement) {
                l.user_y_offset = offset;
            }
            let cr = self.score.cr(id);
            for l in cr.lyrics.iter().filter(|l| l.autoplace && l.placement == placement) {
                let r = lyric_rect(cr, l);
                new.add_rect(match placement {
                    Placement::Below => r.adjusted(0.0, 0.0, 0.0, lmbd),
                    Placement::Above => r.adjusted(0.0, -lmbd, 0.0, 0.0),
                });
            }
        }
        if let Some(shape) = self.score.measure_mut(mid).and_then(|m| m.segments[sidx].shapes.get_mut(staff_idx)) {
            shape.remove(&old);
            shape.add(&new);
        }
    }
}
