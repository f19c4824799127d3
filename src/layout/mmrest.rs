//! Multi-measure rests: eligibility of a measure, run boundaries and the
//! substitute measure standing in for a run.

use log::debug;

use super::Layout;
use crate::model::{
    Annotation, AnnotationKind, BarLineType, ChordRest, ChordRestKind, DurationType, Fraction, MarkKind, Measure, MeasureBase,
    MeasureId, Rest, SegmentElement, SegmentType, TDuration, VOICES,
};
use crate::undo::{Change, SegmentRef};

impl Layout<'_> {
    fn staff_shown(&self, staff_idx: usize) -> bool {
        self.score.staves.get(staff_idx).map_or(false, |s| s.show)
    }

    /// True when the measure may be part of a multi-measure rest: regular,
    /// only tolerated annotations, and on every shown staff at most one
    /// plain rest.
    pub fn valid_mm_rest_measure(&self, mid: MeasureId) -> bool {
        let Some(m) = self.score.measure(mid) else {
            return false;
        };
        if m.irregular {
            return false;
        }
        let mut rest_segments = 0;
        for seg in &m.segments {
            if seg.annotations.iter().any(|a| !a.kind.is_mm_rest_compatible()) {
                return false;
            }
            if !seg.ty.is_chord_rest() {
                continue;
            }
            let mut rest_found = false;
            for (track, e) in seg.elements.iter().enumerate() {
                if !self.staff_shown(track / VOICES) {
                    continue;
                }
                let Some(id) = e.as_ref().and_then(|e| e.cr()) else {
                    continue;
                };
                let cr = self.score.cr(id);
                // a fermata breaks the run
                if !cr.is_rest() || !cr.articulations.is_empty() {
                    return false;
                }
                rest_found = true;
            }
            if rest_found {
                rest_segments += 1;
            }
            if rest_segments > 1 {
                return false;
            }
        }
        true
    }

    /// True when the measure must start a new multi-measure rest rather
    /// than extend the current one.
    pub fn break_multi_measure_rest(&self, mid: MeasureId) -> bool {
        let Some(m) = self.score.measure(mid) else {
            return true;
        };
        if m.break_mm_rest || m.repeat_start {
            return true;
        }
        let pm = self.score.prev_measure(mid).and_then(|p| self.score.measure(p));
        if pm.is_some_and(|p| p.repeat_end || p.section_break.is_some()) {
            return true;
        }

        let (tick, end_tick) = (m.tick, m.end_tick());
        let volta_edge = self.score.spanners.iter().flatten().any(|s| {
            s.kind.is_volta() && s.overlaps(tick, end_tick) && (s.tick == tick || s.tick2 == tick || s.tick2 == end_tick)
        });
        if volta_edge {
            return true;
        }

        if m.marks.iter().any(|mk| mk.kind == MarkKind::Marker && !mk.right_aligned) {
            return true;
        }
        if let Some(p) = pm {
            if p.marks.iter().any(|mk| mk.kind == MarkKind::Jump || mk.right_aligned) {
                return true;
            }
        }

        for seg in &m.segments {
            for a in &seg.annotations {
                let shown = a.system_flag || self.staff_shown(a.staff_idx());
                match a.kind {
                    AnnotationKind::RehearsalMark | AnnotationKind::TempoText { .. } => return true,
                    AnnotationKind::Harmony | AnnotationKind::StaffText if shown => return true,
                    _ => {}
                }
            }
            for staff_idx in (0..self.score.nstaves()).filter(|&s| self.staff_shown(s)) {
                let Some(e) = seg.element(staff_idx * VOICES) else {
                    continue;
                };
                if e.generated() {
                    continue;
                }
                match seg.ty {
                    SegmentType::StartRepeatBarLine => return true,
                    SegmentType::KeySig | SegmentType::TimeSig if tick != 0 => return true,
                    SegmentType::Clef if seg.tick != end_tick && tick != 0 => return true,
                    _ => {}
                }
            }
        }

        if let Some(p) = pm {
            // only the first staff holding a barline decides
            let first_barline = p.end_barline_segment().and_then(|s| {
                p.segments[s].elements.iter().step_by(VOICES).flatten().find_map(|e| match e {
                    SegmentElement::BarLine(b) => Some(b),
                    _ => None,
                })
            });
            if let Some(bl) = first_barline {
                let plain = matches!(bl.ty, BarLineType::Normal | BarLineType::Broken | BarLineType::Dotted);
                if !plain && !bl.generated {
                    return true;
                }
            }
            if p.find_segment(SegmentType::Clef, tick).is_some() {
                return true;
            }
        }
        false
    }

    /// Create or update the substitute measure standing for the run from
    /// `m` to `lm` of total length `len`.
    pub(super) fn create_mm_rest(&mut self, m: MeasureId, lm: MeasureId, len: Fraction) {
        let mut n = 1;
        let mut cur = self.score.next_measure(m);
        while let Some(mm) = cur {
            n += 1;
            if let Some(measure) = self.score.measure_mut(mm) {
                measure.mm_rest_count = -1;
            }
            if let Some(old) = self.score.measure(mm).and_then(|x| x.mm_rest) {
                self.change(Change::ChangeMMRest { measure: mm, mm_rest: None, old: Some(old) });
            }
            if mm == lm {
                break;
            }
            cur = self.score.next_measure(mm);
        }

        let Some((first, last)) = self.score.measure(m).cloned().zip(self.score.measure(lm).cloned()) else {
            return;
        };
        let nstaves = self.score.nstaves();
        let mmr = match first.mm_rest {
            Some(mmr) => {
                let old_end = self.score.measure(mmr).map_or(0, |x| x.end_tick());
                if let Some(x) = self.score.measure_mut(mmr) {
                    if !x.len.identical(&len) {
                        x.len = len;
                        let end = x.end_tick();
                        for s in x.segments.iter_mut().filter(|s| s.tick == old_end) {
                            s.tick = end;
                        }
                    }
                }
                mmr
            }
            None => {
                let mut x = Measure::new(first.tick, len, nstaves);
                x.timesig = first.timesig;
                let mmr = self.score.add_measure_base(MeasureBase::Measure(x));
                self.change(Change::ChangeMMRest { measure: m, mm_rest: Some(mmr), old: None });
                mmr
            }
        };
        let end_tick = first.tick + len.ticks();
        let next = self.score.next_layout_item(lm);
        if let Some(x) = self.score.measure_mut(mmr) {
            x.tick = first.tick;
            x.mm_rest_count = n;
            x.no = first.no;
            x.page_break = last.page_break;
            x.line_break = last.line_break;
            x.section_break = last.section_break.clone();
            x.repeat_start = first.repeat_start || last.repeat_start;
            x.repeat_end = first.repeat_end || last.repeat_end;
            x.marks = last.marks.clone();
            x.marks.extend(first.marks.iter().filter(|mk| mk.kind == MarkKind::Marker).cloned());
            x.prev = first.prev;
            x.next = next;
            x.resize_staves(nstaves);
        }

        self.copy_end_barline(&last, mmr, end_tick);

        // clef change at the end of the run
        let clefs = elements_of(&last, SegmentType::Clef, last.end_tick());
        self.sync_segment(mmr, SegmentType::Clef, end_tick, clefs);
        for ty in [SegmentType::TimeSig, SegmentType::Ambitus, SegmentType::KeySig] {
            let elements = elements_of(&first, ty, first.tick);
            self.sync_segment(mmr, ty, first.tick, elements);
        }

        self.add_mm_rests(mmr, first.tick, len);
        self.merge_mm_rest_annotations(&first, mmr);
        debug!("mmrest at tick {}: {} measures", first.tick, n);
    }

    fn copy_end_barline(&mut self, last: &Measure, mmr: MeasureId, end_tick: i32) {
        let Some(barlines) = elements_of(last, SegmentType::EndBarLine, last.end_tick()) else {
            return;
        };
        for (track, e) in barlines.into_iter().enumerate().step_by(VOICES) {
            let Some(SegmentElement::BarLine(src)) = e else {
                continue;
            };
            let existing = self.score.measure(mmr).and_then(|x| {
                let s = x.find_segment(SegmentType::EndBarLine, end_tick)?;
                match x.segments[s].element(track) {
                    Some(SegmentElement::BarLine(b)) => Some((b.ty, b.generated)),
                    _ => None,
                }
            });
            match existing {
                None => self.add_element(mmr, SegmentType::EndBarLine, end_tick, track, SegmentElement::BarLine(src)),
                Some((old, old_generated)) if old != src.ty => {
                    let at = SegmentRef::new(mmr, SegmentType::EndBarLine, end_tick);
                    self.change(Change::ChangeBarLineType { at, track, ty: src.ty, old, generated: true, old_generated });
                }
                Some(_) => {}
            }
        }
    }

    /// Mirror the first-staff elements of a segment of a real measure into
    /// the substitute; an absent source removes the substitute's segment
    /// (a key signature segment only when it is empty).
    fn sync_segment(&mut self, mmr: MeasureId, ty: SegmentType, tick: i32, source: Option<Vec<Option<SegmentElement>>>) {
        let Some(source) = source else {
            // a key signature segment goes only once nothing is left in it
            let keep = ty == SegmentType::KeySig
                && self
                    .score
                    .measure(mmr)
                    .is_some_and(|x| x.find_segment(ty, tick).is_some_and(|s| !x.segments[s].is_empty()));
            if !keep {
                self.remove_segment(mmr, ty, tick);
            }
            return;
        };
        for (track, e) in source.into_iter().enumerate().step_by(VOICES) {
            let Some(e) = e else {
                continue;
            };
            let existing = self
                .score
                .measure(mmr)
                .and_then(|x| x.find_segment(ty, tick).and_then(|s| x.segments[s].element(track).cloned()));
            match (existing, e) {
                (None, e) => self.add_element(mmr, ty, tick, track, e),
                (Some(SegmentElement::KeySig(old)), SegmentElement::KeySig(new)) if old.event != new.event => {
                    let at = SegmentRef::new(mmr, ty, tick);
                    self.change(Change::ChangeKeySig { at, track, event: new.event, old: old.event });
                }
                (Some(SegmentElement::TimeSig(_)), SegmentElement::TimeSig(new)) => {
                    if let Some(SegmentElement::TimeSig(t)) = self.score.measure_mut(mmr).and_then(|x| {
                        let s = x.find_segment(ty, tick)?;
                        x.segments[s].element_mut(track)
                    }) {
                        t.sig = new.sig;
                        t.stretch = new.stretch;
                    }
                }
                (Some(SegmentElement::Ambitus(_)), SegmentElement::Ambitus(new)) => {
                    if let Some(SegmentElement::Ambitus(a)) = self.score.measure_mut(mmr).and_then(|x| {
                        let s = x.find_segment(ty, tick)?;
                        x.segments[s].element_mut(track)
                    }) {
                        *a = new;
                    }
                }
                _ => {}
            }
        }
    }

    /// One measure rest per staff spanning the whole run.
    fn add_mm_rests(&mut self, mmr: MeasureId, tick: i32, len: Fraction) {
        for staff_idx in 0..self.score.nstaves() {
            let track = staff_idx * VOICES;
            let existing = self.score.measure(mmr).and_then(|x| {
                let s = x.find_segment(SegmentType::ChordRest, tick)?;
                x.segments[s].cr(track)
            });
            match existing {
                Some(id) => self.score.cr_mut(id).ticks = len.ticks(),
                None => {
                    let mut rest = ChordRest::new(
                        mmr,
                        track,
                        tick,
                        TDuration::new(DurationType::Measure),
                        ChordRestKind::Rest(Rest::default()),
                    );
                    rest.ticks = len.ticks();
                    let id = self.score.add_chord_rest(rest);
                    self.add_element(mmr, SegmentType::ChordRest, tick, track, SegmentElement::ChordRest(id));
                }
            }
        }
        if let Some(x) = self.score.measure_mut(mmr) {
            x.update_segment_ticks();
        }
    }

    /// Carry the tolerated annotations of the first measure over to the
    /// substitute (one per kind and track) and drop stale ones.
    fn merge_mm_rest_annotations(&mut self, first: &Measure, mmr: MeasureId) {
        let at = SegmentRef::new(mmr, SegmentType::ChordRest, first.tick);
        let source: Vec<_> = first
            .find_segment(SegmentType::ChordRest, first.tick)
            .map(|s| first.segments[s].annotations.iter().filter(|a| a.kind.is_mm_rest_compatible()).cloned().collect())
            .unwrap_or_default();
        let current = |layout: &Self| -> Vec<Annotation> {
            layout
                .score
                .measure(mmr)
                .and_then(|x| x.find_segment(SegmentType::ChordRest, first.tick).map(|s| x.segments[s].annotations.clone()))
                .unwrap_or_default()
        };

        for a in &source {
            let present = current(self).iter().any(|b| b.kind.same_kind(&a.kind) && b.track == a.track);
            if !present {
                self.change(Change::AddAnnotation { at, annotation: a.clone() });
            }
        }
        for b in current(self) {
            if !b.kind.is_mm_rest_compatible() {
                continue;
            }
            let kept = source.iter().any(|a| a.kind.same_kind(&b.kind) && a.track == b.track);
            if !kept {
                self.change(Change::RemoveAnnotation { at, annotation: b });
            }
        }
    }
}

/// Slots of the segment `(ty, tick)` of a measure, `None` when absent.
fn elements_of(m: &Measure, ty: SegmentType, tick: i32) -> Option<Vec<Option<SegmentElement>>> {
    m.find_segment(ty, tick).map(|s| m.segments[s].elements.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::StandardGlyphs;
    use crate::model::{ClefType, Score, ScoreBuilder};
    use crate::style::Style;
    use crate::undo::DiscardLog;

    fn keyed_measure(key: Option<i32>) -> (Score, MeasureId) {
        let mut b = ScoreBuilder::new(Style::default());
        b.add_staff(0, ClefType::G);
        let m = b.add_measure(Fraction::new(4, 4));
        if let Some(key) = key {
            b.set_key(m, 0, key);
        }
        (b.build(), m)
    }

    fn has_segment(score: &Score, m: MeasureId, ty: SegmentType) -> bool {
        score.measure(m).is_some_and(|x| x.find_segment(ty, 0).is_some())
    }

    #[test]
    fn occupied_key_signature_segment_survives_a_missing_source() {
        let (mut score, m) = keyed_measure(Some(2));
        let mut log = DiscardLog;
        Layout::new(&mut score, &StandardGlyphs, &mut log).sync_segment(m, SegmentType::KeySig, 0, None);
        assert!(has_segment(&score, m, SegmentType::KeySig));
    }

    #[test]
    fn empty_key_signature_segment_is_removed() {
        let (mut score, m) = keyed_measure(None);
        if let Some(x) = score.measure_mut(m) {
            x.get_segment(SegmentType::KeySig, 0);
        }
        let mut log = DiscardLog;
        Layout::new(&mut score, &StandardGlyphs, &mut log).sync_segment(m, SegmentType::KeySig, 0, None);
        assert!(!has_segment(&score, m, SegmentType::KeySig));
    }

    #[test]
    fn time_signature_segment_follows_its_source() {
        let (mut score, m) = keyed_measure(None);
        assert!(has_segment(&score, m, SegmentType::TimeSig));
        let mut log = DiscardLog;
        Layout::new(&mut score, &StandardGlyphs, &mut log).sync_segment(m, SegmentType::TimeSig, 0, None);
        assert!(!has_segment(&score, m, SegmentType::TimeSig));
    }
}
