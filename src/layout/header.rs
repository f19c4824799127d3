//! System header and trailer.
//!
//! The first measure of a system carries generated clefs, key signatures
//! and a systemic start barline; the last one may carry courtesy time and
//! key signatures announcing the next system. Every such element is added
//! or removed through a [`Change`](crate::undo::Change). This module also
//! sizes the non-chord elements of a segment.

use log::debug;

use super::Layout;
use crate::glyphs::SymId;
use crate::model::{
    BarLine, BarLineType, Clef, ClefType, Fraction, KeySig, KeySigEvent, LayoutMode, MeasureId, SegmentElement,
    SegmentType, TimeSig, VOICES,
};
use crate::shape::Rect;

/// Staff positions (half spaces from the top line, treble clef) of the
/// sharps and flats of a key signature, in writing order.
const SHARP_LINES: [i32; 7] = [0, 3, -1, 2, 5, 1, 4];
const FLAT_LINES: [i32; 7] = [4, 1, 5, 2, 6, 3, 7];

fn key_line_offset(clef: ClefType) -> i32 {
    match clef {
        ClefType::G | ClefType::G8vb | ClefType::G8va | ClefType::Percussion => 0,
        ClefType::F | ClefType::F8vb => 2,
        ClefType::C3 => 1,
        ClefType::C4 => -1,
    }
}

/// Naturals cancelling `prev` when the key changes to `key`.
fn naturals_for(prev: i32, key: i32) -> u32 {
    if prev == 0 || prev == key {
        return 0;
    }
    if key == 0 || prev.signum() != key.signum() {
        prev.unsigned_abs()
    } else if key.abs() < prev.abs() {
        (prev.abs() - key.abs()) as u32
    } else {
        0
    }
}

impl Layout<'_> {
    // ── element boxes ──

    fn staff_mag(&self, staff_idx: usize) -> f64 {
        self.score.staves.get(staff_idx).map_or(1.0, |s| s.mag)
    }

    fn staff_height(&self, staff_idx: usize) -> f64 {
        self.score.staves.get(staff_idx).map_or(4.0, |s| s.height_sp()) * self.score.spatium()
    }

    fn clef_bbox(&self, clef: &Clef, staff_idx: usize) -> Rect {
        let mut scale = self.staff_spatium(staff_idx);
        if clef.small {
            scale *= self.score.style.small_clef_mag;
        }
        let y = f64::from(clef.ty.line()) * 0.5 * self.staff_spatium(staff_idx);
        self.glyphs.bbox(clef.ty.sym(), scale).translated(0.0, y)
    }

    /// Box of a key signature with `naturals` cancellation signs in front.
    pub(super) fn keysig_bbox(&self, event: KeySigEvent, naturals: u32, staff_idx: usize, tick: i32) -> Rect {
        let sp = self.staff_spatium(staff_idx);
        let clef = self.score.staves.get(staff_idx).map_or(ClefType::G, |s| s.clef(tick));
        let offset = key_line_offset(clef);
        let gap = self.score.style.p(self.score.style.accidental_distance) * self.staff_mag(staff_idx);

        let prev = if naturals > 0 { self.score.staves.get(staff_idx).map_or(0, |s| s.key(tick - 1).key) } else { 0 };
        let mut signs: Vec<(SymId, i32)> = Vec::new();
        let natural_lines = if prev > 0 { &SHARP_LINES } else { &FLAT_LINES };
        let skip = if prev.signum() == event.key.signum() { event.key.unsigned_abs() as usize } else { 0 };
        for &line in natural_lines.iter().skip(skip).take(naturals as usize) {
            signs.push((SymId::AccidentalNatural, line));
        }
        let (sym, lines) =
            if event.key > 0 { (SymId::AccidentalSharp, &SHARP_LINES) } else { (SymId::AccidentalFlat, &FLAT_LINES) };
        for &line in lines.iter().take(event.key.unsigned_abs() as usize) {
            signs.push((sym, line));
        }

        let mut bbox = Rect::default();
        let mut x = 0.0;
        for (sym, line) in signs {
            let r = self.glyphs.bbox(sym, sp);
            bbox = bbox.united(&r.translated(x, f64::from(line + offset) * 0.5 * sp));
            x += r.width + gap;
        }
        bbox
    }

    /// Naturals shown by an authored key change; generated signatures
    /// never cancel.
    fn keysig_naturals(&self, staff_idx: usize, tick: i32, ks: &KeySig) -> u32 {
        if ks.generated || ks.event.custom || tick == 0 {
            return 0;
        }
        let prev = self.score.staves.get(staff_idx).map_or(0, |s| s.key(tick - 1).key);
        naturals_for(prev, ks.event.key)
    }

    pub(super) fn timesig_bbox(&self, sig: Fraction, staff_idx: usize) -> Rect {
        let sp = self.staff_spatium(staff_idx);
        let row = |n: i32| -> f64 {
            super::chordrest::digits(n).into_iter().map(|d| self.glyphs.width(SymId::TimeSig(d), sp)).sum()
        };
        let width = row(sig.numerator).max(row(sig.denominator));
        Rect::new(0.0, 0.0, width, self.staff_height(staff_idx))
    }

    fn barline_bbox(&self, ty: BarLineType, staff_idx: usize) -> Rect {
        let style = &self.score.style;
        let mag = self.staff_mag(staff_idx);
        let bw = style.p(style.barline_width) * mag;
        let ebw = style.p(style.end_barline_width) * mag;
        let d = style.p(style.end_barline_distance) * mag;
        let dd = style.p(style.double_barline_distance) * mag;
        let dots = style.p(style.repeat_barline_dot_separation) * mag
            + self.glyphs.width(SymId::RepeatDot, self.staff_spatium(staff_idx));
        let width = match ty {
            BarLineType::Normal | BarLineType::Broken | BarLineType::Dotted => bw,
            BarLineType::Double => 2.0 * bw + dd,
            BarLineType::End => bw + d + ebw,
            BarLineType::StartRepeat | BarLineType::EndRepeat => dots + bw + d + ebw,
            BarLineType::EndStartRepeat => 2.0 * (dots + bw + d) + ebw,
        };
        Rect::new(0.0, 0.0, width, self.staff_height(staff_idx))
    }

    /// Size every non chord/rest element of a segment.
    pub(super) fn layout_segment_elements(&mut self, mid: MeasureId, sidx: usize) {
        let Some(seg) = self.score.measure(mid).and_then(|m| m.segments.get(sidx)) else {
            return;
        };
        let tick = seg.tick;
        let mut boxes: Vec<(usize, Rect, u32)> = Vec::new();
        for (track, e) in seg.elements.iter().enumerate() {
            let Some(e) = e else {
                continue;
            };
            let staff_idx = track / VOICES;
            let sp = self.staff_spatium(staff_idx);
            let (bbox, naturals) = match e {
                SegmentElement::ChordRest(_) => continue,
                SegmentElement::Clef(c) => (self.clef_bbox(c, staff_idx), 0),
                SegmentElement::KeySig(k) => {
                    let naturals = self.keysig_naturals(staff_idx, tick, k);
                    (self.keysig_bbox(k.event, naturals, staff_idx, tick), naturals)
                }
                SegmentElement::TimeSig(t) => (self.timesig_bbox(t.sig, staff_idx), 0),
                SegmentElement::BarLine(b) => (self.barline_bbox(b.ty, staff_idx), 0),
                SegmentElement::Breath(_) => (self.glyphs.bbox(SymId::BreathMarkComma, sp).translated(0.0, -sp), 0),
                SegmentElement::Ambitus(a) => {
                    let top = f64::from(a.top_line) * 0.5 * sp;
                    let bottom = f64::from(a.bottom_line) * 0.5 * sp;
                    let w = self.glyphs.width(SymId::NoteheadBlack, sp);
                    (Rect::new(0.0, top - 0.5 * sp, w, bottom - top + sp), 0)
                }
            };
            boxes.push((track, bbox, naturals));
        }
        let Some(seg) = self.score.measure_mut(mid).and_then(|m| m.segments.get_mut(sidx)) else {
            return;
        };
        for (track, bbox, naturals) in boxes {
            match seg.element_mut(track) {
                Some(SegmentElement::Clef(c)) => c.bbox = bbox,
                Some(SegmentElement::KeySig(k)) => {
                    k.bbox = bbox;
                    k.naturals = naturals;
                }
                Some(SegmentElement::TimeSig(t)) => t.bbox = bbox,
                Some(SegmentElement::BarLine(b)) => b.bbox = bbox,
                Some(SegmentElement::Breath(b)) => b.bbox = bbox,
                Some(SegmentElement::Ambitus(a)) => a.bbox = bbox,
                _ => {}
            }
        }
    }

    /// Size the elements of a segment and rebuild its shapes.
    fn relayout_segment(&mut self, mid: MeasureId, ty: SegmentType, tick: i32) {
        let Some(sidx) = self.score.measure(mid).and_then(|m| m.find_segment(ty, tick)) else {
            return;
        };
        self.layout_segment_elements(mid, sidx);
        for staff_idx in 0..self.score.nstaves() {
            self.create_shape(mid, sidx, staff_idx);
        }
    }

    fn element_at(&self, mid: MeasureId, ty: SegmentType, tick: i32, track: usize) -> Option<&SegmentElement> {
        let m = self.score.measure(mid)?;
        m.segments.get(m.find_segment(ty, tick)?)?.element(track)
    }

    // ── header ──

    /// Give the first measure of a system its clefs, key signatures and
    /// start barline.
    pub(super) fn add_system_header(&mut self, mid: MeasureId, is_first_system: bool) {
        let Some(m) = self.score.measure(mid) else {
            return;
        };
        let tick = m.tick;
        let system = m.system;
        let prev = self.score.prev_measure(mid);
        let style = &self.score.style;
        let (gen_keysig, gen_clef) = (style.gen_keysig, style.gen_clef);

        for staff_idx in 0..self.score.nstaves() {
            let shown = system
                .and_then(|s| self.score.system(s).staves.get(staff_idx))
                .map_or(true, |s| s.show);
            if !shown {
                continue;
            }
            let strack = staff_idx * VOICES;
            let Some(staff) = self.score.staves.get(staff_idx) else {
                continue;
            };
            let key = staff.key(tick);
            let clef_ty = staff.clef(tick);

            let has_keysig = matches!(self.element_at(mid, SegmentType::KeySig, tick, strack), Some(SegmentElement::KeySig(_)));
            let keysig_generated = match self.element_at(mid, SegmentType::KeySig, tick, strack) {
                Some(SegmentElement::KeySig(k)) => k.generated,
                _ => true,
            };
            if let Some(SegmentElement::Clef(c)) = self.score.measure_mut(mid).and_then(|m| {
                let s = m.find_segment(SegmentType::Clef, tick)?;
                m.segments[s].element_mut(strack)
            }) {
                c.small = false;
            }

            let mut need_keysig = is_first_system || gen_keysig;

            // a courtesy C major announcement already shows the change
            if need_keysig && key.key == 0 {
                let announce_tick = tick;
                let announced = prev.is_some_and(|pm| {
                    self.score.measure(pm).is_some_and(|p| p.has_courtesy_keysig)
                        && self.element_at(pm, SegmentType::KeySigAnnounce, announce_tick, strack).is_some()
                });
                if let (true, Some(pm)) = (announced, prev) {
                    need_keysig = false;
                    if has_keysig {
                        if let Some(SegmentElement::KeySig(k)) = self.score.measure_mut(pm).and_then(|p| {
                            let s = p.find_segment(SegmentType::KeySigAnnounce, announce_tick)?;
                            p.segments[s].element_mut(strack)
                        }) {
                            k.generated = false;
                        }
                        if let Some(SegmentElement::KeySig(k)) = self.score.measure_mut(mid).and_then(|m| {
                            let s = m.find_segment(SegmentType::KeySig, tick)?;
                            m.segments[s].element_mut(strack)
                        }) {
                            k.generated = true;
                        }
                    }
                }
            }
            need_keysig = need_keysig && (key.key != 0 || key.custom || key.atonal);
            need_keysig = need_keysig || (has_keysig && !keysig_generated);

            if need_keysig {
                match self.element_at(mid, SegmentType::KeySig, tick, strack) {
                    Some(SegmentElement::KeySig(k)) if k.event != key => {
                        let old = k.event;
                        let at = crate::undo::SegmentRef::new(mid, SegmentType::KeySig, tick);
                        self.change(crate::undo::Change::ChangeKeySig { at, track: strack, event: key, old });
                    }
                    Some(_) => {}
                    None => {
                        let ks = SegmentElement::KeySig(KeySig::new(key, true));
                        self.add_element(mid, SegmentType::KeySig, tick, strack, ks);
                    }
                }
            } else if has_keysig {
                self.remove_element(mid, SegmentType::KeySig, tick, strack);
            }

            let show_clef = is_first_system || gen_clef;
            let clef = match self.element_at(mid, SegmentType::Clef, tick, strack) {
                Some(SegmentElement::Clef(c)) => Some(c.ty),
                _ => None,
            };
            if show_clef {
                match clef {
                    None => {
                        let c = SegmentElement::Clef(Clef::new(clef_ty, true));
                        self.add_element(mid, SegmentType::Clef, tick, strack, c);
                    }
                    Some(old) if old != clef_ty => {
                        let at = crate::undo::SegmentRef::new(mid, SegmentType::Clef, tick);
                        self.change(crate::undo::Change::ChangeClefType { at, track: strack, ty: clef_ty, old });
                    }
                    Some(_) => {}
                }
            } else if clef.is_some() {
                self.remove_element(mid, SegmentType::Clef, tick, strack);
            }
        }

        self.set_start_repeat_barline(mid);

        let n = self.score.nstaves();
        let style = &self.score.style;
        let want_begin = (n > 1 && style.start_barline_multiple) || (n == 1 && style.start_barline_single);
        let has_begin = self.element_at(mid, SegmentType::BeginBarLine, tick, 0).is_some();
        if want_begin && !has_begin {
            let bl = SegmentElement::BarLine(BarLine::new(BarLineType::Normal, true));
            self.add_element(mid, SegmentType::BeginBarLine, tick, 0, bl);
        } else if !want_begin && has_begin {
            self.remove_element(mid, SegmentType::BeginBarLine, tick, 0);
        }

        for ty in [SegmentType::BeginBarLine, SegmentType::Clef, SegmentType::KeySig, SegmentType::StartRepeatBarLine] {
            self.relayout_segment(mid, ty, tick);
        }
        if let Some(m) = self.score.measure_mut(mid) {
            m.has_system_header = true;
        }
    }

    /// Start repeat barlines follow the measure's repeat flag.
    fn set_start_repeat_barline(&mut self, mid: MeasureId) {
        let Some(m) = self.score.measure(mid) else {
            return;
        };
        let (tick, repeat) = (m.tick, m.repeat_start);
        for staff_idx in 0..self.score.nstaves() {
            let track = staff_idx * VOICES;
            let existing = match self.element_at(mid, SegmentType::StartRepeatBarLine, tick, track) {
                Some(SegmentElement::BarLine(b)) => Some(b.generated),
                _ => None,
            };
            match (repeat, existing) {
                (true, None) => {
                    let bl = SegmentElement::BarLine(BarLine::new(BarLineType::StartRepeat, true));
                    self.add_element(mid, SegmentType::StartRepeatBarLine, tick, track, bl);
                }
                (false, Some(true)) => self.remove_element(mid, SegmentType::StartRepeatBarLine, tick, track),
                _ => {}
            }
        }
    }

    /// Drop the generated header of a measure that no longer opens a system.
    pub(super) fn remove_system_header(&mut self, mid: MeasureId) {
        let Some(m) = self.score.measure(mid) else {
            return;
        };
        if !m.has_system_header {
            return;
        }
        let tick = m.tick;
        let mut generated = Vec::new();
        for seg in m.segments.iter().filter(|s| s.tick == tick) {
            if matches!(seg.ty, SegmentType::BeginBarLine | SegmentType::Clef | SegmentType::KeySig) {
                for (track, e) in seg.elements.iter().enumerate() {
                    if e.as_ref().is_some_and(|e| e.generated()) {
                        generated.push((seg.ty, track));
                    }
                }
            }
        }
        for (ty, track) in generated {
            self.remove_element(mid, ty, tick, track);
        }
        if let Some(m) = self.score.measure_mut(mid) {
            m.has_system_header = false;
        }
    }

    // ── trailer ──

    /// Width the courtesy signatures would need if `mid` ended a system,
    /// and whether they are already present.
    pub(super) fn cautionary_width(&mut self, mid: MeasureId) -> (f64, bool) {
        let mut has_courtesy = false;
        let Some(m) = self.score.measure(mid) else {
            return (0.0, false);
        };
        let Some(nm) = self.score.next_measure(mid) else {
            return (0.0, false);
        };
        if m.section_break.is_some() && self.score.layout_mode != LayoutMode::Float {
            return (0.0, false);
        }
        let tick = m.end_tick();
        let style = &self.score.style;

        let mut w = 0.0;
        if style.gen_courtesy_timesig {
            if let Some(SegmentElement::TimeSig(ts)) = self.element_at(nm, SegmentType::TimeSig, tick, 0) {
                if ts.show_courtesy {
                    let left_margin = style.p(style.timesig_left_margin);
                    w = match self.element_at(mid, SegmentType::TimeSigAnnounce, tick, 0) {
                        Some(e) => {
                            has_courtesy = true;
                            e.bbox().map_or(0.0, |r| r.width) + left_margin
                        }
                        None => self.timesig_bbox(ts.sig, 0).width + left_margin,
                    };
                }
            }
        }

        let mut ww_max = 0.0_f64;
        if style.gen_courtesy_keysig {
            let left_margin = style.p(style.keysig_left_margin);
            for staff_idx in 0..self.score.nstaves() {
                let track = staff_idx * VOICES;
                let Some(SegmentElement::KeySig(nks)) = self.element_at(nm, SegmentType::KeySig, tick, track) else {
                    continue;
                };
                if !nks.show_courtesy || nks.generated {
                    continue;
                }
                let width = match self.element_at(mid, SegmentType::KeySigAnnounce, tick, track) {
                    Some(e) => {
                        has_courtesy = true;
                        e.bbox().map_or(0.0, |r| r.width)
                    }
                    None => self.keysig_bbox(nks.event, 0, staff_idx, tick).width,
                };
                ww_max = ww_max.max(width + left_margin);
            }
        }
        (w + ww_max, has_courtesy)
    }

    /// Courtesy signatures at the end of the last measure of a system and
    /// visibility of a trailing clef change. Returns true when the measure
    /// now carries a trailer.
    pub(super) fn add_system_trailer(&mut self, mid: MeasureId) -> bool {
        let Some(m) = self.score.measure(mid) else {
            return false;
        };
        let Some(nm) = self.score.next_measure(mid) else {
            return false;
        };
        let tick = m.end_tick();
        let final_of_section = m.section_break.is_some();
        let repeat_end = m.repeat_end;
        let float = self.score.layout_mode == LayoutMode::Float;
        let style = &self.score.style;
        let (gen_ts, gen_ks, gen_clef) = (style.gen_courtesy_timesig, style.gen_courtesy_keysig, style.gen_courtesy_clef);
        let mut trailer = false;

        // time signatures
        let next_ts = match self.element_at(nm, SegmentType::TimeSig, tick, 0) {
            Some(SegmentElement::TimeSig(ts)) => Some(ts.show_courtesy),
            _ => None,
        };
        let show_ts = next_ts == Some(true) && gen_ts && !(final_of_section && !float);
        if show_ts {
            trailer = true;
            for staff_idx in 0..self.score.nstaves() {
                let track = staff_idx * VOICES;
                let Some(SegmentElement::TimeSig(nts)) = self.element_at(nm, SegmentType::TimeSig, tick, track) else {
                    continue;
                };
                let mut courtesy = TimeSig::new(nts.sig, true);
                courtesy.stretch = nts.stretch;
                let same = matches!(
                    self.element_at(mid, SegmentType::TimeSigAnnounce, tick, track),
                    Some(SegmentElement::TimeSig(t)) if t.sig.identical(&courtesy.sig)
                );
                if !same {
                    self.remove_element(mid, SegmentType::TimeSigAnnounce, tick, track);
                    self.add_element(mid, SegmentType::TimeSigAnnounce, tick, track, SegmentElement::TimeSig(courtesy));
                }
            }
            self.relayout_segment(mid, SegmentType::TimeSigAnnounce, tick);
        } else {
            self.remove_segment(mid, SegmentType::TimeSigAnnounce, tick);
        }

        // key signatures
        let show_ks = gen_ks
            && !(final_of_section && !float)
            && (0..self.score.nstaves()).any(|staff_idx| {
                matches!(
                    self.element_at(nm, SegmentType::KeySig, tick, staff_idx * VOICES),
                    Some(SegmentElement::KeySig(k)) if k.show_courtesy && !k.generated
                )
            });
        if let Some(m) = self.score.measure_mut(mid) {
            m.has_courtesy_keysig = show_ks;
        }
        for staff_idx in 0..self.score.nstaves() {
            let track = staff_idx * VOICES;
            if show_ks {
                trailer = true;
                let key2 = self.score.staves[staff_idx].key(tick);
                match self.element_at(mid, SegmentType::KeySigAnnounce, tick, track) {
                    Some(SegmentElement::KeySig(k)) if k.event != key2 => {
                        let old = k.event;
                        let at = crate::undo::SegmentRef::new(mid, SegmentType::KeySigAnnounce, tick);
                        self.change(crate::undo::Change::ChangeKeySig { at, track, event: key2, old });
                    }
                    Some(_) => {}
                    None => {
                        let ks = SegmentElement::KeySig(KeySig::new(key2, true));
                        self.add_element(mid, SegmentType::KeySigAnnounce, tick, track, ks);
                    }
                }
            } else {
                self.remove_element(mid, SegmentType::KeySigAnnounce, tick, track);
            }

            let hide_clef = !gen_clef || repeat_end || final_of_section;
            if let Some(SegmentElement::Clef(c)) = self.score.measure_mut(mid).and_then(|m| {
                let s = m.find_segment(SegmentType::Clef, tick)?;
                m.segments[s].element_mut(track)
            }) {
                c.visible = !(hide_clef || !c.show_courtesy);
            }
        }
        if show_ks {
            self.relayout_segment(mid, SegmentType::KeySigAnnounce, tick);
        }
        self.relayout_segment(mid, SegmentType::Clef, tick);

        if let Some(m) = self.score.measure_mut(mid) {
            m.has_system_trailer = trailer;
        }
        trailer
    }

    /// Take back the courtesy signatures of a measure that no longer ends
    /// a system; trailing clef changes become visible again.
    pub(super) fn remove_system_trailer(&mut self, mid: MeasureId) {
        let Some(m) = self.score.measure(mid) else {
            return;
        };
        let tick = m.end_tick();
        let had_trailer = m.has_system_trailer;
        let hidden_clef = m
            .find_segment(SegmentType::Clef, tick)
            .is_some_and(|s| m.segments[s].elements.iter().flatten().any(|e| matches!(e, SegmentElement::Clef(c) if !c.visible)));
        if !had_trailer && !hidden_clef {
            return;
        }
        if had_trailer {
            debug!("removing courtesy signatures at tick {tick}");
            self.remove_segment(mid, SegmentType::TimeSigAnnounce, tick);
            self.remove_segment(mid, SegmentType::KeySigAnnounce, tick);
        }
        if let Some(m) = self.score.measure_mut(mid) {
            m.has_system_trailer = false;
            m.has_courtesy_keysig = false;
            if let Some(s) = m.find_segment(SegmentType::Clef, tick) {
                for e in m.segments[s].elements.iter_mut().flatten() {
                    if let SegmentElement::Clef(c) = e {
                        c.visible = true;
                    }
                }
            }
        }
        self.relayout_segment(mid, SegmentType::Clef, tick);
    }

    // ── end barlines ──

    /// Make sure the measure ends with the barline its repeat flags and
    /// position call for. Returns how much wider the measure got.
    pub(super) fn create_end_barlines(&mut self, mid: MeasureId, is_last_in_system: bool) -> f64 {
        let Some(m) = self.score.measure(mid) else {
            return 0.0;
        };
        let tick = m.end_tick();
        let repeat_end = m.repeat_end;
        let next = self.score.next_measure(mid);
        let next_repeat_start = next.and_then(|n| self.score.measure(n)).is_some_and(|n| n.repeat_start);
        let old_width = m.end_barline_segment().map_or(0.0, |s| m.segments[s].width);
        let had_segment = m.end_barline_segment().is_some();

        let merged = repeat_end && next_repeat_start && !is_last_in_system;
        let wanted = if repeat_end {
            if merged {
                BarLineType::EndStartRepeat
            } else {
                BarLineType::EndRepeat
            }
        } else if next.is_none() {
            BarLineType::End
        } else {
            BarLineType::Normal
        };

        for staff_idx in 0..self.score.nstaves() {
            let track = staff_idx * VOICES;
            match self.element_at(mid, SegmentType::EndBarLine, tick, track) {
                None => {
                    let bl = SegmentElement::BarLine(BarLine::new(wanted, true));
                    self.add_element(mid, SegmentType::EndBarLine, tick, track, bl);
                }
                Some(SegmentElement::BarLine(b)) if b.ty != wanted && (b.generated || repeat_end) => {
                    let (old, old_generated) = (b.ty, b.generated);
                    let at = crate::undo::SegmentRef::new(mid, SegmentType::EndBarLine, tick);
                    self.change(crate::undo::Change::ChangeBarLineType {
                        at,
                        track,
                        ty: wanted,
                        old,
                        generated: true,
                        old_generated,
                    });
                }
                Some(_) => {}
            }
        }

        // the next measure's start repeat is drawn by the merged barline
        if let Some(nm) = next {
            if let Some(n) = self.score.measure_mut(nm) {
                let t = n.tick;
                if let Some(s) = n.find_segment(SegmentType::StartRepeatBarLine, t) {
                    n.segments[s].enabled = !merged;
                }
            }
        }

        self.relayout_segment(mid, SegmentType::EndBarLine, tick);
        let Some(m) = self.score.measure_mut(mid) else {
            return 0.0;
        };
        let Some(s) = m.end_barline_segment() else {
            return 0.0;
        };
        let new_width = m.segments[s].min_right();
        if !had_segment {
            // a fresh segment sits at the current end of the measure
            m.segments[s].x = m.width;
        }
        m.segments[s].width = new_width;
        let delta = new_width - old_width;
        m.width += delta;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naturals_cancel_the_previous_key() {
        assert_eq!(naturals_for(3, 0), 3);
        assert_eq!(naturals_for(3, 1), 2);
        assert_eq!(naturals_for(2, -1), 2);
        assert_eq!(naturals_for(1, 4), 0);
        assert_eq!(naturals_for(0, -3), 0);
    }
}
