//! Advancing the measure cursor of a layout pass and preparing each
//! measure when the cursor reaches it.

use log::debug;

use super::{Layout, LayoutContext};
use crate::model::{
    Fraction, LayoutMode, MeasureId, Score, SegmentElement, SegmentType, SigEvent, DEFAULT_TEMPO, VOICES,
};
use crate::undo::Change;

impl LayoutContext {
    /// Number the measure and advance the running count. Returns the
    /// number the next measure would get.
    pub(super) fn adjust_measure_no(&mut self, score: &mut Score, id: MeasureId) -> i32 {
        let (no_offset, irregular, section_break) = match score.measure(id) {
            Some(m) => (m.no_offset, m.irregular, m.section_break.is_some()),
            None => (0, true, score.mb(id).section_break().is_some()),
        };
        self.measure_no += no_offset;
        if let Some(m) = score.measure_mut(id) {
            m.no = self.measure_no;
        }
        if !irregular {
            self.measure_no += 1;
        }
        if section_break {
            self.measure_no = 0;
        }
        self.measure_no
    }
}

impl Layout<'_> {
    /// Move the cursor one item forward and prepare the new current item.
    pub(super) fn get_next_measure(&mut self, lc: &mut LayoutContext) {
        lc.prev_measure = lc.cur_measure;
        lc.cur_measure = lc.next_measure;
        lc.next_measure = match lc.cur_measure {
            None if self.score.show_vbox => self.score.first,
            None => self.score.first_measure(),
            Some(cur) => self.score.next_layout_item(cur),
        };
        let Some(mut cur) = lc.cur_measure else {
            return;
        };

        let mno = lc.adjust_measure_no(self.score, cur);

        if self.score.layout_mode == LayoutMode::Line {
            while self.score.mb(cur).is_vbox_like() {
                let Some(next) = lc.next_measure else {
                    lc.cur_measure = None;
                    return;
                };
                cur = next;
                lc.cur_measure = Some(cur);
                lc.next_measure = self.score.mb(cur).next();
            }
        } else if self.score.is_measure(cur) && self.score.style.create_multi_measure_rests {
            cur = self.collect_mm_rest(lc, cur, mno);
        } else if let Some(m) = self.score.measure(cur).filter(|m| m.is_mm_rest()) {
            debug!("mmrest: no {} += {}", lc.measure_no, m.mm_rest_count);
            lc.measure_no += m.mm_rest_count - 1;
        }

        if !self.score.is_measure(cur) {
            self.score.mb_mut(cur).set_tick(lc.tick);
            return;
        }
        self.prepare_measure(lc, cur);
    }

    /// Gather the run of empty measures starting at `m` into a substitute
    /// when it is long enough. Returns the item the cursor now stands on.
    fn collect_mm_rest(&mut self, lc: &mut LayoutContext, m: MeasureId, mno: i32) -> MeasureId {
        let Some(start_no) = self.score.measure(m).map(|x| x.no) else {
            return m;
        };
        lc.measure_no = start_no;
        let mut nm = m;
        let mut lm = m;
        let mut n = 0_usize;
        let mut len = Fraction::new(0, 1);
        while self.valid_mm_rest_measure(nm) {
            let next = self.score.next_layout_item(nm);
            if n > 0 && self.break_multi_measure_rest(nm) {
                break;
            }
            lc.adjust_measure_no(self.score, nm);
            n += 1;
            if let Some(x) = self.score.measure(nm) {
                len = len + x.len;
            }
            lm = nm;
            match next {
                Some(id) if self.score.is_measure(id) => nm = id,
                _ => break,
            }
        }

        if n >= self.score.style.min_empty_measures.max(1) {
            self.create_mm_rest(m, lm, len);
            if let Some(mmr) = self.score.measure(m).and_then(|x| x.mm_rest) {
                lc.cur_measure = Some(mmr);
                lc.next_measure = self.score.next_layout_item(lm);
                return mmr;
            }
            return m;
        }
        if let Some(old) = self.score.measure(m).and_then(|x| x.mm_rest) {
            self.change(Change::ChangeMMRest { measure: m, mm_rest: None, old: Some(old) });
        }
        if let Some(x) = self.score.measure_mut(m) {
            x.mm_rest_count = 0;
        }
        lc.measure_no = mno;
        m
    }

    /// Shift a measure and everything in it to start at `tick`.
    fn move_ticks(&mut self, mid: MeasureId, tick: i32) {
        let Some(m) = self.score.measure_mut(mid) else {
            return;
        };
        let diff = tick - m.tick;
        if diff == 0 {
            return;
        }
        m.tick = tick;
        let mut crs = Vec::new();
        for s in &mut m.segments {
            s.tick += diff;
            crs.extend(s.elements.iter().flatten().filter_map(|e| e.cr()));
        }
        for id in crs {
            let graces = self.score.cr(id).chord().map(|c| c.grace_notes.clone()).unwrap_or_default();
            for g in graces.into_iter().chain(std::iter::once(id)) {
                self.score.cr_mut(g).tick += diff;
            }
        }
    }

    /// Per-measure work done when the cursor reaches a measure: ticks,
    /// tempo and signature maps, stems, beams, chord layout and shapes.
    fn prepare_measure(&mut self, lc: &mut LayoutContext, mid: MeasureId) {
        self.move_ticks(mid, lc.tick);
        let Some(m) = self.score.measure(mid) else {
            return;
        };
        let (tick, ticks, len, timesig, no) = (m.tick, m.ticks(), m.len, m.timesig, m.no);
        let section_pause = m.section_break.as_ref().map_or(0.0, |b| b.pause);

        if lc.prev_measure.is_none() {
            lc.sig = len;
            self.score.tempo_map.clear();
            self.score.tempo_map.set_tempo(0, DEFAULT_TEMPO);
            self.score.sig_map.clear();
            self.score.sig_map.add(0, SigEvent { timesig: len, nominal: timesig, bar: 0 });
        }
        if section_pause != 0.0 {
            self.score.tempo_map.set_pause(tick + ticks, section_pause);
        }

        let nsegs = self.score.measure(mid).map_or(0, |m| m.segments.len());
        for sidx in 0..nsegs {
            self.layout_segment_elements(mid, sidx);
        }
        for staff_idx in 0..self.score.nstaves() {
            let voices = self.has_voices(mid, staff_idx);
            let crs: Vec<_> = self
                .score
                .measure(mid)
                .map(|m| {
                    m.chord_rest_segments()
                        .flat_map(|s| s.elements.iter().skip(staff_idx * VOICES).take(VOICES))
                        .flatten()
                        .filter_map(|e| e.cr())
                        .collect()
                })
                .unwrap_or_default();
            for id in crs {
                self.prepare_chord_rest(id, voices);
            }
        }

        self.create_beams(mid);

        for sidx in 0..nsegs {
            self.layout_segment_chords(mid, sidx);
        }

        for sidx in 0..nsegs {
            let Some(seg) = self.score.measure(mid).map(|m| &m.segments[sidx]) else {
                continue;
            };
            match seg.ty {
                SegmentType::Breath => {
                    let pause = seg
                        .elements
                        .iter()
                        .flatten()
                        .filter_map(|e| match e {
                            SegmentElement::Breath(b) => Some(b.pause),
                            _ => None,
                        })
                        .fold(0.0_f64, f64::max);
                    if pause != 0.0 {
                        let t = seg.tick;
                        self.score.tempo_map.set_pause(t, pause);
                    }
                }
                SegmentType::ChordRest => {
                    self.layout_segment_annotations(mid, sidx);
                    self.apply_time_stretch(mid, sidx);
                }
                _ => {}
            }
        }

        // a new event when the length differs from the running signature
        // (even 4/4 against 2/2) or the nominal signature changed
        let prev_timesig = lc.prev_measure.and_then(|p| self.score.measure(p)).map(|p| p.timesig);
        if !len.identical(&lc.sig) || prev_timesig.is_some_and(|p| !timesig.identical(&p)) {
            lc.sig = len;
            self.score.sig_map.add(lc.tick, SigEvent { timesig: len, nominal: timesig, bar: no });
        }

        self.create_end_barlines(mid, false);
        self.create_shapes(mid);
        lc.tick += ticks;
    }

    /// Articulations that stretch time (fermatas) slow the tempo down for
    /// the length of their chord/rest.
    fn apply_time_stretch(&mut self, mid: MeasureId, sidx: usize) {
        let Some(seg) = self.score.measure(mid).map(|m| &m.segments[sidx]) else {
            return;
        };
        let mut stretch = 0.0_f64;
        for id in seg.elements.iter().flatten().filter_map(|e| e.cr()) {
            let cr = self.score.cr(id);
            for a in &cr.articulations {
                stretch = stretch.max(a.kind.time_stretch());
            }
            if stretch != 0.0 && stretch != 1.0 {
                let (tick, end) = (cr.tick, cr.tick + cr.ticks - 1);
                let otempo = self.score.tempo_map.tempo(tick);
                self.score.tempo_map.set_tempo(tick, otempo / stretch);
                if !self.score.tempo_map.has_tempo_at(end) {
                    self.score.tempo_map.set_tempo(end, otempo);
                }
                break;
            }
        }
    }
}
