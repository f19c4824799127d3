//! Horizontal spacing: segment shapes, minimum measure widths and the
//! spring model that distributes extra width by duration.

use log::debug;

use super::constants::{FALLBACK_STRETCH, LEFT_MARGIN_EXTENT, SIMULATED_BARLINE_HEIGHT, SPRING_K};
use super::text::lyric_rect;
use super::Layout;
use crate::model::{AnnotationKind, ChordRestId, Measure, MeasureId, Segment, SegmentElement, SegmentType, VOICES};
use crate::shape::{Rect, Shape};

/// One elastic gap: `fix` is its minimum length, `stretch` how readily it
/// takes extra width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    /// Index of the gap (segment or element) the spring stands for
    pub seg: usize,
    pub stretch: f64,
    pub fix: f64,
}

/// Springs ordered by `fix / stretch`, the force at which each one starts
/// to grow. Equal keys keep their insertion order.
#[derive(Debug, Clone, Default)]
pub struct SpringMap {
    springs: Vec<(f64, Spring)>,
}

impl SpringMap {
    pub fn new() -> Self {
        SpringMap::default()
    }

    pub fn insert(&mut self, key: f64, spring: Spring) {
        let pos = self.springs.partition_point(|(k, _)| *k <= key);
        self.springs.insert(pos, (key, spring));
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (f64, Spring)> {
        self.springs.iter()
    }

    pub fn len(&self) -> usize {
        self.springs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.springs.is_empty()
    }
}

/// Stretch coefficient of a gap lasting `ticks` when the shortest gap of
/// the group lasts `min_ticks`.
pub fn stretch_for(ticks: i32, min_ticks: i32) -> f64 {
    if ticks <= 0 || min_ticks <= 0 {
        return 1.0;
    }
    1.0 + SPRING_K * (f64::from(ticks) / f64::from(min_ticks)).ln()
}

/// Force that makes the springs fill `width`, where `x_min` is the total
/// natural width including the non-elastic parts.
///
/// Springs are taken in ascending key order; each new spring joins only if
/// the force found so far already exceeds the force at which it starts to
/// grow.
pub fn sff2(width: f64, mut x_min: f64, springs: &SpringMap) -> f64 {
    if width <= x_min {
        return 0.0;
    }
    let mut iter = springs.iter().peekable();
    let Some((_, first)) = iter.peek() else {
        return 0.0;
    };
    let mut c = first.stretch;
    if c == 0.0 {
        c = FALLBACK_STRETCH;
    }
    let mut f = 0.0;
    while let Some((_, spring)) = iter.next() {
        x_min -= spring.fix;
        f = (width - x_min) / c;
        match iter.peek() {
            Some((key, next)) if f > *key => c += next.stretch,
            _ => break,
        }
    }
    f
}

fn colliding_distance(a: &Segment, b: &Segment) -> f64 {
    a.shapes
        .iter()
        .zip(&b.shapes)
        .fold(-100_000.0_f64, |w, (sa, sb)| w.max(sa.min_horizontal_distance(sb)))
}

/// Segment belongs to the clef/key/time block opening a system.
fn is_header_segment(m: &Measure, sidx: usize) -> bool {
    let seg = &m.segments[sidx];
    m.has_system_header
        && seg.tick == m.tick
        && matches!(
            seg.ty,
            SegmentType::BeginBarLine
                | SegmentType::Clef
                | SegmentType::KeySig
                | SegmentType::Ambitus
                | SegmentType::TimeSig
        )
}

impl Layout<'_> {
    // ── shapes ──

    pub(super) fn create_shapes(&mut self, mid: MeasureId) {
        let (nsegs, nstaves) = match self.score.measure(mid) {
            Some(m) => (m.segments.len(), m.nstaves()),
            None => return,
        };
        for sidx in 0..nsegs {
            for staff_idx in 0..nstaves {
                self.create_shape(mid, sidx, staff_idx);
            }
        }
    }

    /// Rebuild the footprint of one staff of a segment from its elements.
    pub(super) fn create_shape(&mut self, mid: MeasureId, sidx: usize, staff_idx: usize) {
        let Some(seg) = self.score.measure(mid).and_then(|m| m.segments.get(sidx)) else {
            return;
        };
        let mut shape = Shape::new();
        for track in staff_idx * VOICES..(staff_idx + 1) * VOICES {
            match seg.element(track) {
                Some(SegmentElement::ChordRest(id)) => {
                    let cr = self.score.cr(*id);
                    if !cr.visible {
                        continue;
                    }
                    shape.add(&cr.shape);
                    for l in cr.lyrics.iter().filter(|l| l.visible) {
                        shape.add_rect(lyric_rect(cr, l));
                    }
                }
                Some(e) => {
                    if let Some(r) = e.bbox().filter(|r| !r.is_empty()) {
                        shape.add_rect(r);
                    }
                }
                None => {}
            }
        }
        for a in &seg.annotations {
            let spacing = matches!(a.kind, AnnotationKind::Harmony | AnnotationKind::FiguredBass | AnnotationKind::Symbol);
            if spacing && a.visible && a.staff_idx() == staff_idx {
                shape.add_rect(a.bbox.translated(a.x, a.y));
            }
        }
        if let Some(s) = self.score.measure_mut(mid).and_then(|m| m.segments[sidx].shapes.get_mut(staff_idx)) {
            *s = shape;
        }
    }

    // ── minimum width ──

    /// Minimum distance between the segments `s` and `ns` of a measure.
    fn segment_distance(&self, m: &Measure, s: usize, ns: usize, header_gap: bool) -> f64 {
        let style = &self.score.style;
        let sp = self.score.spatium();
        let (seg, next) = (&m.segments[s], &m.segments[ns]);

        let mut ww = -1_000_000.0_f64;
        for (a, b) in seg.shapes.iter().zip(&next.shapes) {
            let mut d = a.min_horizontal_distance(b);
            // the first chord/rest clears the widest header on any staff
            if header_gap {
                d = d.max(a.right());
            }
            ww = ww.max(d);
        }
        let mut w = ww.max(0.0);

        use SegmentType::*;
        match (seg.ty, next.ty) {
            (ChordRest, EndBarLine) => w += style.p(style.note_bar_distance),
            (ChordRest, Clef) => w = w.max(style.p(style.clef_left_margin)),
            (ChordRest, _) => w = w.max(self.note_head_width()) + style.p(style.min_note_distance),
            (TimeSig, ChordRest) if header_gap => w += style.p(style.system_header_time_sig_distance),
            (_, ChordRest) if header_gap => w += style.p(style.system_header_distance),
            (_, ChordRest) => {
                let d = style.p(style.bar_note_distance);
                let dd = seg.min_right() + next.min_left() + sp;
                w = d.max(dd);
            }
            (Clef, KeySig | KeySigAnnounce | TimeSig | TimeSigAnnounce) => w += style.p(style.clef_key_right_margin),
            (Clef, EndBarLine | StartRepeatBarLine) => w += style.p(style.clef_left_margin),
            (KeySig | KeySigAnnounce, TimeSig | TimeSigAnnounce) => w += style.p(style.keysig_left_margin),
            (KeySig | TimeSig, StartRepeatBarLine) => w += style.p(style.timesig_left_margin),
            (StartRepeatBarLine, _) => w += style.p(style.note_bar_distance),
            (BeginBarLine, Clef) => w += style.p(style.clef_left_margin),
            (EndBarLine, KeySigAnnounce) => w += style.p(style.keysig_left_margin),
            (EndBarLine, TimeSigAnnounce) => w += style.p(style.timesig_left_margin),
            (Breath, _) => w += 1.5 * sp,
            (Ambitus, _) => w += style.p(style.keysig_left_margin),
            _ => {}
        }
        w.max(0.0) + next.extra_leading_space * sp
    }

    /// Previous item sits in the same system and ends with a repeat.
    fn follows_end_repeat(&self, mid: MeasureId) -> bool {
        let Some(prev) = self.score.mb(mid).prev() else {
            return false;
        };
        let Some(pm) = self.score.measure(prev) else {
            return false;
        };
        pm.repeat_end
            && pm.system.is_some()
            && pm.system == self.score.mb(mid).system()
            && pm.segments.last().is_some_and(|s| s.ty == SegmentType::EndBarLine)
    }

    /// Put a multi-measure rest back to its minimum bar width.
    fn reset_mm_rest(&mut self, mid: MeasureId) {
        let Some(m) = self.score.measure_mut(mid) else {
            return;
        };
        m.width = 0.0;
        for s in &mut m.segments {
            s.x = 0.0;
        }
        let Some(sidx) = m.first_of(SegmentType::ChordRest) else {
            return;
        };
        let crs: Vec<ChordRestId> = m.segments[sidx].elements.iter().flatten().filter_map(|e| e.cr()).collect();
        let nstaves = m.nstaves();
        for id in crs {
            self.score.cr_mut(id).x = 0.0;
            let shape = self.chord_rest_shape(id);
            self.score.cr_mut(id).shape = shape;
        }
        for staff_idx in 0..nstaves {
            self.create_shape(mid, sidx, staff_idx);
        }
    }

    /// Place the segments of a measure at their minimum distances and set
    /// the measure's natural width. `is_first` marks the first measure of
    /// a system, which must not reach left of the system start.
    pub(super) fn compute_min_width(&mut self, mid: MeasureId, is_first: bool) -> f64 {
        if self.score.measure(mid).is_some_and(|m| m.is_mm_rest()) {
            self.reset_mm_rest(mid);
        }
        let follows_repeat = self.follows_end_repeat(mid);
        let Some(m) = self.score.measure(mid) else {
            return 0.0;
        };
        let style = &self.score.style;
        let sp = self.score.spatium();
        let n = m.segments.len();
        let mut xs = vec![0.0_f64; n];
        let mut ws = vec![0.0_f64; n];
        let active: Vec<usize> = (0..n).filter(|&i| m.segments[i].enabled).collect();

        let mut x = 0.0;
        if let Some(&fs) = active.first() {
            let ls = Shape::from_rect(if is_first {
                Rect::new(0.0, -LEFT_MARGIN_EXTENT, 0.0, 2.0 * LEFT_MARGIN_EXTENT)
            } else {
                Rect::new(0.0, 0.0, 0.0, SIMULATED_BARLINE_HEIGHT * sp)
            });
            let min_left = |seg: &Segment| seg.shapes.iter().fold(0.0_f64, |d, sh| d.max(ls.min_horizontal_distance(sh)));

            let first = &m.segments[fs];
            x = min_left(first);
            if first.ty == SegmentType::StartRepeatBarLine && follows_repeat {
                x -= style.p(style.end_barline_width);
            }
            match first.ty {
                SegmentType::ChordRest => x += style.p(style.bar_note_distance),
                SegmentType::Clef => x += style.p(style.clef_left_margin),
                SegmentType::KeySig => x = x.max(style.p(style.keysig_left_margin)),
                SegmentType::TimeSig => x = x.max(style.p(style.timesig_left_margin)),
                _ => {}
            }
            x += first.extra_leading_space * sp;
            let mut header = is_header_segment(m, fs);

            for k in 0..active.len() {
                let s = active[k];
                xs[s] = x;
                let w = match active.get(k + 1) {
                    Some(&ns) if header && m.segments[ns].ty.is_chord_rest() => {
                        header = false;
                        self.segment_distance(m, s, ns, true)
                    }
                    Some(&ns) => {
                        let mut w = self.segment_distance(m, s, ns, false);
                        // look back for collisions with earlier segments;
                        // extra space goes to the chord/rest segments only
                        let mut count = 1;
                        let mut j = k;
                        loop {
                            let ww = if k == 0 {
                                min_left(&m.segments[ns]) - xs[s]
                            } else {
                                j -= 1;
                                let ps = active[j];
                                if m.segments[ps].ty.is_chord_rest() {
                                    count += 1;
                                }
                                colliding_distance(&m.segments[ps], &m.segments[ns]) - (xs[s] - xs[ps])
                            };
                            if ww > w {
                                let d = (ww - w) / f64::from(count);
                                let mut xx = xs[active[j]];
                                for i in j..k {
                                    let (ss, ns1) = (active[i], active[i + 1]);
                                    if m.segments[ss].ty.is_chord_rest() {
                                        ws[ss] += d;
                                    }
                                    xx += ws[ss];
                                    xs[ns1] = xx;
                                }
                                w += d;
                                x = xx;
                                break;
                            }
                            if j == 0 {
                                break;
                            }
                        }
                        w
                    }
                    None => m.segments[s].min_right(),
                };
                ws[s] = w;
                x += w;
            }
        }

        // disabled segments collapse onto the next enabled one
        let mut next_x = x;
        for i in (0..n).rev() {
            if m.segments[i].enabled {
                next_x = xs[i];
            } else {
                xs[i] = next_x;
                ws[i] = 0.0;
            }
        }

        let stretchable: f64 = (0..n).filter(|&i| m.segments[i].ty.is_chord_rest()).map(|i| ws[i]).sum();
        let stretch = m.user_stretch * style.measure_spacing;
        let min = if m.is_mm_rest() { style.p(style.min_mm_rest_width) } else { style.p(style.min_measure_width) };
        let width = (x + stretchable * (stretch - 1.0)).max(min);

        if let Some(m) = self.score.measure_mut(mid) {
            for (seg, (sx, sw)) in m.segments.iter_mut().zip(xs.into_iter().zip(ws)) {
                seg.x = sx;
                seg.width = sw;
            }
            m.width = width;
        }
        width
    }

    // ── stretching ──

    /// Stretch a measure to `target` by feeding its segments to the
    /// spring model, then centre measure rests in the result.
    pub(super) fn stretch_measure(&mut self, mid: MeasureId, target: f64) {
        let Some(m) = self.score.measure_mut(mid) else {
            return;
        };
        m.width = target;
        let min_ticks = m
            .segments
            .iter()
            .filter(|s| s.enabled && s.ticks > 0)
            .map(|s| s.ticks)
            .min()
            .unwrap_or(0);

        let x0 = m.segments.iter().find(|s| s.enabled).map_or(0.0, |s| s.x);
        let mut total = x0;
        let mut springs = SpringMap::new();
        for (i, s) in m.segments.iter().enumerate().filter(|(_, s)| s.enabled) {
            total += s.width;
            if s.ticks > 0 {
                let stretch = stretch_for(s.ticks, min_ticks);
                springs.insert(s.width / stretch, Spring { seg: i, stretch, fix: s.width });
            }
        }
        if !springs.is_empty() {
            let force = sff2(target, total, &springs);
            for (_, spring) in springs.iter() {
                let w = force * spring.stretch;
                if w > spring.fix {
                    m.segments[spring.seg].width = w;
                }
            }
        }
        let mut x = x0;
        for s in m.segments.iter_mut() {
            s.x = x;
            if s.enabled {
                x += s.width;
            }
        }

        self.center_measure_rests(mid);
    }

    /// Centre full-measure rests and multi-measure rest bars between their
    /// segment and the end barline.
    fn center_measure_rests(&mut self, mid: MeasureId) {
        let Some(m) = self.score.measure(mid) else {
            return;
        };
        let is_mm = m.is_mm_rest();
        let x2 = m.end_barline_segment().map_or(m.width, |s| m.segments[s].x);
        let mut targets = Vec::new();
        for (sidx, seg) in m.segments.iter().enumerate().filter(|(_, s)| s.ty.is_chord_rest() && s.enabled) {
            for id in seg.elements.iter().flatten().filter_map(|e| e.cr()) {
                let cr = self.score.cr(id);
                if is_mm || cr.is_full_measure_rest() {
                    targets.push((sidx, seg.x, id));
                }
            }
        }
        let sp = self.score.spatium();
        for (sidx, x1, id) in targets {
            let staff_idx = self.score.cr(id).staff_idx();
            let x = if is_mm {
                (x2 - x1 - self.mm_rest_width(id)) * 0.5
            } else {
                let mag = self.score.cr(id).mag;
                let width = self.glyphs.width(super::chordrest::rest_sym(self.score.cr(id).duration.ty), sp * mag);
                (x2 - x1 - width) * 0.5
            };
            self.score.cr_mut(id).x = x;
            let shape = self.chord_rest_shape(id);
            self.score.cr_mut(id).shape = shape;
            self.create_shape(mid, sidx, staff_idx);
        }
    }

    /// Re-space a run of chords/rests (possibly across measures) between
    /// the first and the last one, by their durations.
    pub fn respace(&mut self, elements: &[ChordRestId]) {
        let n = elements.len();
        if n < 3 {
            return;
        }
        let seg_x = |layout: &Self, id: ChordRestId| layout.score.cr_system_x(id) - layout.score.cr(id).x;
        let x1 = seg_x(self, elements[0]);
        let x2 = seg_x(self, elements[n - 1]);

        let mut width = Vec::with_capacity(n - 1);
        let mut ticks = Vec::with_capacity(n - 1);
        for pair in elements.windows(2) {
            let (cr, ncr) = (self.score.cr(pair[0]), self.score.cr(pair[1]));
            let shape = cr.shape.translated(-cr.x, 0.0);
            let next = ncr.shape.translated(-ncr.x, 0.0);
            width.push(shape.min_horizontal_distance(&next).max(0.0));
            ticks.push(cr.ticks);
        }
        let min_ticks = ticks.iter().copied().filter(|t| *t > 0).min().unwrap_or(1);

        let mut springs = SpringMap::new();
        let mut minimum = 0.0;
        for (i, (&w, &t)) in width.iter().zip(&ticks).enumerate() {
            let stretch = stretch_for(t, min_ticks);
            springs.insert(w / stretch, Spring { seg: i, stretch, fix: w });
            minimum += w;
        }
        let force = sff2(x2 - x1, minimum, &springs);
        for (_, spring) in springs.iter() {
            width[spring.seg] = (force * spring.stretch).max(spring.fix);
        }

        let mut x = x1;
        for (i, &id) in elements.iter().enumerate().skip(1) {
            x += width[i - 1];
            let dx = x - seg_x(self, id) - self.score.cr(id).x;
            let cr = self.score.cr_mut(id);
            cr.x += dx;
            cr.shape.translate(dx, 0.0);
        }
        debug!("respace: {} elements over {:.2}", n, x2 - x1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn springs(list: &[(f64, f64)]) -> SpringMap {
        let mut map = SpringMap::new();
        for (i, &(fix, stretch)) in list.iter().enumerate() {
            map.insert(fix / stretch, Spring { seg: i, stretch, fix });
        }
        map
    }

    #[test]
    fn equal_springs_share_width_evenly() {
        let map = springs(&[(10.0, 1.0), (10.0, 1.0), (10.0, 1.0)]);
        let force = sff2(60.0, 30.0, &map);
        assert!((force - 20.0).abs() < 1e-9);
    }

    #[test]
    fn stiff_spring_keeps_its_minimum() {
        // the wide spring would shrink below its natural length
        let map = springs(&[(5.0, 1.0), (40.0, 1.0)]);
        let force = sff2(50.0, 45.0, &map);
        assert!((force - 10.0).abs() < 1e-9);
        let total: f64 = map.iter().map(|(_, s)| (force * s.stretch).max(s.fix)).sum();
        assert!((total - 50.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_parts_are_not_stretched() {
        let map = springs(&[(10.0, 1.0)]);
        // 5 units of non-elastic width
        let force = sff2(40.0, 15.0, &map);
        assert!((force - 35.0).abs() < 1e-9);
    }

    #[test]
    fn zero_width_yields_no_force() {
        let map = springs(&[(10.0, 1.0)]);
        assert_eq!(sff2(0.0, 10.0, &map), 0.0);
        assert_eq!(sff2(10.0, 0.0, &SpringMap::new()), 0.0);
    }

    #[test]
    fn narrower_than_the_natural_width_yields_no_force() {
        let map = springs(&[(10.0, 1.0), (10.0, 1.0)]);
        assert_eq!(sff2(15.0, 20.0, &map), 0.0);
        assert_eq!(sff2(20.0, 20.0, &map), 0.0);
    }

    #[test]
    fn longer_notes_stretch_more() {
        assert_eq!(stretch_for(240, 240), 1.0);
        let half = stretch_for(960, 240);
        assert!((half - (1.0 + SPRING_K * 4.0_f64.ln())).abs() < 1e-12);
        assert!(half > stretch_for(480, 240));
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let mut map = SpringMap::new();
        map.insert(1.0, Spring { seg: 0, stretch: 1.0, fix: 1.0 });
        map.insert(0.5, Spring { seg: 1, stretch: 1.0, fix: 0.5 });
        map.insert(1.0, Spring { seg: 2, stretch: 1.0, fix: 1.0 });
        let order: Vec<usize> = map.iter().map(|(_, s)| s.seg).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    // ── collisions ──

    use crate::glyphs::StandardGlyphs;
    use crate::model::{ChordSpec, DurationType, Fraction, Score, ScoreBuilder};
    use crate::style::Style;
    use crate::undo::DiscardLog;

    fn eighths() -> (Score, MeasureId) {
        let mut b = ScoreBuilder::new(Style::default());
        b.add_staff(0, crate::model::ClefType::G);
        let m = b.add_measure(Fraction::new(4, 4));
        for _ in 0..8 {
            b.add_chord(m, 0, ChordSpec::new(DurationType::Eighth, &[4]));
        }
        (b.build(), m)
    }

    fn chord_segments(score: &Score, m: MeasureId) -> Vec<usize> {
        score.measure(m).map_or(Vec::new(), |m| {
            (0..m.segments.len()).filter(|&i| m.segments[i].ty == SegmentType::ChordRest).collect()
        })
    }

    /// Give every chord segment a small footprint, then override a few.
    fn set_shapes(score: &mut Score, m: MeasureId, overrides: &[(usize, Rect)]) -> Vec<usize> {
        let crs = chord_segments(score, m);
        if let Some(measure) = score.measure_mut(m) {
            for &i in &crs {
                measure.segments[i].shapes = vec![Shape::from_rect(Rect::new(0.0, 0.0, 5.0, 10.0))];
            }
            for &(k, r) in overrides {
                measure.segments[crs[k]].shapes = vec![Shape::from_rect(r)];
            }
        }
        crs
    }

    fn seg_x(score: &Score, m: MeasureId, i: usize) -> f64 {
        score.measure(m).map_or(0.0, |m| m.segments[i].x)
    }

    #[test]
    fn wide_segment_clears_the_one_after_next() {
        let (mut score, m) = eighths();
        // the second chord sits well above, so only the third collides
        let crs = set_shapes(
            &mut score,
            m,
            &[(0, Rect::new(0.0, 0.0, 60.0, 10.0)), (1, Rect::new(0.0, -40.0, 5.0, 10.0))],
        );
        let mut log = DiscardLog;
        Layout::new(&mut score, &StandardGlyphs, &mut log).compute_min_width(m, false);

        let (a, b, c) = (seg_x(&score, m, crs[0]), seg_x(&score, m, crs[1]), seg_x(&score, m, crs[2]));
        assert!(a < b && b < c);
        assert!(c - a >= 60.0 - 1e-9, "gap {} is narrower than the wide chord", c - a);
    }

    #[test]
    fn wide_segment_clears_its_neighbour() {
        let (mut score, m) = eighths();
        let crs = set_shapes(&mut score, m, &[(0, Rect::new(0.0, 0.0, 30.0, 10.0))]);
        let mut log = DiscardLog;
        Layout::new(&mut score, &StandardGlyphs, &mut log).compute_min_width(m, false);

        let gap = seg_x(&score, m, crs[1]) - seg_x(&score, m, crs[0]);
        assert!(gap >= 30.0 - 1e-9, "gap {gap}");
        // later chords keep their ordinary spacing
        let rest = seg_x(&score, m, crs[3]) - seg_x(&score, m, crs[2]);
        assert!(rest < 30.0);
    }
}
