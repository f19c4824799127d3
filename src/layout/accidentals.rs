//! Accidental stacking for the notes of one segment and staff.
//!
//! Accidentals an octave apart share a column and are placed first, right
//! to left. Everything else is laid out zig-zag: top, bottom, then inward,
//! each accidental only checked against its two vertical neighbours.

use super::constants::{ACCIDENTAL_CLOSE_GAP, ACCIDENTAL_OVERLAP_SHIFT, LEDGER_ACCIDENTAL_X, OCTAVE_COLUMN_SPAN};
use crate::model::NoteId;

/// One accidental in the stack. Vertical values are absolute staff
/// positions; `x` is relative to the leftmost notehead.
#[derive(Debug, Clone, PartialEq)]
pub struct AcEl {
    pub note: NoteId,
    pub x: f64,
    pub top: f64,
    pub bottom: f64,
    pub line: i32,
    /// Next accidental up the same octave column
    pub next: Option<usize>,
    pub width: f64,
    /// Left edge of the glyph bbox
    pub bbox_x: f64,
    pub mag: f64,
    /// Depth of the upper-right notch
    pub ascent: f64,
    /// Depth of the lower-left notch
    pub descent: f64,
    /// Width of the upper-right notch
    pub right_clear: f64,
    /// Width of the lower-left notch
    pub left_clear: f64,
}

/// Accidentals collected top note first.
#[derive(Debug, Default)]
pub struct AccidentalStack {
    els: Vec<AcEl>,
    column_bottom: [Option<usize>; 7],
}

/// Shared placement parameters of one stack.
struct Params<'a> {
    left_notes: &'a [(i32, f64)],
    staff_lines: i32,
    pnd: f64,
    pd: f64,
    sp: f64,
}

fn pitch_class(line: i32) -> usize {
    (line + 700).rem_euclid(7) as usize
}

impl AccidentalStack {
    /// Add the next accidental; must be called top to bottom.
    pub fn push(&mut self, mut el: AcEl) {
        let pc = pitch_class(el.line);
        let idx = self.els.len();
        el.next = self.column_bottom[pc];
        self.column_bottom[pc] = Some(idx);
        self.els.push(el);
    }

    pub fn is_empty(&self) -> bool {
        self.els.is_empty()
    }

    /// Place every accidental. `left_notes` are the mirrored noteheads left
    /// of the stem origin as `(line, x)`, top first. Returns the x of each
    /// accidental relative to the leftmost notehead.
    pub fn layout(
        mut self,
        left_notes: &[(i32, f64)],
        staff_lines: i32,
        pnd: f64,
        pd: f64,
        sp: f64,
    ) -> Vec<(NoteId, f64)> {
        let params = Params { left_notes, staff_lines, pnd, pd, sp };
        let n_acc = self.els.len();
        let mut col_offset = 0.0;
        let mut umi: Vec<usize> = Vec::new();

        if n_acc >= 2 && self.els[n_acc - 1].line - self.els[0].line >= OCTAVE_COLUMN_SPAN {
            let (columns, unmatched) = self.find_columns();

            // slot unmatched accidentals into a column where they fit
            for idx in unmatched {
                let (line, top, bottom, mag) = {
                    let me = &self.els[idx];
                    (me.line, me.top, me.bottom, me.mag)
                };
                let my_pd = pd * mag;
                let mut found = false;
                for &pc in &columns {
                    let mut above = None;
                    let mut below = None;
                    let mut k = self.column_bottom[pc];
                    while let Some(j) = k {
                        if self.els[j].line < line {
                            above = Some(j);
                            break;
                        }
                        below = Some(j);
                        k = self.els[j].next;
                    }
                    let conflict = above.is_some_and(|a| top - self.els[a].bottom < my_pd)
                        || below.is_some_and(|b| self.els[b].top - bottom < my_pd);
                    if !conflict {
                        found = true;
                        self.els[idx].next = above;
                        match below {
                            Some(b) => self.els[b].next = Some(idx),
                            None => self.column_bottom[pc] = Some(idx),
                        }
                        break;
                    }
                }
                if !found {
                    umi.push(idx);
                }
            }
            umi.sort_unstable();

            let mut min_x = 0.0_f64;
            for &pc in &columns {
                let mut below: Option<usize> = None;
                let mut k = self.column_bottom[pc];
                while let Some(j) = k {
                    self.layout_accidental(j, None, below, col_offset, &params);
                    min_x = min_x.min(self.els[j].x);
                    below = Some(j);
                    k = self.els[j].next;
                }
                // align the column on its leftmost member; an accidental
                // followed by a unison keeps its own offset
                let mut k = self.column_bottom[pc];
                while let Some(j) = k {
                    let next = self.els[j].next;
                    if !next.is_some_and(|nx| self.els[nx].line == self.els[j].line) {
                        self.els[j].x = min_x;
                    }
                    k = next;
                }
                col_offset = min_x;
            }
        } else {
            umi.extend(0..n_acc);
        }

        if !umi.is_empty() {
            self.zig_zag(&umi, col_offset, &params);
        }
        self.els.into_iter().map(|e| (e.note, e.x)).collect()
    }

    fn column_tops(&self) -> [Option<usize>; 7] {
        let mut column_top = [None; 7];
        for (pc, top) in column_top.iter_mut().enumerate() {
            let mut k = self.column_bottom[pc];
            while let Some(j) = k {
                *top = Some(j);
                k = self.els[j].next;
            }
        }
        column_top
    }

    /// Pitch classes forming octave columns, in zig-zag order of first
    /// appearance, and the accidentals that have no octave partner.
    fn find_columns(&self) -> (Vec<usize>, Vec<usize>) {
        let column_top = self.column_tops();
        let spans_octave = |pc: usize| match (column_top[pc], self.column_bottom[pc]) {
            (Some(t), Some(b)) => self.els[t].line != self.els[b].line,
            _ => false,
        };
        let mut columns: Vec<usize> = Vec::new();
        let mut unmatched: Vec<usize> = Vec::new();
        let mut classify = |idx: usize| {
            let pc = pitch_class(self.els[idx].line);
            if spans_octave(pc) {
                if !columns.contains(&pc) {
                    columns.push(pc);
                }
            } else {
                unmatched.push(idx);
            }
        };
        let mut i = 0;
        let mut n = self.els.len() - 1;
        while i <= n {
            classify(i);
            if i == n {
                break;
            }
            classify(n);
            i += 1;
            n -= 1;
        }
        (columns, unmatched)
    }

    /// Top, bottom, then alternately the next highest and next lowest.
    fn zig_zag(&mut self, umi: &[usize], col_offset: f64, params: &Params<'_>) {
        let mut me = umi[0];
        let mut above: Option<usize> = None;
        let mut below: Option<usize> = None;
        self.layout_accidental(me, above, below, col_offset, params);

        let mut n = umi.len() - 1;
        if n > 0 {
            above = Some(me);
            me = umi[n];
            self.layout_accidental(me, above, below, col_offset, params);
        }
        if n > 1 {
            let mut i = 1;
            while i < n {
                below = Some(me);
                me = umi[i];
                self.layout_accidental(me, above, below, col_offset, params);
                if i == n - 1 {
                    break;
                }
                above = Some(me);
                me = umi[n - 1];
                self.layout_accidental(me, above, below, col_offset, params);
                i += 1;
                n -= 1;
            }
        }
    }

    fn layout_accidental(
        &mut self,
        me: usize,
        above: Option<usize>,
        below: Option<usize>,
        col_offset: f64,
        params: &Params<'_>,
    ) {
        let sp = params.sp;
        let mut lx = col_offset;
        let (line, top, bottom, mag, ascent, right_clear, width, bbox_x) = {
            let e = &self.els[me];
            (e.line, e.top, e.bottom, e.mag, e.ascent, e.right_clear, e.width, e.bbox_x)
        };
        let pnd = params.pnd * mag;
        let pd = params.pd * mag;

        // ledger lines
        if line <= -2 || line >= params.staff_lines * 2 {
            lx = lx.min(LEDGER_ACCIDENTAL_X * sp);
        }

        for &(ln_line, ln_x) in params.left_notes {
            let ln_top = f64::from(ln_line - 1) * 0.5 * sp;
            let ln_bottom = ln_top + sp;
            if top - ln_bottom <= pnd && ln_top - bottom <= pnd {
                // tuck under the head above through the notch if deep enough
                if ln_bottom - top <= ascent - pnd {
                    lx = lx.min(ln_x + right_clear);
                } else {
                    lx = lx.min(ln_x);
                }
            } else if ln_top > bottom {
                break;
            }
        }

        let conflict_above = above.is_some_and(|a| self.resolve(me, a, &mut lx, pd, sp));
        let conflict_below = below.is_some_and(|b| self.resolve(me, b, &mut lx, pd, sp));
        self.els[me].x = if conflict_above || conflict_below {
            lx - width - bbox_x
        } else if col_offset != 0.0 {
            lx - pd - width - bbox_x
        } else {
            lx - pnd - width - bbox_x
        };
    }

    /// Clear `left` (being placed) from the already placed `right`. Returns
    /// whether the two interact; `lx` is narrowed accordingly.
    fn resolve(&self, left: usize, right: usize, lx: &mut f64, pd: f64, sp: f64) -> bool {
        let (l, r) = (&self.els[left], &self.els[right]);
        let (upper, lower, left_is_lower) = if l.line >= r.line { (r, l, true) } else { (l, r, false) };

        let gap = lower.top - upper.bottom;
        // octaves are assumed to clear
        if gap >= pd || lower.line - upper.line >= OCTAVE_COLUMN_SPAN {
            return false;
        }

        let allowable_overlap = upper.descent.max(lower.ascent) - pd;

        // close: small gap or slight overlap one notch can absorb
        if gap.abs() <= ACCIDENTAL_CLOSE_GAP * sp
            && -gap <= allowable_overlap
            && upper.descent.min(lower.ascent) > 0.0
        {
            let align = l.width.min(r.width);
            *lx = lx.min(r.x + align - pd);
            return true;
        }

        // overlapping stems (two flats) need more than the plain distance
        let overlap_shift = pd * ACCIDENTAL_OVERLAP_SHIFT;

        if left_is_lower && -gap <= allowable_overlap {
            let offset = l.right_clear.max(r.left_clear).min(l.width) - overlap_shift;
            *lx = lx.min(r.x + offset);
            return true;
        }

        if left_is_lower && -gap <= upper.descent + lower.ascent - pd {
            let offset = l.right_clear.min(r.left_clear) - overlap_shift;
            if offset > 0.0 {
                *lx = lx.min(r.x + offset);
                return true;
            }
        }

        *lx = lx.min(r.x - pd);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SP: f64 = 10.0;
    const PD: f64 = 2.2;
    const PND: f64 = 2.2;

    fn sharp(note: usize, line: i32) -> AcEl {
        let y = f64::from(line) * 0.5 * SP;
        AcEl {
            note: NoteId(note),
            x: 0.0,
            top: y - 14.0,
            bottom: y + 14.0,
            line,
            next: None,
            width: 10.0,
            bbox_x: 0.0,
            mag: 1.0,
            ascent: 0.0,
            descent: 0.0,
            right_clear: 0.0,
            left_clear: 0.0,
        }
    }

    fn x_of(placed: &[(NoteId, f64)], note: usize) -> f64 {
        placed.iter().find(|(n, _)| n.0 == note).map(|(_, x)| *x).unwrap_or(f64::NAN)
    }

    #[test]
    fn single_accidental_sits_left_of_the_head() {
        let mut stack = AccidentalStack::default();
        stack.push(sharp(0, 4));
        let placed = stack.layout(&[], 5, PND, PD, SP);
        assert_eq!(placed.len(), 1);
        assert!((x_of(&placed, 0) - (-PND - 10.0)).abs() < 1e-9);
    }

    #[test]
    fn third_apart_stacks_to_the_left() {
        let mut stack = AccidentalStack::default();
        stack.push(sharp(0, 3));
        stack.push(sharp(1, 5));
        let placed = stack.layout(&[], 5, PND, PD, SP);
        let top = x_of(&placed, 0);
        let bottom = x_of(&placed, 1);
        assert!((top - (-PND - 10.0)).abs() < 1e-9);
        assert!((bottom - (top - PD - 10.0)).abs() < 1e-9);
    }

    #[test]
    fn octave_shares_a_column() {
        let mut stack = AccidentalStack::default();
        stack.push(sharp(0, 1));
        stack.push(sharp(1, 8));
        let placed = stack.layout(&[], 5, PND, PD, SP);
        assert!((x_of(&placed, 0) - x_of(&placed, 1)).abs() < 1e-9);
    }

    #[test]
    fn ledger_line_accidental_keeps_clear_of_the_ledger() {
        let mut stack = AccidentalStack::default();
        stack.push(sharp(0, -3));
        let placed = stack.layout(&[], 5, PND, PD, SP);
        assert!((x_of(&placed, 0) - (LEDGER_ACCIDENTAL_X * SP - PND - 10.0)).abs() < 1e-9);
    }

    #[test]
    fn widely_spaced_accidentals_do_not_interact() {
        let mut stack = AccidentalStack::default();
        stack.push(sharp(0, 0));
        stack.push(sharp(1, 8));
        let placed = stack.layout(&[], 5, PND, PD, SP);
        assert!((x_of(&placed, 0) - x_of(&placed, 1)).abs() < 1e-9);
    }

    #[test]
    fn unison_in_an_octave_column_stays_staggered() {
        let mut stack = AccidentalStack::default();
        stack.push(sharp(0, 1));
        stack.push(sharp(1, 8));
        stack.push(sharp(2, 8));
        let placed = stack.layout(&[], 5, PND, PD, SP);

        // the lower of the two unisons is placed first, next to the head
        assert!((x_of(&placed, 2) - (-PND - 10.0)).abs() < 1e-9);
        let column = x_of(&placed, 2) - PD - 10.0;
        assert!((x_of(&placed, 1) - column).abs() < 1e-9);
        assert!((x_of(&placed, 0) - column).abs() < 1e-9);
    }
}

