//! Stacking systems onto pages and distributing the leftover height.

use log::debug;

use super::constants::HORIZONTAL_PAGE_GAP;
use super::{Layout, LayoutContext};
use crate::model::{LayoutMode, MeasureId, Page, SystemDivider, SystemId};

impl Layout<'_> {
    /// Reuse the next page of the previous pass or append one. Returns its
    /// index.
    fn get_empty_page(&mut self, lc: &mut LayoutContext) -> usize {
        let idx = lc.cur_page;
        if idx >= self.score.pages.len() {
            self.score.pages.push(Page::default());
            lc.page_old_system = None;
        } else {
            lc.page_old_system = self.score.pages[idx].systems.last().copied();
        }
        let format = self.score.style.page.clone();
        let x = match idx.checked_sub(1) {
            Some(prev) => self.score.pages[prev].x + format.width + HORIZONTAL_PAGE_GAP,
            None => 0.0,
        };
        let page = &mut self.score.pages[idx];
        page.no = idx;
        page.x = x;
        page.y = 0.0;
        page.width = format.width;
        page.height = format.height;
        page.systems.clear();
        lc.cur_page += 1;
        idx
    }

    /// Fill the next page with systems, collecting new ones as needed.
    /// Returns false once there is nothing left to place.
    pub(super) fn collect_page(&mut self, lc: &mut LayoutContext) -> bool {
        let Some(mut s2) = lc.cur_system else {
            return false;
        };
        let style = &self.score.style;
        let slb = style.p(style.staff_lower_border);
        let sub = style.p(style.staff_upper_border);
        let break_pages = self.score.layout_mode != LayoutMode::System;
        let user_dist = self.score.staves.first().map_or(0.0, |s| style.p(s.user_dist));
        let format = style.page.clone();

        let page_idx = self.get_empty_page(lc);
        let mut y = format.top_margin;
        let ey = format.height - format.bottom_margin;
        let mut s1: Option<SystemId> = None;

        loop {
            let distance = match s1 {
                Some(s1) => self.min_distance(s1, s2),
                None => {
                    let d = self.system_vbox(s2).map_or(sub, |f| self.score.style.p(f.top_gap));
                    d.max(self.min_top(s2))
                }
            } + user_dist;
            y += distance;
            let system = self.score.system_mut(s2);
            system.x = format.left_margin;
            system.y = y;
            system.page = Some(page_idx);
            y += system.height;
            self.score.pages[page_idx].systems.push(s2);

            if lc.range_done {
                // the rest of the old layout is taken over unchanged
                lc.cur_system = if lc.system_list.is_empty() { None } else { Some(lc.system_list.remove(0)) };
                if let Some(s) = lc.cur_system {
                    self.score.system_list.push(s);
                }
            } else {
                self.collect_system(lc);
            }

            let s3 = lc.cur_system;
            let mut break_page = s3.is_none() || (break_pages && self.system_page_break(s2));
            if let (false, Some(s3)) = (break_page, s3) {
                let mut dist = self.min_distance(s2, s3) + self.score.system(s3).height;
                dist += match self.system_vbox(s3) {
                    Some(f) => self.score.style.p(f.bottom_gap),
                    None => self.min_bottom(s3).max(slb),
                };
                break_page = break_pages && y + dist >= ey;
            }
            if break_page {
                let dist = match self.system_vbox(s2) {
                    Some(f) => self.score.style.p(f.bottom_gap),
                    None => self.min_bottom(s2).max(slb),
                };
                if !break_pages {
                    // one endless page
                    self.score.pages[page_idx].height = y + dist + format.bottom_margin;
                }
                self.layout_page(page_idx, ey - (y + dist));
                break;
            }
            let Some(next) = s3 else {
                break;
            };
            s1 = Some(s2);
            s2 = next;
        }

        let systems = self.score.pages[page_idx].systems.clone();
        for &sid in &systems {
            let measures: Vec<MeasureId> =
                self.score.system(sid).measures.iter().copied().filter(|m| self.score.is_measure(*m)).collect();
            self.layout_page_beams(&measures);
            self.layout_page_fingerings(&measures);
            self.layout_note_spanners(sid);
        }

        lc.page_changed = lc.system_changed || lc.page_old_system != systems.last().copied();
        debug!("page {page_idx}: {} systems", systems.len());
        true
    }

    /// Spread `rest_height` over the gaps between systems that are not
    /// frames, capped by the maximum system distance, and place dividers
    /// in the stretched gaps.
    pub(super) fn layout_page(&mut self, page_idx: usize, rest_height: f64) {
        let systems = self.score.pages[page_idx].systems.clone();
        let is_vbox = |layout: &Self, sid: SystemId| layout.score.system(sid).vbox;
        let gaps = systems.windows(2).filter(|w| !(is_vbox(self, w[0]) || is_vbox(self, w[1]))).count();

        let style = &self.score.style;
        if gaps == 0 || style.no_vertical_stretch || self.score.layout_mode == LayoutMode::System {
            if self.score.layout_mode == LayoutMode::Float {
                let y = rest_height * 0.5;
                for &sid in &systems {
                    self.score.system_mut(sid).y += y;
                }
            }
            for &sid in &systems {
                let system = self.score.system_mut(sid);
                system.divider_left = None;
                system.divider_right = None;
            }
            return;
        }

        let max_distance = style.p(style.max_system_distance);
        let stretch = (rest_height / gaps as f64).max(0.0);
        let mut yoff = 0.0;
        for w in systems.windows(2) {
            let (s1, s2) = (w[0], w[1]);
            if !(is_vbox(self, s1) || is_vbox(self, s2)) {
                let (y1, h1) = (self.score.system(s1).y, self.score.system(s1).height);
                let dist = (self.score.system(s2).y + yoff) - (y1 + h1);
                let mut offset = stretch;
                if dist + stretch > max_distance {
                    offset = (max_distance - dist).max(0.0);
                }
                yoff += offset;

                let sdd = (self.score.system(s2).y + yoff - y1 - h1) * 0.5 + h1;
                self.check_divider(true, s1, sdd);
                self.check_divider(false, s1, sdd);
            }
            self.score.system_mut(s2).y += yoff;
        }
    }

    /// Add or remove the left or right divider below a system; `sdd` is
    /// the middle of the gap relative to the system.
    fn check_divider(&mut self, left: bool, sid: SystemId, sdd: f64) {
        let style = &self.score.style;
        let wanted = if left { style.divider_left } else { style.divider_right };
        let divider = wanted.then(|| {
            let (width, height) = (style.p(style.divider_width), style.p(style.divider_height));
            let x = if left { 0.0 } else { self.score.system(sid).width - width };
            SystemDivider { x, y: sdd - height * 0.5, width, height }
        });
        let system = self.score.system_mut(sid);
        if left {
            system.divider_left = divider;
        } else {
            system.divider_right = divider;
        }
    }
}
