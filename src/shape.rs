//! Axis-aligned bounding-region algebra.
//!
//! A [`Shape`] is a list of rectangles describing the visual footprint of an
//! element, a segment or a measure on one staff. Spacing asks shapes for the
//! minimum horizontal distance that keeps them from colliding; vertical
//! layout asks for the minimum vertical distance. All coordinates use a
//! y-down convention.

use serde::{Deserialize, Serialize};

/// Vertical overlap tolerance used by horizontal distance queries.
const VERTICAL_CLEARANCE: f64 = 0.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn left(&self) -> f64 {
        self.x
    }
    pub fn right(&self) -> f64 {
        self.x + self.width
    }
    pub fn top(&self) -> f64 {
        self.y
    }
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 && self.height <= 0.0
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect { x: self.x + dx, y: self.y + dy, ..*self }
    }

    /// Grow the rectangle by the given edge deltas (Qt `adjusted` semantics).
    pub fn adjusted(&self, dx1: f64, dy1: f64, dx2: f64, dy2: f64) -> Rect {
        Rect {
            x: self.x + dx1,
            y: self.y + dy1,
            width: self.width - dx1 + dx2,
            height: self.height - dy1 + dy2,
        }
    }

    pub fn united(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x1 = self.left().min(other.left());
        let y1 = self.top().min(other.top());
        let x2 = self.right().max(other.right());
        let y2 = self.bottom().max(other.bottom());
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }
}

/// True when the intervals [a, b) and [c, d) overlap, widened by `clearance`.
fn intersects(a: f64, b: f64, c: f64, d: f64, clearance: f64) -> bool {
    let a = a - clearance;
    let b = b + clearance;
    (a >= c && a < d) || (b >= c && b < d) || (a < c && b >= d)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub rects: Vec<Rect>,
}

impl Shape {
    pub fn new() -> Self {
        Shape { rects: Vec::new() }
    }

    pub fn from_rect(r: Rect) -> Self {
        Shape { rects: vec![r] }
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn add_rect(&mut self, r: Rect) {
        self.rects.push(r);
    }

    pub fn add(&mut self, other: &Shape) {
        self.rects.extend_from_slice(&other.rects);
    }

    /// Remove every rectangle of `other` from this shape (one occurrence each).
    pub fn remove(&mut self, other: &Shape) {
        for r in &other.rects {
            if let Some(pos) = self.rects.iter().position(|x| x == r) {
                self.rects.remove(pos);
            }
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for r in &mut self.rects {
            *r = r.translated(dx, dy);
        }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Shape {
        Shape { rects: self.rects.iter().map(|r| r.translated(dx, dy)).collect() }
    }

    /// Distance the shape extends to the left of the origin (never negative).
    pub fn left(&self) -> f64 {
        let mut dist = 0.0_f64;
        for r in &self.rects {
            if r.left() < dist {
                dist = r.left();
            }
        }
        -dist
    }

    /// Rightmost extent of the shape (never negative).
    pub fn right(&self) -> f64 {
        self.rects.iter().fold(0.0_f64, |d, r| d.max(r.right()))
    }

    pub fn top(&self) -> f64 {
        self.rects.iter().fold(1_000_000.0_f64, |d, r| d.min(r.top()))
    }

    pub fn bottom(&self) -> f64 {
        self.rects.iter().fold(-1_000_000.0_f64, |d, r| d.max(r.bottom()))
    }

    pub fn bbox(&self) -> Rect {
        self.rects.iter().fold(Rect::default(), |acc, r| acc.united(r))
    }

    /// Minimum horizontal distance `other` must keep from this shape so that
    /// no vertically overlapping pair of rectangles collides. `other` is
    /// assumed to sit to the right.
    pub fn min_horizontal_distance(&self, other: &Shape) -> f64 {
        let mut dist = -1_000_000.0_f64;
        for r2 in &other.rects {
            for r1 in &self.rects {
                if intersects(r1.top(), r1.bottom(), r2.top(), r2.bottom(), VERTICAL_CLEARANCE) {
                    dist = dist.max(r1.right() - r2.left());
                }
            }
        }
        dist
    }

    /// Minimum vertical distance `other` must keep from this shape so that
    /// no horizontally overlapping pair of rectangles collides. `other` is
    /// assumed to sit below.
    pub fn min_vertical_distance(&self, other: &Shape) -> f64 {
        let mut dist = -1_000_000.0_f64;
        for r2 in &other.rects {
            if r2.height <= 0.0 {
                continue;
            }
            for r1 in &self.rects {
                if r1.height <= 0.0 {
                    continue;
                }
                if intersects(r1.left(), r1.right(), r2.left(), r2.right(), 0.0) {
                    dist = dist.max(r1.bottom() - r2.top());
                }
            }
        }
        dist
    }

    /// True when any rectangle of `other` overlaps a rectangle of this shape.
    pub fn intersects(&self, other: &Shape) -> bool {
        self.rects.iter().any(|a| {
            other.rects.iter().any(|b| {
                a.left() < b.right() && b.left() < a.right() && a.top() < b.bottom() && b.top() < a.bottom()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_distance_ignores_vertically_disjoint_rects() {
        let a = Shape::from_rect(Rect::new(0.0, 0.0, 2.0, 1.0));
        let b = Shape::from_rect(Rect::new(0.0, 5.0, 1.0, 1.0));
        assert!(a.min_horizontal_distance(&b) < -1000.0);
    }

    #[test]
    fn horizontal_distance_is_right_minus_left() {
        let a = Shape::from_rect(Rect::new(0.0, 0.0, 2.0, 1.0));
        let b = Shape::from_rect(Rect::new(-0.5, 0.5, 1.0, 1.0));
        assert_eq!(a.min_horizontal_distance(&b), 2.5);
    }

    #[test]
    fn vertical_distance_is_bottom_minus_top() {
        let above = Shape::from_rect(Rect::new(0.0, 0.0, 4.0, 3.0));
        let below = Shape::from_rect(Rect::new(1.0, -1.0, 1.0, 1.0));
        assert_eq!(above.min_vertical_distance(&below), 4.0);
    }

    #[test]
    fn left_and_right_extents() {
        let mut s = Shape::new();
        s.add_rect(Rect::new(-1.5, 0.0, 1.0, 1.0));
        s.add_rect(Rect::new(0.0, 0.0, 3.0, 1.0));
        assert_eq!(s.left(), 1.5);
        assert_eq!(s.right(), 3.0);
    }

    #[test]
    fn remove_takes_out_exact_rects() {
        let r = Rect::new(0.0, 0.0, 1.0, 1.0);
        let mut s = Shape::from_rect(r);
        s.add_rect(Rect::new(2.0, 0.0, 1.0, 1.0));
        s.remove(&Shape::from_rect(r));
        assert_eq!(s.rects.len(), 1);
        assert_eq!(s.rects[0].x, 2.0);
    }

    #[test]
    fn adjusted_grows_edges() {
        let r = Rect::new(0.0, 0.0, 2.0, 2.0).adjusted(0.0, -1.0, 0.0, 0.5);
        assert_eq!(r, Rect::new(0.0, -1.0, 2.0, 3.5));
    }
}
