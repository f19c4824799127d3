//! Glyph metrics lookup.
//!
//! The layout never draws anything; it only needs bounding boxes, advance
//! widths and the "cut-out" notches accidentals use to tuck into each other.
//! [`GlyphMetrics`] is the query seam; [`StandardGlyphs`] answers it from a
//! built-in table of SMuFL-style metrics in staff spaces (y grows downwards).

use serde::{Deserialize, Serialize};

use crate::shape::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymId {
    NoteheadBlack,
    NoteheadHalf,
    NoteheadWhole,
    NoteheadDoubleWhole,
    NoteheadXBlack,
    NoteheadDiamondBlack,
    AccidentalSharp,
    AccidentalFlat,
    AccidentalNatural,
    AccidentalDoubleSharp,
    AccidentalDoubleFlat,
    AugmentationDot,
    ArticStaccato,
    ArticTenuto,
    ArticAccent,
    ArticMarcato,
    Fermata,
    FermataLong,
    FermataShort,
    Flag8thUp,
    Flag8thDown,
    Flag16thUp,
    Flag16thDown,
    Flag32ndUp,
    Flag32ndDown,
    Flag64thUp,
    Flag64thDown,
    RestLonga,
    RestDoubleWhole,
    RestWhole,
    RestHalf,
    RestQuarter,
    Rest8th,
    Rest16th,
    Rest32nd,
    Rest64th,
    Rest128th,
    GClef,
    FClef,
    CClef,
    UnpitchedPercussionClef,
    TimeSig(u8),
    BreathMarkComma,
    RepeatDot,
    SystemDivider,
}

/// Metrics query used by every layout stage. `scale` is the absolute size of
/// one staff space for the element (spatium times magnification).
pub trait GlyphMetrics {
    fn bbox(&self, sym: SymId, scale: f64) -> Rect;

    fn width(&self, sym: SymId, scale: f64) -> f64 {
        self.bbox(sym, scale).width
    }

    /// Upper-right notch of the glyph outline, if any.
    fn cut_out_ne(&self, sym: SymId, scale: f64) -> Option<Point>;

    /// Lower-left notch of the glyph outline, if any.
    fn cut_out_sw(&self, sym: SymId, scale: f64) -> Option<Point>;

    /// Advance width of a text run at the given font size (absolute units).
    fn text_width(&self, text: &str, size: f64) -> f64 {
        text.chars().count() as f64 * size * 0.55
    }
}

/// Built-in metrics table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardGlyphs;

fn time_sig_digit_width(d: u8) -> f64 {
    match d {
        0 => 1.8,
        1 => 1.26,
        2 => 1.64,
        3 => 1.68,
        4 => 1.8,
        5 => 1.6,
        6 => 1.72,
        7 => 1.7,
        8 => 1.76,
        _ => 1.72,
    }
}

impl StandardGlyphs {
    /// (x, y, width, height) in staff spaces.
    fn table(sym: SymId) -> (f64, f64, f64, f64) {
        use SymId::*;
        match sym {
            NoteheadBlack | NoteheadHalf => (0.0, -0.5, 1.18, 1.0),
            NoteheadWhole => (0.0, -0.5, 1.688, 1.0),
            NoteheadDoubleWhole => (0.0, -0.5, 2.5, 1.0),
            NoteheadXBlack => (0.0, -0.5, 1.16, 1.0),
            NoteheadDiamondBlack => (0.0, -0.5, 1.1, 1.0),
            AccidentalSharp => (0.0, -1.4, 0.996, 2.792),
            AccidentalFlat => (0.0, -1.756, 0.904, 2.456),
            AccidentalNatural => (0.0, -1.364, 0.672, 2.704),
            AccidentalDoubleSharp => (0.0, -0.5, 0.988, 1.0),
            AccidentalDoubleFlat => (0.0, -1.748, 1.644, 2.448),
            AugmentationDot => (0.0, -0.2, 0.4, 0.4),
            // articulations sit on their baseline, drawn above the chord
            ArticStaccato => (0.0, -0.4, 0.4, 0.4),
            ArticTenuto => (0.0, -0.14, 1.3, 0.14),
            ArticAccent => (0.0, -0.9, 1.3, 0.9),
            ArticMarcato => (0.0, -1.0, 0.9, 1.0),
            Fermata => (0.0, -1.3, 2.3, 1.3),
            FermataLong => (0.0, -1.4, 2.4, 1.4),
            FermataShort => (0.0, -1.4, 2.0, 1.4),
            Flag8thUp | Flag16thUp => (0.0, 0.0, 1.056, 3.2),
            Flag32ndUp | Flag64thUp => (0.0, 0.0, 1.056, 4.0),
            Flag8thDown | Flag16thDown => (0.0, -3.2, 1.224, 3.2),
            Flag32ndDown | Flag64thDown => (0.0, -4.0, 1.224, 4.0),
            RestLonga => (0.0, -1.0, 0.5, 2.0),
            RestDoubleWhole => (0.0, -1.0, 0.5, 1.0),
            RestWhole => (0.0, 0.0, 1.128, 0.5),
            RestHalf => (0.0, -0.5, 1.128, 0.5),
            RestQuarter => (0.0, -1.5, 1.08, 3.0),
            Rest8th => (0.0, -1.0, 0.988, 2.0),
            Rest16th => (0.0, -1.0, 1.28, 3.0),
            Rest32nd => (0.0, -2.0, 1.364, 4.0),
            Rest64th => (0.0, -2.0, 1.52, 5.0),
            Rest128th => (0.0, -3.0, 1.6, 6.0),
            GClef => (0.0, -4.392, 2.684, 7.024),
            FClef => (0.0, -1.004, 2.736, 3.552),
            CClef => (0.0, -2.024, 2.796, 4.048),
            UnpitchedPercussionClef => (0.0, -1.0, 1.1, 2.0),
            TimeSig(d) => (0.0, -1.0, time_sig_digit_width(d), 2.0),
            BreathMarkComma => (0.0, -0.6, 0.8, 1.2),
            RepeatDot => (0.0, -0.2, 0.4, 0.4),
            SystemDivider => (0.0, -0.5, 2.0, 1.0),
        }
    }

    fn cut_outs(sym: SymId) -> (Option<(f64, f64)>, Option<(f64, f64)>) {
        use SymId::*;
        match sym {
            AccidentalSharp => (Some((0.84, -0.896)), Some((0.144, 0.876))),
            AccidentalFlat => (Some((0.34, -0.66)), None),
            AccidentalNatural => (Some((0.54, -0.716)), Some((0.132, 0.704))),
            AccidentalDoubleFlat => (Some((1.1, -0.66)), None),
            _ => (None, None),
        }
    }
}

impl GlyphMetrics for StandardGlyphs {
    fn bbox(&self, sym: SymId, scale: f64) -> Rect {
        let (x, y, w, h) = Self::table(sym);
        Rect::new(x * scale, y * scale, w * scale, h * scale)
    }

    fn cut_out_ne(&self, sym: SymId, scale: f64) -> Option<Point> {
        Self::cut_outs(sym).0.map(|(x, y)| Point::new(x * scale, y * scale))
    }

    fn cut_out_sw(&self, sym: SymId, scale: f64) -> Option<Point> {
        Self::cut_outs(sym).1.map(|(x, y)| Point::new(x * scale, y * scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_scale_linearly() {
        let g = StandardGlyphs;
        let a = g.bbox(SymId::AccidentalSharp, 1.0);
        let b = g.bbox(SymId::AccidentalSharp, 5.0);
        assert!((b.width - a.width * 5.0).abs() < 1e-9);
        assert!((b.top() - a.top() * 5.0).abs() < 1e-9);
    }

    #[test]
    fn flats_have_only_an_upper_notch() {
        let g = StandardGlyphs;
        assert!(g.cut_out_ne(SymId::AccidentalFlat, 1.0).is_some());
        assert!(g.cut_out_sw(SymId::AccidentalFlat, 1.0).is_none());
    }
}
