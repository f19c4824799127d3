//! Engraving style: every numeric and boolean parameter the layout consults.
//!
//! Distances are stored in spatium units (the distance between two staff
//! lines) and resolved to absolute units through [`Style::p`]. A style can
//! be loaded from a partial JSON document; keys that are not present keep
//! their defaults.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Granularity used to vertically align lyrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalAlignRange {
    Segment,
    Measure,
    System,
}

/// Page dimensions and margins in absolute units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFormat {
    pub width: f64,
    pub height: f64,
    pub left_margin: f64,
    pub right_margin: f64,
    pub top_margin: f64,
    pub bottom_margin: f64,
}

impl Default for PageFormat {
    /// A4 portrait with 15mm margins (points).
    fn default() -> Self {
        PageFormat {
            width: 595.276,
            height: 841.89,
            left_margin: 42.52,
            right_margin: 42.52,
            top_margin: 42.52,
            bottom_margin: 42.52,
        }
    }
}

impl PageFormat {
    pub fn printable_width(&self) -> f64 {
        self.width - self.left_margin - self.right_margin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    /// Staff space in absolute units
    pub spatium: f64,
    pub page: PageFormat,

    // ── Vertical spacing ──
    pub min_system_distance: f64,
    pub max_system_distance: f64,
    pub staff_upper_border: f64,
    pub staff_lower_border: f64,
    pub staff_distance: f64,
    /// Distance between staves of the same part
    pub akkolade_distance: f64,

    // ── Horizontal spacing ──
    pub min_measure_width: f64,
    /// Multiplier applied to every measure's minimum width
    pub measure_spacing: f64,
    pub bar_note_distance: f64,
    pub note_bar_distance: f64,
    pub min_note_distance: f64,
    pub system_header_distance: f64,
    pub system_header_time_sig_distance: f64,
    pub clef_left_margin: f64,
    pub clef_key_right_margin: f64,
    pub keysig_left_margin: f64,
    pub timesig_left_margin: f64,
    pub min_mm_rest_width: f64,
    /// Fill ratio at or below which the last system is left unstretched
    pub last_system_fill_limit: f64,

    // ── Notes ──
    pub stem_width: f64,
    pub stem_length: f64,
    pub dot_note_distance: f64,
    pub dot_dot_distance: f64,
    pub accidental_distance: f64,
    pub accidental_note_distance: f64,
    pub beam_width: f64,
    pub beam_distance: f64,
    pub beam_min_slope: f64,
    pub beam_max_slope: f64,
    pub grace_note_mag: f64,
    pub small_note_mag: f64,
    pub small_clef_mag: f64,

    // ── Barlines ──
    pub barline_width: f64,
    pub end_barline_width: f64,
    pub end_barline_distance: f64,
    pub double_barline_distance: f64,
    pub repeat_barline_dot_separation: f64,
    pub start_barline_single: bool,
    pub start_barline_multiple: bool,

    // ── Header and courtesy elements ──
    pub gen_clef: bool,
    pub gen_keysig: bool,
    pub gen_courtesy_timesig: bool,
    pub gen_courtesy_keysig: bool,
    pub gen_courtesy_clef: bool,

    // ── Multi-measure rests ──
    pub create_multi_measure_rests: bool,
    pub min_empty_measures: usize,

    // ── Staves ──
    pub hide_empty_staves: bool,
    pub dont_hide_staves_in_first_system: bool,
    pub bracket_width: f64,
    pub instrument_name_distance: f64,
    pub instrument_name_font_size: f64,

    // ── Beaming ──
    pub cross_measure_values: bool,

    // ── Lyrics and text ──
    pub lyrics_min_top_distance: f64,
    pub lyrics_min_bottom_distance: f64,
    pub lyrics_line_height: f64,
    pub lyrics_font_size: f64,
    pub text_font_size: f64,
    pub tempo_font_size: f64,
    pub dynamics_font_size: f64,
    pub min_autoplace_distance: f64,
    pub vertical_align_range: VerticalAlignRange,

    // ── Spanners ──
    pub hairpin_height: f64,
    pub volta_height: f64,
    pub volta_y: f64,
    pub ottava_y: f64,
    pub slur_min_height: f64,
    pub slur_max_height: f64,

    // ── System dividers ──
    pub divider_left: bool,
    pub divider_right: bool,
    pub divider_width: f64,
    pub divider_height: f64,

    /// Disables vertical justification of systems on a page
    pub no_vertical_stretch: bool,
    /// Disables horizontal justification of systems
    pub no_horizontal_stretch: bool,
}

impl Default for Style {
    fn default() -> Self {
        Style {
            spatium: 5.0,
            page: PageFormat::default(),

            min_system_distance: 8.5,
            max_system_distance: 15.0,
            staff_upper_border: 7.0,
            staff_lower_border: 7.0,
            staff_distance: 6.5,
            akkolade_distance: 6.5,

            min_measure_width: 5.0,
            measure_spacing: 1.2,
            bar_note_distance: 1.3,
            note_bar_distance: 1.0,
            min_note_distance: 0.25,
            system_header_distance: 2.5,
            system_header_time_sig_distance: 2.0,
            clef_left_margin: 0.64,
            clef_key_right_margin: 1.75,
            keysig_left_margin: 0.5,
            timesig_left_margin: 0.5,
            min_mm_rest_width: 4.0,
            last_system_fill_limit: 0.3,

            stem_width: 0.13,
            stem_length: 3.5,
            dot_note_distance: 0.35,
            dot_dot_distance: 0.5,
            accidental_distance: 0.22,
            accidental_note_distance: 0.22,
            beam_width: 0.5,
            beam_distance: 0.5,
            beam_min_slope: 0.05,
            beam_max_slope: 0.2,
            grace_note_mag: 0.7,
            small_note_mag: 0.7,
            small_clef_mag: 0.8,

            barline_width: 0.16,
            end_barline_width: 0.5,
            end_barline_distance: 0.3,
            double_barline_distance: 0.3,
            repeat_barline_dot_separation: 0.3,
            start_barline_single: false,
            start_barline_multiple: true,

            gen_clef: true,
            gen_keysig: true,
            gen_courtesy_timesig: true,
            gen_courtesy_keysig: true,
            gen_courtesy_clef: true,

            create_multi_measure_rests: false,
            min_empty_measures: 2,

            hide_empty_staves: false,
            dont_hide_staves_in_first_system: true,
            bracket_width: 0.45,
            instrument_name_distance: 1.0,
            instrument_name_font_size: 2.4,

            cross_measure_values: false,

            lyrics_min_top_distance: 1.0,
            lyrics_min_bottom_distance: 2.0,
            lyrics_line_height: 2.8,
            lyrics_font_size: 2.2,
            text_font_size: 2.2,
            tempo_font_size: 2.4,
            dynamics_font_size: 2.4,
            min_autoplace_distance: 0.5,
            vertical_align_range: VerticalAlignRange::Segment,

            hairpin_height: 1.2,
            volta_height: 1.9,
            volta_y: -3.0,
            ottava_y: -3.0,
            slur_min_height: 1.0,
            slur_max_height: 5.0,

            divider_left: false,
            divider_right: false,
            divider_width: 2.0,
            divider_height: 1.0,

            no_vertical_stretch: false,
            no_horizontal_stretch: false,
        }
    }
}

impl Style {
    /// Load a style from JSON. Keys that are missing keep their defaults.
    pub fn from_json(json: &str) -> Result<Style, LayoutError> {
        serde_json::from_str(json).map_err(LayoutError::Style)
    }

    /// Resolve a value in spatium units to absolute units.
    pub fn p(&self, sp_value: f64) -> f64 {
        sp_value * self.spatium
    }

    /// Printable system width in absolute units.
    pub fn system_width(&self) -> f64 {
        self.page.printable_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let style = Style::from_json(r#"{"spatium": 6.0, "create_multi_measure_rests": true}"#)
            .expect("partial style should parse");
        assert_eq!(style.spatium, 6.0);
        assert!(style.create_multi_measure_rests);
        assert_eq!(style.min_empty_measures, 2);
        assert_eq!(style.page, PageFormat::default());
    }

    #[test]
    fn nested_page_format_is_partial_too() {
        let style = Style::from_json(r#"{"page": {"height": 400.0}}"#).unwrap();
        assert_eq!(style.page.height, 400.0);
        assert_eq!(style.page.width, PageFormat::default().width);
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = Style::from_json("{ not json").unwrap_err();
        assert!(err.to_string().starts_with("Invalid style configuration"));
    }

    #[test]
    fn spatium_scaling() {
        let style = Style::default();
        assert_eq!(style.p(2.0), 10.0);
    }
}
