//! scorelayout: music notation layout engine.
//!
//! Turns an arena score model (measures, segments, chords, rests, beams,
//! spanners) into positioned geometry: chord and accidental layout, beam
//! grouping, spring-model horizontal spacing, system headers and courtesy
//! signatures, multi-measure rests, and the packing of measures into
//! systems and systems into pages.
//!
//! # Example
//! ```no_run
//! use scorelayout::{layout_score, ClefType, Fraction, ScoreBuilder, Style};
//!
//! let mut b = ScoreBuilder::new(Style::default());
//! b.add_staff(0, ClefType::G);
//! for _ in 0..8 {
//!     let m = b.add_measure(Fraction::new(4, 4));
//!     b.add_measure_rest(m, 0);
//! }
//! let mut score = b.build();
//! layout_score(&mut score);
//! println!("Pages: {}", score.pages.len());
//! ```

pub mod error;
pub mod glyphs;
pub mod layout;
pub mod model;
pub mod shape;
pub mod style;
pub mod summary;
pub mod undo;

#[cfg(target_os = "android")]
pub mod android;

pub use error::LayoutError;
pub use glyphs::{GlyphMetrics, StandardGlyphs, SymId};
pub use layout::{sff2, stretch_for, Layout, LayoutContext, Spring, SpringMap};
pub use model::*;
pub use shape::{Point, Rect, Shape};
pub use style::{PageFormat, Style, VerticalAlignRange};
pub use summary::LayoutSummary;
pub use undo::{Change, ChangeLog, DiscardLog, RecordingLog};

/// Lay out the whole score with the built-in glyph metrics, discarding the
/// structural change log.
pub fn layout_score(score: &mut Score) {
    let mut log = DiscardLog;
    Layout::new(score, &StandardGlyphs, &mut log).do_layout();
}

/// Re-layout the systems touching `[start_tick, end_tick]` of a score that
/// was laid out before.
///
/// Unlike [`Layout::do_layout_range`], which falls back to a full layout,
/// this reports a start tick that lies outside the score.
pub fn relayout_range(score: &mut Score, start_tick: i32, end_tick: i32) -> Result<(), LayoutError> {
    if score.tick2measure(start_tick).is_none() {
        return Err(LayoutError::UnknownTick(start_tick));
    }
    let mut log = DiscardLog;
    Layout::new(score, &StandardGlyphs, &mut log).do_layout_range(start_tick, end_tick);
    Ok(())
}

/// Deserialize a score from JSON, lay it out and return the layout summary
/// as JSON.
pub fn layout_json(json: &str) -> Result<String, LayoutError> {
    let mut score: Score = serde_json::from_str(json).map_err(LayoutError::Score)?;
    layout_score(&mut score);
    let summary = LayoutSummary::from_score(&score);
    serde_json::to_string_pretty(&summary).map_err(LayoutError::Serialize)
}

/// Like [`layout_json`] for raw bytes, which must be UTF-8.
pub fn layout_json_bytes(data: &[u8]) -> Result<String, LayoutError> {
    let json = std::str::from_utf8(data)?;
    layout_json(json)
}

// ═══════════════════════════════════════════════════════════════════════
// C FFI for iOS (static library) and Android (JNI)
// ═══════════════════════════════════════════════════════════════════════

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Lay out a score given as JSON and return the layout summary as JSON.
/// The caller must free the returned string with `scorelayout_free_string`.
/// Returns null on invalid input.
///
/// # Safety
/// `json` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn scorelayout_layout_json(json: *const c_char) -> *mut c_char {
    if json.is_null() {
        return std::ptr::null_mut();
    }
    let c_str = unsafe { CStr::from_ptr(json) };
    let result = c_str.to_str().map_err(LayoutError::from).and_then(layout_json);
    match result {
        Ok(out) => CString::new(out).unwrap_or_default().into_raw(),
        Err(e) => {
            log::warn!("scorelayout_layout_json: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Free a string previously returned by scorelayout functions.
///
/// # Safety
/// `ptr` must be a string previously returned by a scorelayout function, or null.
#[no_mangle]
pub unsafe extern "C" fn scorelayout_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}
