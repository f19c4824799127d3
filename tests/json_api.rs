//! Integration tests for the serialized surfaces: JSON in, layout summary
//! out, the C entry points and the structural change log.

use std::ffi::{CStr, CString};

use pretty_assertions::assert_eq;
use scorelayout::{
    layout_json, layout_json_bytes, layout_score, scorelayout_free_string, scorelayout_layout_json, Change,
    ChordSpec, ClefType, DurationType, Fraction, Layout, LayoutError, LayoutSummary, RecordingLog, Score,
    ScoreBuilder, SegmentElement, SegmentType, StandardGlyphs, Style,
};

fn small_score() -> Score {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    for _ in 0..3 {
        let m = b.add_measure(Fraction::new(3, 4));
        for _ in 0..3 {
            b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[5]));
        }
    }
    b.build()
}

// ═══════════════════════════════════════════════════════════════════════
// JSON
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn json_layout_matches_in_process_layout() {
    let score = small_score();
    let json = serde_json::to_string(&score).expect("score serializes");

    let out = layout_json(&json).expect("layout succeeds");
    let summary: LayoutSummary = serde_json::from_str(&out).expect("summary parses");

    let mut direct = score;
    layout_score(&mut direct);
    let expected = LayoutSummary::from_score(&direct);
    assert_eq!(summary.pages.len(), 1);
    assert_eq!(summary.system_count(), 1);

    let items = |s: &LayoutSummary| -> Vec<(i32, Option<i32>, f64)> {
        s.pages.iter().flat_map(|p| &p.systems).flat_map(|s| &s.items).map(|i| (i.tick, i.no, i.width)).collect()
    };
    let (got, want) = (items(&summary), items(&expected));
    assert_eq!(got.len(), want.len());
    for ((t1, n1, w1), (t2, n2, w2)) in got.into_iter().zip(want) {
        assert_eq!((t1, n1), (t2, n2));
        assert!((w1 - w2).abs() < 1e-6, "width {w1} vs {w2}");
    }
}

#[test]
fn malformed_json_is_a_score_error() {
    let err = layout_json("{ not json").unwrap_err();
    assert!(matches!(err, LayoutError::Score(_)));
    assert!(err.to_string().starts_with("Invalid score document"));
}

#[test]
fn invalid_utf8_is_rejected() {
    let err = layout_json_bytes(&[b'{', 0xff, 0xfe, b'}']).unwrap_err();
    assert!(matches!(err, LayoutError::Utf8(_)));
}

#[test]
fn bytes_and_str_agree() {
    let json = serde_json::to_string(&small_score()).expect("score serializes");
    let a = layout_json(&json).expect("str");
    let b = layout_json_bytes(json.as_bytes()).expect("bytes");
    assert_eq!(a, b);
}

#[test]
fn style_json_keeps_defaults_for_missing_keys() {
    let style = Style::from_json(r#"{ "spatium": 7.0, "hide_empty_staves": true }"#).expect("valid style");
    assert_eq!(style.spatium, 7.0);
    assert!(style.hide_empty_staves);
    assert_eq!(style.min_empty_measures, Style::default().min_empty_measures);

    let err = Style::from_json(r#"{ "spatium": "big" }"#).unwrap_err();
    assert!(matches!(err, LayoutError::Style(_)));
}

// ═══════════════════════════════════════════════════════════════════════
// C FFI
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn ffi_round_trip() {
    let json = serde_json::to_string(&small_score()).expect("score serializes");
    let input = CString::new(json.clone()).expect("no interior nul");

    let out = unsafe { scorelayout_layout_json(input.as_ptr()) };
    assert!(!out.is_null());
    let text = unsafe { CStr::from_ptr(out) }.to_str().expect("utf-8").to_owned();
    unsafe { scorelayout_free_string(out) };

    assert_eq!(text, layout_json(&json).expect("layout"));
}

#[test]
fn ffi_returns_null_on_bad_input() {
    let out = unsafe { scorelayout_layout_json(std::ptr::null()) };
    assert!(out.is_null());

    let garbage = CString::new("[1, 2").expect("no interior nul");
    let out = unsafe { scorelayout_layout_json(garbage.as_ptr()) };
    assert!(out.is_null());

    // freeing null is a no-op
    unsafe { scorelayout_free_string(std::ptr::null_mut()) };
}

// ═══════════════════════════════════════════════════════════════════════
// Change log
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn generated_barlines_are_recorded() {
    let mut score = small_score();
    let mut log = RecordingLog::default();
    Layout::new(&mut score, &StandardGlyphs, &mut log).do_layout();

    let barlines = log
        .changes
        .iter()
        .filter(|c| {
            matches!(
                c,
                Change::AddElement { at, element: SegmentElement::BarLine(_), .. } if at.seg_type == SegmentType::EndBarLine
            )
        })
        .count();
    assert_eq!(barlines, 3, "one end barline per measure");
}

#[test]
fn second_pass_changes_nothing() {
    let mut score = small_score();
    layout_score(&mut score);

    let mut log = RecordingLog::default();
    Layout::new(&mut score, &StandardGlyphs, &mut log).do_layout();
    assert!(log.changes.is_empty(), "unexpected changes: {:?}", log.changes);
}
