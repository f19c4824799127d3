//! Integration tests for system and page layout: breaking measures into
//! systems, systems onto pages, headers, hidden staves, frames, spanners
//! and partial relayout.

use pretty_assertions::assert_eq;
use scorelayout::{
    layout_score, relayout_range, BarLineType, ChordSpec, ClefType, DurationType, Fraction, Frame, FrameKind,
    LayoutError, LayoutMode, LayoutSummary, MeasureId, Score, ScoreBuilder, SegmentElement, SegmentType, Spanner,
    SpannerKind, SpannerSegmentType, Style, VOICES,
};

const EPS: f64 = 1e-6;
const BAR: i32 = 1920;

/// One staff of `n` common-time measures with four quarter notes each.
fn quarters(style: Style, n: usize) -> (ScoreBuilder, Vec<MeasureId>) {
    let mut b = ScoreBuilder::new(style);
    b.add_staff(0, ClefType::G);
    let mut ids = Vec::new();
    for _ in 0..n {
        let m = b.add_measure(Fraction::new(4, 4));
        for _ in 0..4 {
            b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4]));
        }
        ids.push(m);
    }
    (b, ids)
}

fn break_every_measure(score: &mut Score, ids: &[MeasureId]) {
    for id in ids {
        if let Some(m) = score.measure_mut(*id) {
            m.line_break = true;
        }
    }
}

fn measure_counts(score: &Score) -> Vec<usize> {
    score.system_list.iter().map(|s| score.system(*s).measures.len()).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Systems
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn empty_score_gets_one_blank_page() {
    let mut score = ScoreBuilder::new(Style::default()).build();
    layout_score(&mut score);

    assert_eq!(score.pages.len(), 1);
    assert!(score.pages[0].systems.is_empty());
    assert_eq!(score.pages[0].width, score.style.page.width);
}

#[test]
fn line_breaks_end_systems() {
    let (b, ids) = quarters(Style::default(), 4);
    let mut score = b.build();
    if let Some(m) = score.measure_mut(ids[0]) {
        m.line_break = true;
    }
    layout_score(&mut score);

    assert_eq!(measure_counts(&score)[0], 1);
    assert_eq!(score.measure(ids[1]).and_then(|m| m.system), Some(score.system_list[1]));
}

#[test]
fn every_measure_lands_in_exactly_one_system() {
    let (b, ids) = quarters(Style::default(), 30);
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(measure_counts(&score).iter().sum::<usize>(), ids.len());
    assert!(score.system_list.len() > 1);
    for id in ids {
        let sid = score.measure(id).and_then(|m| m.system).expect("placed");
        assert!(score.system(sid).measures.contains(&id));
    }
}

#[test]
fn later_systems_start_with_a_header() {
    let (mut b, ids) = quarters(Style::default(), 2);
    b.set_key(ids[0], 0, 2);
    let mut score = b.build();
    if let Some(m) = score.measure_mut(ids[0]) {
        m.line_break = true;
    }
    layout_score(&mut score);

    let m = score.measure(ids[1]).expect("measure");
    assert!(m.has_system_header);
    for ty in [SegmentType::Clef, SegmentType::KeySig] {
        let seg = m.find_segment(ty, m.tick).map(|s| &m.segments[s]);
        let generated = seg.and_then(|s| s.element(0)).is_some_and(|e| e.generated());
        assert!(generated, "missing generated {ty:?}");
    }
    // the time signature is not repeated
    assert!(m.find_segment(SegmentType::TimeSig, m.tick).is_none());
}

#[test]
fn header_is_dropped_when_a_measure_moves_inside_a_system() {
    let (b, ids) = quarters(Style::default(), 2);
    let mut score = b.build();
    if let Some(m) = score.measure_mut(ids[0]) {
        m.line_break = true;
    }
    layout_score(&mut score);
    assert!(score.measure(ids[1]).is_some_and(|m| m.has_system_header));

    if let Some(m) = score.measure_mut(ids[0]) {
        m.line_break = false;
    }
    layout_score(&mut score);
    let m = score.measure(ids[1]).expect("measure");
    assert!(!m.has_system_header);
    assert!(m.find_segment(SegmentType::Clef, m.tick).is_none());
}

#[test]
fn last_measure_ends_with_a_final_barline() {
    let (b, ids) = quarters(Style::default(), 2);
    let mut score = b.build();
    layout_score(&mut score);

    let last = score.measure(ids[1]).expect("measure");
    let seg = last.end_barline_segment().map(|s| &last.segments[s]).expect("end barline");
    let barline = seg.element(0).and_then(|e| match e {
        SegmentElement::BarLine(b) => Some(b.ty),
        _ => None,
    });
    assert_eq!(barline, Some(BarLineType::End));
}

#[test]
fn empty_staves_are_hidden_after_the_first_system() {
    let style = Style { hide_empty_staves: true, ..Style::default() };
    let mut b = ScoreBuilder::new(style);
    b.add_staff(0, ClefType::G);
    b.add_staff(1, ClefType::F);
    let mut ids = Vec::new();
    for _ in 0..2 {
        let m = b.add_measure(Fraction::new(4, 4));
        b.add_chord(m, 0, ChordSpec::new(DurationType::Whole, &[4]));
        b.add_measure_rest(m, VOICES);
        ids.push(m);
    }
    let mut score = b.build();
    if let Some(m) = score.measure_mut(ids[0]) {
        m.line_break = true;
    }
    layout_score(&mut score);

    let (s1, s2) = (score.system(score.system_list[0]), score.system(score.system_list[1]));
    assert!(s1.staves[1].show, "the first system keeps every staff");
    assert!(!s2.staves[1].show);
    assert!(s2.height < s1.height);
    assert!((s2.height - 4.0 * score.spatium()).abs() < EPS);
}

#[test]
fn second_staff_of_a_system_sits_below_the_first() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    b.add_staff(0, ClefType::F);
    let m = b.add_measure(Fraction::new(4, 4));
    b.add_measure_rest(m, 0);
    b.add_measure_rest(m, VOICES);
    let mut score = b.build();
    layout_score(&mut score);

    let system = score.system(score.system_list[0]);
    let min_gap = 4.0 * score.spatium() + score.style.p(score.style.akkolade_distance);
    assert!(system.staves[1].y >= min_gap - EPS);
    assert!(system.left_margin > 0.0, "two staves get a bracket column");
}

// ═══════════════════════════════════════════════════════════════════════
// Pages
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn page_break_starts_a_new_page() {
    let (b, ids) = quarters(Style::default(), 4);
    let mut score = b.build();
    if let Some(m) = score.measure_mut(ids[0]) {
        m.page_break = true;
    }
    layout_score(&mut score);

    assert_eq!(score.pages.len(), 2);
    assert_eq!(score.pages[0].systems.len(), 1);
    assert_eq!(score.system(score.pages[0].systems[0]).measures, vec![ids[0]]);
    let page1 = &score.pages[1];
    assert!(page1.x > score.pages[0].x + score.pages[0].width);
}

#[test]
fn systems_overflow_onto_following_pages() {
    let (b, ids) = quarters(Style::default(), 40);
    let mut score = b.build();
    break_every_measure(&mut score, &ids);
    layout_score(&mut score);

    assert!(score.pages.len() >= 2, "{} pages", score.pages.len());
    let summary = LayoutSummary::from_score(&score);
    assert_eq!(summary.system_count(), 40);

    let page = &score.style.page;
    for p in &score.pages {
        let mut last_bottom = f64::MIN;
        for &sid in &p.systems {
            let s = score.system(sid);
            assert!(s.y >= page.top_margin - EPS);
            assert!(s.y + s.height <= page.height - page.bottom_margin + EPS);
            assert!(s.y > last_bottom, "systems overlap");
            last_bottom = s.y + s.height;
        }
    }
}

#[test]
fn stretched_gaps_stay_within_the_maximum_distance() {
    let (b, ids) = quarters(Style::default(), 3);
    let mut score = b.build();
    break_every_measure(&mut score, &ids);
    layout_score(&mut score);

    let max = score.style.p(score.style.max_system_distance);
    let systems = &score.pages[0].systems;
    for w in systems.windows(2) {
        let (a, b) = (score.system(w[0]), score.system(w[1]));
        let gap = b.y - (a.y + a.height);
        assert!(gap <= max + EPS, "gap {gap} exceeds {max}");
    }
}

#[test]
fn dividers_mark_stretched_gaps() {
    let style = Style { divider_left: true, ..Style::default() };
    let (b, ids) = quarters(style, 40);
    let mut score = b.build();
    break_every_measure(&mut score, &ids);
    layout_score(&mut score);

    let first = score.system(score.pages[0].systems[0]);
    let divider = first.divider_left.expect("divider below the first system");
    assert_eq!(divider.x, 0.0);
    assert!(divider.y > first.height);
    assert!(first.divider_right.is_none());
}

#[test]
fn system_mode_uses_one_endless_page() {
    let (b, ids) = quarters(Style::default(), 40);
    let mut score = b.build();
    break_every_measure(&mut score, &ids);
    score.layout_mode = LayoutMode::System;
    layout_score(&mut score);

    assert_eq!(score.pages.len(), 1);
    assert_eq!(score.pages[0].systems.len(), 40);
    assert!(score.pages[0].height > score.style.page.height);
}

#[test]
fn vertical_frame_gets_a_system_of_its_own() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let mut frame = Frame::new(FrameKind::VBox, 0);
    frame.box_height = 10.0;
    b.add_frame(frame);
    let m = b.add_measure(Fraction::new(4, 4));
    b.add_measure_rest(m, 0);
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(score.system_list.len(), 2);
    let title = score.system(score.system_list[0]);
    assert!(title.vbox);
    assert!((title.height - score.style.p(10.0)).abs() < EPS);
    assert_eq!(score.system(score.system_list[1]).measures, vec![m]);
}

// ═══════════════════════════════════════════════════════════════════════
// Spanners
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn open_tie_connects_to_the_next_equal_pitch() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let m = b.add_measure(Fraction::new(2, 4));
    let c1 = b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4]));
    let c2 = b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4]));
    let (n1, n2) = (b.score_mut().chord_notes(c1)[0], b.score_mut().chord_notes(c2)[0]);
    let tie = b.add_tie(n1, None);
    let mut score = b.build();
    layout_score(&mut score);

    let sp = score.spanner(tie).expect("tie kept");
    assert_eq!(sp.end_note, Some(n2));
    assert_eq!(score.note(n2).tie_back, Some(tie));
    assert_eq!(sp.segments.len(), 1);
}

#[test]
fn tie_without_a_partner_is_dropped() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let m = b.add_measure(Fraction::new(2, 4));
    let c1 = b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4]));
    b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[2]));
    let n1 = b.score_mut().chord_notes(c1)[0];
    let tie = b.add_tie(n1, None);
    let mut score = b.build();
    layout_score(&mut score);

    assert!(score.spanner(tie).is_none());
    assert_eq!(score.note(n1).tie_for, None);
}

#[test]
fn slur_across_a_line_break_is_split() {
    let (mut b, ids) = quarters(Style::default(), 2);
    let slur = b.add_spanner(Spanner::new(SpannerKind::Slur, 0, 960, BAR + 960));
    let mut score = b.build();
    if let Some(m) = score.measure_mut(ids[0]) {
        m.line_break = true;
    }
    layout_score(&mut score);

    let sp = score.spanner(slur).expect("slur");
    let types: Vec<SpannerSegmentType> = sp.segments.iter().map(|s| s.ty).collect();
    assert_eq!(types, vec![SpannerSegmentType::Begin, SpannerSegmentType::End]);
    assert_eq!(sp.segments[0].system, score.system_list[0]);
    assert_eq!(sp.segments[1].system, score.system_list[1]);
}

// ═══════════════════════════════════════════════════════════════════════
// Partial relayout
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn range_relayout_keeps_an_unchanged_layout() {
    let (b, _) = quarters(Style::default(), 30);
    let mut score = b.build();
    layout_score(&mut score);
    let before = measure_counts(&score);
    let pages = score.pages.len();

    relayout_range(&mut score, 5 * BAR, 6 * BAR).expect("tick inside the score");
    assert_eq!(measure_counts(&score), before);
    assert_eq!(score.pages.len(), pages);
}

#[test]
fn range_relayout_picks_up_a_new_line_break() {
    let (b, ids) = quarters(Style::default(), 30);
    let mut score = b.build();
    layout_score(&mut score);
    let before = score.system_list.len();

    if let Some(m) = score.measure_mut(ids[1]) {
        m.line_break = true;
    }
    relayout_range(&mut score, BAR, 2 * BAR).expect("tick inside the score");
    assert_eq!(measure_counts(&score)[0], 2);
    assert!(score.system_list.len() >= before);
    assert_eq!(measure_counts(&score).iter().sum::<usize>(), ids.len());
}

#[test]
fn range_relayout_rejects_a_tick_before_the_score() {
    let (b, _) = quarters(Style::default(), 2);
    let mut score = b.build();
    layout_score(&mut score);

    let err = relayout_range(&mut score, -10, 0).unwrap_err();
    assert!(matches!(err, LayoutError::UnknownTick(-10)));
}
