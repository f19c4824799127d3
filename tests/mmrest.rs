//! Integration tests for multi-measure rests: run detection, run breaks
//! and the substitute measure that replaces a run in the layout.

use pretty_assertions::assert_eq;
use scorelayout::summary::ItemKind;
use scorelayout::{
    layout_score, Annotation, AnnotationKind, ChordSpec, ClefType, DiscardLog, DurationType, Fraction, Layout,
    LayoutSummary, MeasureId, Score, ScoreBuilder, StandardGlyphs, Style,
};

fn mm_style() -> Style {
    Style { create_multi_measure_rests: true, ..Style::default() }
}

/// One staff; `true` entries are whole-measure rests, `false` get a note.
fn score_of(style: Style, rests: &[bool]) -> (ScoreBuilder, Vec<MeasureId>) {
    let mut b = ScoreBuilder::new(style);
    b.add_staff(0, ClefType::G);
    let mut ids = Vec::new();
    for &rest in rests {
        let m = b.add_measure(Fraction::new(4, 4));
        if rest {
            b.add_measure_rest(m, 0);
        } else {
            b.add_chord(m, 0, ChordSpec::new(DurationType::Whole, &[4]));
        }
        ids.push(m);
    }
    (b, ids)
}

/// (measure number, multi-measure rest count) of every laid-out item.
fn items(score: &Score) -> Vec<(Option<i32>, Option<i32>)> {
    let summary = LayoutSummary::from_score(score);
    summary
        .pages
        .iter()
        .flat_map(|p| p.systems.iter())
        .flat_map(|s| s.items.iter())
        .filter(|i| i.kind == ItemKind::Measure)
        .map(|i| (i.no, i.mm_rest_count))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Runs
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn empty_measures_collapse_into_one_rest() {
    let (b, ids) = score_of(mm_style(), &[true; 4]);
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(items(&score), vec![(Some(0), Some(4))]);
    let mmr = score.measure(ids[0]).and_then(|m| m.mm_rest).expect("substitute measure");
    let sub = score.measure(mmr).expect("substitute is a measure");
    assert_eq!(sub.tick, 0);
    assert_eq!(sub.end_tick(), 4 * 1920);
    for &id in &ids[1..] {
        assert_eq!(score.measure(id).map(|m| m.mm_rest_count), Some(-1));
    }
}

#[test]
fn a_note_splits_the_run() {
    let (b, _) = score_of(mm_style(), &[true, true, false, true]);
    let mut score = b.build();
    layout_score(&mut score);

    // the single trailing rest is below the minimum run length
    assert_eq!(items(&score), vec![(Some(0), Some(2)), (Some(2), None), (Some(3), None)]);
}

#[test]
fn rehearsal_mark_starts_a_new_run() {
    let (mut b, ids) = score_of(mm_style(), &[true; 4]);
    let tick = 2 * 1920;
    b.add_annotation(ids[2], tick, Annotation::new(AnnotationKind::RehearsalMark, 0, "A"));
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(items(&score), vec![(Some(0), Some(2)), (Some(2), Some(2))]);
}

#[test]
fn disabled_style_keeps_every_measure() {
    let (b, _) = score_of(Style::default(), &[true; 4]);
    let mut score = b.build();
    layout_score(&mut score);

    let nos: Vec<Option<i32>> = items(&score).into_iter().map(|(no, _)| no).collect();
    assert_eq!(nos, vec![Some(0), Some(1), Some(2), Some(3)]);
}

#[test]
fn relayout_reuses_the_substitute() {
    let (b, ids) = score_of(mm_style(), &[true; 3]);
    let mut score = b.build();
    layout_score(&mut score);
    let first = score.measure(ids[0]).and_then(|m| m.mm_rest);
    let before = items(&score);

    layout_score(&mut score);
    assert_eq!(score.measure(ids[0]).and_then(|m| m.mm_rest), first);
    assert_eq!(items(&score), before);
}

// ═══════════════════════════════════════════════════════════════════════
// Eligibility queries
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn only_rest_measures_are_eligible() {
    let (b, ids) = score_of(mm_style(), &[true, false]);
    let mut score = b.build();
    let mut log = DiscardLog;
    let layout = Layout::new(&mut score, &StandardGlyphs, &mut log);

    assert!(layout.valid_mm_rest_measure(ids[0]));
    assert!(!layout.valid_mm_rest_measure(ids[1]));
}

#[test]
fn irregular_measures_are_not_eligible() {
    let (b, ids) = score_of(mm_style(), &[true]);
    let mut score = b.build();
    if let Some(m) = score.measure_mut(ids[0]) {
        m.irregular = true;
    }
    let mut log = DiscardLog;
    let layout = Layout::new(&mut score, &StandardGlyphs, &mut log);

    assert!(!layout.valid_mm_rest_measure(ids[0]));
}

#[test]
fn repeats_and_section_breaks_break_a_run() {
    let (b, ids) = score_of(mm_style(), &[true; 4]);
    let mut score = b.build();
    if let Some(m) = score.measure_mut(ids[1]) {
        m.repeat_start = true;
    }
    if let Some(m) = score.measure_mut(ids[2]) {
        m.section_break = Some(Default::default());
    }
    let mut log = DiscardLog;
    let layout = Layout::new(&mut score, &StandardGlyphs, &mut log);

    assert!(layout.break_multi_measure_rest(ids[1]));
    assert!(!layout.break_multi_measure_rest(ids[2]));
    assert!(layout.break_multi_measure_rest(ids[3]));
}
