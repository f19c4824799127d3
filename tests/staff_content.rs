//! Integration tests for what a measure carries besides notes: lyrics,
//! fermatas, clef changes, instrument names, shared unison heads, and the
//! lookups and partial passes offered on a laid-out score.

use pretty_assertions::assert_eq;
use scorelayout::{
    layout_score, ArticulationKind, ChordRestId, ChordSpec, ClefType, DiscardLog, DurationType, Fingering,
    FingeringKind, Fraction, Layout, Lyrics, MeasureId, ScoreBuilder, SegmentElement, SegmentType, StandardGlyphs, Style, TDuration, DEFAULT_TEMPO,
};

fn quarters_in_one_measure() -> (ScoreBuilder, MeasureId, Vec<ChordRestId>) {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let m = b.add_measure(Fraction::new(4, 4));
    let crs = (0..4).map(|_| b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4]))).collect();
    (b, m, crs)
}

// ═══════════════════════════════════════════════════════════════════════
// Lyrics and articulations
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn verses_stack_below_the_staff() {
    let (mut b, _, crs) = quarters_in_one_measure();
    b.add_lyrics(crs[0], Lyrics::new("la", 0));
    b.add_lyrics(crs[0], Lyrics::new("lu", 1));
    let mut score = b.build();
    layout_score(&mut score);

    let lyrics = &score.cr(crs[0]).lyrics;
    let staff_height = 4.0 * score.spatium();
    assert!(lyrics[0].y > staff_height, "first verse at {}", lyrics[0].y);
    assert!(lyrics[1].y > lyrics[0].y);
}

#[test]
fn fermata_slows_the_tempo_for_its_note() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let m = b.add_measure(Fraction::new(2, 4));
    b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4]).articulation(ArticulationKind::Fermata));
    b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4]));
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(score.tempo_map.tempo(0), DEFAULT_TEMPO / 2.0);
    assert_eq!(score.tempo_map.tempo(480), DEFAULT_TEMPO);
}

// ═══════════════════════════════════════════════════════════════════════
// Fingerings
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn fingering_sits_above_a_single_staff_note() {
    let (mut b, _, crs) = quarters_in_one_measure();
    let n = b.score_mut().chord_notes(crs[0])[0];
    b.add_fingering(n, Fingering::new("1", FingeringKind::Fingering));
    let mut score = b.build();
    layout_score(&mut score);

    let f = &score.note(n).fingerings[0];
    assert!(f.y < -score.spatium(), "fingering at {}", f.y);
    assert!(!f.autoplace);
}

#[test]
fn fingering_goes_below_on_the_lower_staff_of_a_part() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    b.add_staff(0, ClefType::F);
    let m = b.add_measure(Fraction::new(1, 4));
    b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4]));
    let lower = b.add_chord(m, 4, ChordSpec::new(DurationType::Quarter, &[4]));
    let n = b.score_mut().chord_notes(lower)[0];
    b.add_fingering(n, Fingering::new("5", FingeringKind::Fingering));
    let mut score = b.build();
    layout_score(&mut score);

    assert!(score.note(n).fingerings[0].y > score.spatium());
}

#[test]
fn fingerings_in_a_chord_move_left_only() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let m = b.add_measure(Fraction::new(1, 4));
    let c = b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4, 6]));
    let notes = b.score_mut().chord_notes(c).to_vec();
    for (n, text) in notes.iter().zip(["1", "3"]) {
        b.add_fingering(*n, Fingering::new(text, FingeringKind::Fingering));
    }
    let mut score = b.build();
    layout_score(&mut score);

    let sp = score.spatium();
    for n in notes {
        let f = &score.note(n).fingerings[0];
        assert_eq!((f.x, f.y, f.autoplace), (-sp, 0.0, true));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Clefs and names
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn clef_change_shows_in_the_next_system_header() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let ids: Vec<MeasureId> = (0..2)
        .map(|_| {
            let m = b.add_measure(Fraction::new(4, 4));
            b.add_measure_rest(m, 0);
            m
        })
        .collect();
    b.clef_change(ids[1], 0, ClefType::F);
    let mut score = b.build();
    if let Some(m) = score.measure_mut(ids[0]) {
        m.line_break = true;
    }
    layout_score(&mut score);

    let m = score.measure(ids[1]).expect("measure");
    let clef = m.find_segment(SegmentType::Clef, m.tick).and_then(|s| m.segments[s].element(0)).and_then(|e| match e {
        SegmentElement::Clef(c) => Some((c.ty, c.generated)),
        _ => None,
    });
    assert_eq!(clef, Some((ClefType::F, true)));

    // the change itself is announced small at the end of the previous measure
    let prev = score.measure(ids[0]).expect("measure");
    let small = prev
        .find_segment(SegmentType::Clef, prev.end_tick())
        .and_then(|s| prev.segments[s].element(0))
        .is_some_and(|e| matches!(e, SegmentElement::Clef(c) if c.small && c.ty == ClefType::F));
    assert!(small);
}

#[test]
fn long_names_only_on_the_first_system() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    b.staff_mut(0).long_name = Some("Violin".to_string());
    let ids: Vec<MeasureId> = (0..2)
        .map(|_| {
            let m = b.add_measure(Fraction::new(4, 4));
            b.add_measure_rest(m, 0);
            m
        })
        .collect();
    let mut score = b.build();
    if let Some(m) = score.measure_mut(ids[0]) {
        m.line_break = true;
    }
    layout_score(&mut score);

    let (first, second) = (score.system(score.system_list[0]), score.system(score.system_list[1]));
    assert!(first.long_names);
    assert!(first.left_margin > 0.0);
    assert_eq!(second.left_margin, 0.0);
    assert_eq!(score.measure(ids[0]).map(|m| m.x), Some(first.left_margin));
}

// ═══════════════════════════════════════════════════════════════════════
// Unisons
// ═══════════════════════════════════════════════════════════════════════

fn dotted_unison(nudge: f64) -> usize {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let m = b.add_measure(Fraction::new(3, 4));
    let dotted = TDuration::dotted(DurationType::Quarter, 1);
    let up = b.add_chord_at(m, 0, 0, ChordSpec::new(dotted, &[4]).up());
    let down = b.add_chord_at(m, 1, 0, ChordSpec::new(dotted, &[4]).down().nudge(nudge));
    let mut score = b.build();
    layout_score(&mut score);

    [up, down]
        .iter()
        .flat_map(|c| score.chord_notes(*c).iter())
        .filter(|n| score.note(**n).dots_hidden)
        .count()
}

#[test]
fn shared_unison_keeps_one_set_of_dots() {
    assert_eq!(dotted_unison(0.0), 1);
}

#[test]
fn nudged_unison_keeps_both_dots() {
    assert_eq!(dotted_unison(2.0), 0);
}

// ═══════════════════════════════════════════════════════════════════════
// Lookups and partial passes
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn search_note_finds_the_chord_at_or_before_a_tick() {
    let (b, _, crs) = quarters_in_one_measure();
    let mut score = b.build();
    let mut log = DiscardLog;
    let layout = Layout::new(&mut score, &StandardGlyphs, &mut log);

    assert_eq!(layout.search_note(0, 0), Some(crs[0]));
    assert_eq!(layout.search_note(500, 0), Some(crs[1]));
    assert_eq!(layout.search_note(100_000, 0), Some(crs[3]));
    assert_eq!(layout.search_note(0, 1), None);
}

#[test]
fn spanner_pass_reproduces_tie_segments() {
    let (mut b, _, crs) = quarters_in_one_measure();
    let n = b.score_mut().chord_notes(crs[0])[0];
    let tie = b.add_tie(n, None);
    let mut score = b.build();
    layout_score(&mut score);
    let before = score.spanner(tie).map(|t| t.segments.clone()).expect("tie");
    assert_eq!(before.len(), 1);

    let mut log = DiscardLog;
    Layout::new(&mut score, &StandardGlyphs, &mut log).layout_spanner();
    assert_eq!(score.spanner(tie).map(|t| t.segments.clone()), Some(before));
}
