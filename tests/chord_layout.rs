//! Integration tests for chord layout: notehead mirroring, voice offsets,
//! dot placement and accidental stacking, observed after a full layout.

use pretty_assertions::assert_eq;
use scorelayout::{
    layout_score, AccidentalType, ChordRestId, ChordSpec, ClefType, Direction, DurationType, Fraction, MeasureId,
    NoteId, Score, ScoreBuilder, Style, TDuration,
};

fn single_staff() -> (ScoreBuilder, MeasureId) {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let m = b.add_measure(Fraction::new(4, 4));
    (b, m)
}

fn note_on_line(score: &Score, chord: ChordRestId, line: i32) -> NoteId {
    *score
        .chord_notes(chord)
        .iter()
        .find(|n| score.note(**n).line == line)
        .unwrap_or_else(|| panic!("no note on line {line}"))
}

// ═══════════════════════════════════════════════════════════════════════
// Stem direction and mirroring
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn stem_direction_follows_the_middle_line() {
    let (mut b, m) = single_staff();
    let low = b.add_chord(m, 0, ChordSpec::new(DurationType::Half, &[8]));
    let high = b.add_chord(m, 0, ChordSpec::new(DurationType::Half, &[0]));
    let mut score = b.build();
    layout_score(&mut score);

    assert!(score.cr(low).up(), "a note below the middle line points up");
    assert!(!score.cr(high).up(), "a note above the middle line points down");
}

#[test]
fn upper_note_of_a_second_is_mirrored_on_an_up_stem() {
    let (mut b, m) = single_staff();
    let c = b.add_chord(m, 0, ChordSpec::new(DurationType::Whole, &[4, 5]).up());
    let mut score = b.build();
    layout_score(&mut score);

    let lower = note_on_line(&score, c, 5);
    let upper = note_on_line(&score, c, 4);
    assert!(!score.note(lower).mirror);
    assert!(score.note(upper).mirror);
    assert!(score.note(upper).x > score.note(lower).x);
}

#[test]
fn lower_note_of_a_second_is_mirrored_on_a_down_stem() {
    let (mut b, m) = single_staff();
    let c = b.add_chord(m, 0, ChordSpec::new(DurationType::Whole, &[4, 5]).down());
    let mut score = b.build();
    layout_score(&mut score);

    let lower = note_on_line(&score, c, 5);
    let upper = note_on_line(&score, c, 4);
    assert!(score.note(lower).mirror);
    assert!(!score.note(upper).mirror);
    assert!(score.note(lower).x < score.note(upper).x);
}

#[test]
fn a_third_needs_no_mirroring() {
    let (mut b, m) = single_staff();
    let c = b.add_chord(m, 0, ChordSpec::new(DurationType::Whole, &[4, 6]).up());
    let mut score = b.build();
    layout_score(&mut score);

    for &n in score.chord_notes(c) {
        assert!(!score.note(n).mirror);
    }
}

#[test]
fn notes_sit_on_their_staff_line() {
    let (mut b, m) = single_staff();
    let c = b.add_chord(m, 0, ChordSpec::new(DurationType::Whole, &[2, 6]));
    let mut score = b.build();
    layout_score(&mut score);

    let sp = score.spatium();
    let ys: Vec<f64> = score.chord_notes(c).iter().map(|n| score.note(*n).y).collect();
    assert_eq!(ys, vec![3.0 * sp, 1.0 * sp]);
}

// ═══════════════════════════════════════════════════════════════════════
// Voices
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn down_voice_a_second_below_moves_right() {
    let (mut b, m) = single_staff();
    let up = b.add_chord_at(m, 0, 0, ChordSpec::new(DurationType::Quarter, &[3]).up());
    let down = b.add_chord_at(m, 1, 0, ChordSpec::new(DurationType::Quarter, &[4]).down());
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(score.cr(up).x, 0.0);
    assert!(score.cr(down).x > 0.0, "down voice x = {}", score.cr(down).x);
}

#[test]
fn voices_apart_keep_their_column() {
    let (mut b, m) = single_staff();
    let up = b.add_chord_at(m, 0, 0, ChordSpec::new(DurationType::Quarter, &[1]).up());
    let down = b.add_chord_at(m, 1, 0, ChordSpec::new(DurationType::Quarter, &[8]).down());
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(score.cr(up).x, 0.0);
    assert_eq!(score.cr(down).x, 0.0);
}

// ═══════════════════════════════════════════════════════════════════════
// Dots and accidentals
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn dot_of_a_line_note_above_a_space_note_moves_up() {
    let (mut b, m) = single_staff();
    let spec = ChordSpec::new(TDuration::dotted(DurationType::Quarter, 1), &[4, 5]).up();
    let c = b.add_chord(m, 0, spec);
    let mut score = b.build();
    layout_score(&mut score);

    let line_note = note_on_line(&score, c, 4);
    let space_note = note_on_line(&score, c, 5);
    assert_eq!(score.note(line_note).dot_y, Direction::Up);
    assert_eq!(score.note(space_note).dot_y, Direction::Auto);
}

#[test]
fn accidental_is_placed_left_of_its_note() {
    let (mut b, m) = single_staff();
    let c = b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[3]).accidental(3, AccidentalType::Sharp));
    let mut score = b.build();
    layout_score(&mut score);

    let n = note_on_line(&score, c, 3);
    let acc = score.note(n).accidental.as_ref().map(|a| a.x);
    assert!(acc.is_some_and(|x| x < 0.0), "accidental x = {acc:?}");
}

#[test]
fn accidentals_of_a_second_use_two_columns() {
    let (mut b, m) = single_staff();
    let spec = ChordSpec::new(DurationType::Whole, &[4, 5])
        .up()
        .accidental(4, AccidentalType::Flat)
        .accidental(5, AccidentalType::Flat);
    let c = b.add_chord(m, 0, spec);
    let mut score = b.build();
    layout_score(&mut score);

    let x_of = |line: i32| {
        let n = note_on_line(&score, c, line);
        let note = score.note(n);
        note.x + note.accidental.as_ref().map_or(0.0, |a| a.x)
    };
    assert!((x_of(4) - x_of(5)).abs() > 1e-6, "both flats landed in one column");
    assert!(x_of(4) < 0.0 && x_of(5) < 0.0);
}
