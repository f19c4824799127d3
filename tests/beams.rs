//! Integration tests for auto-beaming: grouping by meter, user beam
//! modes, rests and grace notes.

use pretty_assertions::assert_eq;
use scorelayout::{
    layout_score, BeamMode, ChordRestId, ChordSpec, ClefType, DurationType, Fraction, GraceKind, MeasureId, Score,
    ScoreBuilder, Style,
};

fn measure_in(sig: Fraction) -> (ScoreBuilder, MeasureId) {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let m = b.add_measure(sig);
    (b, m)
}

fn eighth() -> ChordSpec {
    ChordSpec::new(DurationType::Eighth, &[4])
}

/// Beam groups of the given elements, as index lists; unbeamed elements
/// are left out.
fn groups(score: &Score, crs: &[ChordRestId]) -> Vec<Vec<usize>> {
    let mut out: Vec<Vec<usize>> = Vec::new();
    let mut last = None;
    for (i, id) in crs.iter().enumerate() {
        let Some(b) = score.cr(*id).beam else {
            last = None;
            continue;
        };
        if last == Some(b) {
            if let Some(g) = out.last_mut() {
                g.push(i);
            }
        } else {
            out.push(vec![i]);
        }
        last = Some(b);
    }
    out
}

#[test]
fn common_time_eighths_beam_by_half_bar() {
    let (mut b, m) = measure_in(Fraction::new(4, 4));
    let crs: Vec<ChordRestId> = (0..8).map(|_| b.add_chord(m, 0, eighth())).collect();
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(groups(&score, &crs), vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    let first = score.cr(crs[0]).beam.and_then(|b| score.beam(b)).expect("beam");
    assert_eq!(first.elements, crs[..4].to_vec());
}

#[test]
fn compound_meter_beams_by_dotted_quarter() {
    let (mut b, m) = measure_in(Fraction::new(6, 8));
    let crs: Vec<ChordRestId> = (0..6).map(|_| b.add_chord(m, 0, eighth())).collect();
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(groups(&score, &crs), vec![vec![0, 1, 2], vec![3, 4, 5]]);
}

#[test]
fn quarter_note_interrupts_a_beam() {
    let (mut b, m) = measure_in(Fraction::new(4, 4));
    let mut crs = Vec::new();
    crs.push(b.add_chord(m, 0, eighth()));
    crs.push(b.add_chord(m, 0, eighth()));
    crs.push(b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4])));
    crs.push(b.add_chord(m, 0, ChordSpec::new(DurationType::Half, &[4])));
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(groups(&score, &crs), vec![vec![0, 1]]);
    assert!(score.cr(crs[2]).beam.is_none());
}

#[test]
fn rest_breaks_the_beam() {
    let (mut b, m) = measure_in(Fraction::new(2, 4));
    let mut crs = Vec::new();
    crs.push(b.add_chord(m, 0, eighth()));
    crs.push(b.add_chord(m, 0, eighth()));
    crs.push(b.add_rest(m, 0, DurationType::Eighth));
    crs.push(b.add_chord(m, 0, eighth()));
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(groups(&score, &crs), vec![vec![0, 1]]);
    assert!(score.cr(crs[3]).beam.is_none(), "a lone eighth keeps its flag");
}

#[test]
fn user_begin_starts_a_new_beam() {
    let (mut b, m) = measure_in(Fraction::new(2, 4));
    let mut crs = Vec::new();
    crs.push(b.add_chord(m, 0, eighth()));
    crs.push(b.add_chord(m, 0, eighth()));
    crs.push(b.add_chord(m, 0, eighth().beam(BeamMode::Begin)));
    crs.push(b.add_chord(m, 0, eighth()));
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(groups(&score, &crs), vec![vec![0, 1], vec![2, 3]]);
}

#[test]
fn user_no_beam_leaves_a_flag() {
    let (mut b, m) = measure_in(Fraction::new(2, 4));
    let mut crs = Vec::new();
    crs.push(b.add_chord(m, 0, eighth()));
    crs.push(b.add_chord(m, 0, eighth().beam(BeamMode::NoBeam)));
    crs.push(b.add_chord(m, 0, eighth()));
    crs.push(b.add_chord(m, 0, eighth()));
    let mut score = b.build();
    layout_score(&mut score);

    assert_eq!(groups(&score, &crs), vec![vec![2, 3]]);
    let flagged = score.cr(crs[0]).chord().is_some_and(|c| c.has_hook);
    assert!(flagged);
}

#[test]
fn beamed_chords_share_one_stem_direction() {
    let (mut b, m) = measure_in(Fraction::new(2, 4));
    let lines = [8, 0, 7, 1];
    let crs: Vec<ChordRestId> =
        lines.iter().map(|l| b.add_chord(m, 0, ChordSpec::new(DurationType::Eighth, &[*l]))).collect();
    let mut score = b.build();
    layout_score(&mut score);

    let ups: Vec<bool> = crs.iter().map(|c| score.cr(*c).up()).collect();
    assert!(ups.iter().all(|u| *u == ups[0]), "stems differ: {ups:?}");
}

#[test]
fn grace_notes_beam_among_themselves() {
    let (mut b, m) = measure_in(Fraction::new(4, 4));
    let main = b.add_chord(m, 0, ChordSpec::new(DurationType::Whole, &[4]));
    let g1 = b.add_grace(main, GraceKind::Acciaccatura, ChordSpec::new(DurationType::D16th, &[3]));
    let g2 = b.add_grace(main, GraceKind::Acciaccatura, ChordSpec::new(DurationType::D16th, &[2]));
    let mut score = b.build();
    layout_score(&mut score);

    let beam = score.cr(g1).beam;
    assert!(beam.is_some());
    assert_eq!(beam, score.cr(g2).beam);
    assert!(score.cr(main).beam.is_none());
    assert!(beam.and_then(|b| score.beam(b)).is_some_and(|b| b.grace));
}
