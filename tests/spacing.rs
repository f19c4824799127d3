//! Integration tests for horizontal spacing: natural measure widths,
//! segment order, justification and the spring solver.

use pretty_assertions::assert_eq;
use scorelayout::{
    layout_score, sff2, stretch_for, ChordSpec, ClefType, DurationType, Fraction, LayoutMode, MeasureId, Score,
    ScoreBuilder, Spring, SpringMap, Style,
};

const EPS: f64 = 1e-6;

fn line_score(build: impl FnOnce(&mut ScoreBuilder)) -> Score {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    build(&mut b);
    let mut score = b.build();
    score.layout_mode = LayoutMode::Line;
    layout_score(&mut score);
    score
}

fn width(score: &Score, m: MeasureId) -> f64 {
    score.measure(m).map_or(0.0, |m| m.width)
}

// ═══════════════════════════════════════════════════════════════════════
// Natural widths
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn busier_measures_are_wider() {
    let mut ids = (MeasureId(0), MeasureId(0), MeasureId(0));
    let score = line_score(|b| {
        let sig = Fraction::new(4, 4);
        b.add_measure(sig);
        let whole = b.add_measure(sig);
        b.add_chord(whole, 0, ChordSpec::new(DurationType::Whole, &[4]));
        let quarters = b.add_measure(sig);
        for _ in 0..4 {
            b.add_chord(quarters, 0, ChordSpec::new(DurationType::Quarter, &[4]));
        }
        let sixteenths = b.add_measure(sig);
        for _ in 0..16 {
            b.add_chord(sixteenths, 0, ChordSpec::new(DurationType::D16th, &[4]));
        }
        ids = (whole, quarters, sixteenths);
    });
    let (whole, quarters, sixteenths) = ids;
    assert!(width(&score, whole) < width(&score, quarters));
    assert!(width(&score, quarters) < width(&score, sixteenths));
}

#[test]
fn segments_advance_left_to_right() {
    let mut id = MeasureId(0);
    let score = line_score(|b| {
        id = b.add_measure(Fraction::new(4, 4));
        b.add_chord(id, 0, ChordSpec::new(DurationType::Half, &[4]));
        b.add_chord(id, 0, ChordSpec::new(DurationType::Eighth, &[4]));
        b.add_chord(id, 0, ChordSpec::new(DurationType::Eighth, &[4]));
        b.add_chord(id, 0, ChordSpec::new(DurationType::Quarter, &[4]));
    });
    let m = score.measure(id).expect("measure");
    let xs: Vec<f64> = m.segments.iter().filter(|s| s.enabled).map(|s| s.x).collect();
    assert!(xs.windows(2).all(|w| w[0] <= w[1]), "segment x not monotonic: {xs:?}");
    assert!(m.segments.last().is_some_and(|s| s.x <= m.width));
}

#[test]
fn line_mode_keeps_everything_on_one_system() {
    let score = line_score(|b| {
        for _ in 0..40 {
            let m = b.add_measure(Fraction::new(4, 4));
            for _ in 0..4 {
                b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4]));
            }
        }
    });
    assert_eq!(score.pages.len(), 1);
    assert_eq!(score.system_list.len(), 1);
    let sid = score.system_list[0];
    let system = score.system(sid);
    assert_eq!(system.measures.len(), 40);
    assert!(system.width > score.style.system_width());
    assert!((score.pages[0].width - system.width).abs() < EPS);
}

// ═══════════════════════════════════════════════════════════════════════
// Justification
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn full_systems_are_justified_to_the_page() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    for _ in 0..24 {
        let m = b.add_measure(Fraction::new(4, 4));
        for _ in 0..8 {
            b.add_chord(m, 0, ChordSpec::new(DurationType::Eighth, &[4]));
        }
    }
    let mut score = b.build();
    layout_score(&mut score);

    let system_width = score.style.system_width();
    assert!(score.system_list.len() > 1);
    // every system but the last
    for sid in &score.system_list[..score.system_list.len() - 1] {
        let system = score.system(*sid);
        let mut x = system.left_margin;
        for &mid in &system.measures {
            let mb = score.mb(mid);
            assert!((mb.x() - x).abs() < EPS, "measures must be contiguous");
            x += mb.width();
        }
        assert!((x - system_width).abs() < EPS, "system ends at {x}, page at {system_width}");
    }
}

#[test]
fn short_last_system_stays_ragged() {
    let mut b = ScoreBuilder::new(Style::default());
    b.add_staff(0, ClefType::G);
    let m = b.add_measure(Fraction::new(4, 4));
    b.add_chord(m, 0, ChordSpec::new(DurationType::Whole, &[4]));
    let mut score = b.build();
    layout_score(&mut score);

    let m = score.measure(m).expect("measure");
    assert!(m.x + m.width < score.style.system_width() * 0.5);
}

// ═══════════════════════════════════════════════════════════════════════
// Spring solver
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn spring_force_reaches_the_target_width() {
    let mut springs = SpringMap::new();
    // keyed by the force at which each spring starts to grow
    springs.insert(10.0, Spring { seg: 0, stretch: 1.0, fix: 10.0 });
    springs.insert(5.0, Spring { seg: 1, stretch: 2.0, fix: 10.0 });
    let force = sff2(60.0, 20.0, &springs);
    let total: f64 = springs.iter().map(|(_, s)| (force * s.stretch).max(s.fix)).sum();
    assert!((total - 60.0).abs() < EPS, "total {total}");
}

#[test]
fn doubling_the_duration_does_not_double_the_space() {
    let q = stretch_for(480, 480);
    let h = stretch_for(960, 480);
    assert!(h > q);
    assert!(h < 2.0 * q);
}
