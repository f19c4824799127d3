//! Auto-beaming rules keyed by time signature and beat position.
//!
//! Each entry marks a position (in 32nd notes from the start of the
//! measure) and packs one action nibble per note value: bits 0-3 for
//! eighths, 4-7 for sixteenths, 8-11 for 32nds. Positions without an entry
//! continue the current beam.

use serde::{Deserialize, Serialize};

use super::chord::BeamMode;
use super::duration::{DurationType, Fraction, DIVISION};

const ACTION_AUTO: u16 = 0;
const ACTION_BEGIN: u16 = 1;
const ACTION_BEGIN32: u16 = 2;
const ACTION_BEGIN64: u16 = 3;

/// Ticks per position unit (a 32nd note).
const POS_TICKS: i32 = DIVISION / 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupNode {
    /// Position in 32nd notes
    pub pos: i32,
    pub action: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groups {
    pub nodes: Vec<GroupNode>,
}

fn table(entries: &[(i32, u16)]) -> Groups {
    Groups { nodes: entries.iter().map(|&(pos, action)| GroupNode { pos, action }).collect() }
}

impl Groups {
    /// Default grouping for a time signature; unknown meters beam freely.
    pub fn endings(sig: Fraction) -> Groups {
        match (sig.numerator, sig.denominator) {
            (2, 2) | (4, 4) => table(&[
                (4, 0x200),
                (8, 0x110),
                (12, 0x200),
                (16, 0x111),
                (20, 0x200),
                (24, 0x110),
                (28, 0x200),
            ]),
            (3, 4) => table(&[(4, 0x200), (8, 0x110), (12, 0x200), (16, 0x110), (20, 0x200)]),
            (2, 4) => table(&[(4, 0x200), (8, 0x110), (12, 0x200)]),
            (6, 8) => table(&[(4, 0x200), (8, 0x200), (12, 0x111), (16, 0x200), (20, 0x200)]),
            (9, 8) => table(&[
                (4, 0x200),
                (8, 0x200),
                (12, 0x111),
                (16, 0x200),
                (20, 0x200),
                (24, 0x111),
                (28, 0x200),
                (32, 0x200),
            ]),
            (12, 8) => table(&[
                (4, 0x200),
                (8, 0x200),
                (12, 0x111),
                (16, 0x200),
                (20, 0x200),
                (24, 0x111),
                (28, 0x200),
                (32, 0x200),
                (36, 0x111),
                (40, 0x200),
                (44, 0x200),
            ]),
            (6, 4) => table(&[
                (4, 0x200),
                (8, 0x110),
                (12, 0x200),
                (16, 0x110),
                (20, 0x200),
                (24, 0x111),
                (28, 0x200),
                (32, 0x110),
                (36, 0x200),
                (40, 0x110),
                (44, 0x200),
            ]),
            (3, 2) => table(&[
                (4, 0x200),
                (8, 0x110),
                (12, 0x200),
                (16, 0x111),
                (20, 0x200),
                (24, 0x110),
                (28, 0x200),
                (32, 0x111),
                (36, 0x200),
                (40, 0x110),
                (44, 0x200),
            ]),
            (5, 4) => table(&[
                (4, 0x200),
                (8, 0x110),
                (12, 0x200),
                (16, 0x110),
                (20, 0x200),
                (24, 0x111),
                (28, 0x200),
                (32, 0x110),
                (36, 0x200),
            ]),
            (7, 8) => table(&[(4, 0x200), (8, 0x200), (12, 0x111), (16, 0x200), (20, 0x111), (24, 0x200)]),
            (5, 8) => table(&[(4, 0x200), (8, 0x200), (12, 0x111), (16, 0x200)]),
            _ => Groups::default(),
        }
    }

    /// Beam mode the rule table prescribes for a note of value `d` starting
    /// `tick` ticks into the measure.
    pub fn beam_mode(&self, tick: i32, d: DurationType) -> BeamMode {
        let shift = match d {
            DurationType::Eighth => 0,
            DurationType::D16th => 4,
            DurationType::D32nd => 8,
            _ => return BeamMode::Auto,
        };
        if tick % POS_TICKS != 0 {
            return BeamMode::Auto;
        }
        let pos = tick / POS_TICKS;
        for node in &self.nodes {
            if node.pos == pos {
                return match (node.action >> shift) & 0xf {
                    ACTION_AUTO => BeamMode::Auto,
                    ACTION_BEGIN => BeamMode::Begin,
                    ACTION_BEGIN32 => BeamMode::Begin32,
                    ACTION_BEGIN64 => BeamMode::Begin64,
                    _ => BeamMode::Auto,
                };
            }
            if node.pos > pos {
                break;
            }
        }
        BeamMode::Auto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_time_breaks_eighths_at_half_bar() {
        let g = Groups::endings(Fraction::new(4, 4));
        assert_eq!(g.beam_mode(0, DurationType::Eighth), BeamMode::Auto);
        assert_eq!(g.beam_mode(480, DurationType::Eighth), BeamMode::Auto);
        assert_eq!(g.beam_mode(960, DurationType::Eighth), BeamMode::Begin);
    }

    #[test]
    fn common_time_breaks_sixteenths_per_beat() {
        let g = Groups::endings(Fraction::new(4, 4));
        assert_eq!(g.beam_mode(480, DurationType::D16th), BeamMode::Begin);
        assert_eq!(g.beam_mode(240, DurationType::D16th), BeamMode::Auto);
        assert_eq!(g.beam_mode(240, DurationType::D32nd), BeamMode::Begin32);
    }

    #[test]
    fn compound_meter_groups_by_dotted_quarter() {
        let g = Groups::endings(Fraction::new(6, 8));
        assert_eq!(g.beam_mode(480, DurationType::Eighth), BeamMode::Auto);
        assert_eq!(g.beam_mode(720, DurationType::Eighth), BeamMode::Begin);
    }

    #[test]
    fn unknown_meter_never_breaks() {
        let g = Groups::endings(Fraction::new(11, 16));
        assert_eq!(g.beam_mode(480, DurationType::Eighth), BeamMode::Auto);
    }
}
