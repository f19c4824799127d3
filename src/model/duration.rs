//! Musical time: ticks, fractions and note values.

use serde::{Deserialize, Serialize};

/// Ticks per quarter note.
pub const DIVISION: i32 = 480;

/// A measure length or time signature, kept unreduced so that 2/2 and 4/4
/// stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    pub numerator: i32,
    pub denominator: i32,
}

impl Fraction {
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Fraction { numerator, denominator }
    }

    pub fn ticks(&self) -> i32 {
        if self.denominator == 0 {
            return 0;
        }
        DIVISION * 4 * self.numerator / self.denominator
    }

    /// Same numerator and denominator (not merely the same value).
    pub fn identical(&self, other: &Fraction) -> bool {
        self.numerator == other.numerator && self.denominator == other.denominator
    }
}

fn gcd(a: i32, b: i32) -> i32 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}

impl std::ops::Add for Fraction {
    type Output = Fraction;

    /// Sum over the least common denominator.
    fn add(self, other: Fraction) -> Fraction {
        if self.numerator == 0 {
            return other;
        }
        if other.numerator == 0 {
            return self;
        }
        let g = gcd(self.denominator, other.denominator).max(1);
        let denominator = self.denominator / g * other.denominator;
        let numerator = self.numerator * (denominator / self.denominator) + other.numerator * (denominator / other.denominator);
        Fraction::new(numerator, denominator)
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Fraction::new(4, 4)
    }
}

/// Notated value of a chord or rest, longest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DurationType {
    Long,
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    D16th,
    D32nd,
    D64th,
    D128th,
    /// Whole-measure rest, whatever the measure length.
    Measure,
}

/// Which notehead shape a duration calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteHeadType {
    Auto,
    Breve,
    Whole,
    Half,
    Quarter,
}

impl DurationType {
    pub fn ticks(self) -> i32 {
        match self {
            DurationType::Long => DIVISION * 16,
            DurationType::Breve => DIVISION * 8,
            DurationType::Whole => DIVISION * 4,
            DurationType::Half => DIVISION * 2,
            DurationType::Quarter => DIVISION,
            DurationType::Eighth => DIVISION / 2,
            DurationType::D16th => DIVISION / 4,
            DurationType::D32nd => DIVISION / 8,
            DurationType::D64th => DIVISION / 16,
            DurationType::D128th => DIVISION / 32,
            DurationType::Measure => 0,
        }
    }

    /// Number of flags (or beams) the value carries.
    pub fn hooks(self) -> u32 {
        match self {
            DurationType::Eighth => 1,
            DurationType::D16th => 2,
            DurationType::D32nd => 3,
            DurationType::D64th => 4,
            DurationType::D128th => 5,
            _ => 0,
        }
    }

    pub fn has_stem(self) -> bool {
        matches!(
            self,
            DurationType::Half
                | DurationType::Quarter
                | DurationType::Eighth
                | DurationType::D16th
                | DurationType::D32nd
                | DurationType::D64th
                | DurationType::D128th
        )
    }

    pub fn head_type(self) -> NoteHeadType {
        match self {
            DurationType::Long | DurationType::Breve => NoteHeadType::Breve,
            DurationType::Whole | DurationType::Measure => NoteHeadType::Whole,
            DurationType::Half => NoteHeadType::Half,
            _ => NoteHeadType::Quarter,
        }
    }

    /// A quarter or anything longer never takes a beam.
    pub fn is_quarter_or_longer(self) -> bool {
        self <= DurationType::Quarter
    }

    const ALL: [DurationType; 10] = [
        DurationType::Long,
        DurationType::Breve,
        DurationType::Whole,
        DurationType::Half,
        DurationType::Quarter,
        DurationType::Eighth,
        DurationType::D16th,
        DurationType::D32nd,
        DurationType::D64th,
        DurationType::D128th,
    ];
}

/// A duration type plus augmentation dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TDuration {
    pub ty: DurationType,
    #[serde(default)]
    pub dots: u8,
}

impl TDuration {
    pub const fn new(ty: DurationType) -> Self {
        TDuration { ty, dots: 0 }
    }

    pub const fn dotted(ty: DurationType, dots: u8) -> Self {
        TDuration { ty, dots }
    }

    pub fn ticks(&self) -> i32 {
        let base = self.ty.ticks();
        let mut total = base;
        let mut add = base;
        for _ in 0..self.dots {
            add /= 2;
            total += add;
        }
        total
    }

    pub fn hooks(&self) -> u32 {
        self.ty.hooks()
    }

    /// The plainest notated value (fewest dots) that spells `ticks` exactly.
    pub fn from_ticks(ticks: i32) -> Option<TDuration> {
        for dots in 0..=3u8 {
            for ty in DurationType::ALL {
                let d = TDuration::dotted(ty, dots);
                if d.ticks() == ticks {
                    return Some(d);
                }
            }
        }
        None
    }
}

impl From<DurationType> for TDuration {
    fn from(ty: DurationType) -> Self {
        TDuration::new(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_values() {
        assert_eq!(TDuration::dotted(DurationType::Quarter, 1).ticks(), 720);
        assert_eq!(TDuration::dotted(DurationType::Half, 2).ticks(), 1680);
    }

    #[test]
    fn spelled_from_ticks() {
        assert_eq!(TDuration::from_ticks(720), Some(TDuration::dotted(DurationType::Quarter, 1)));
        assert_eq!(TDuration::from_ticks(1920), Some(TDuration::new(DurationType::Whole)));
        assert_eq!(TDuration::from_ticks(7), None);
    }

    #[test]
    fn fractions_keep_their_spelling() {
        assert_eq!(Fraction::new(2, 2).ticks(), Fraction::new(4, 4).ticks());
        assert!(!Fraction::new(2, 2).identical(&Fraction::new(4, 4)));
    }
}
