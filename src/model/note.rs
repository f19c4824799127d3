//! Notes and their accidentals.

use serde::{Deserialize, Serialize};

use super::duration::NoteHeadType;
use super::{ChordRestId, SpannerId};
use crate::glyphs::SymId;

/// Horizontal side override for a notehead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DirectionH {
    #[default]
    Auto,
    Left,
    Right,
}

/// Vertical direction, used for stems and dot placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Auto,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoteHeadGroup {
    #[default]
    Normal,
    Cross,
    Diamond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccidentalType {
    Flat,
    Natural,
    Sharp,
    DoubleSharp,
    DoubleFlat,
}

impl AccidentalType {
    pub fn sym(self) -> SymId {
        match self {
            AccidentalType::Flat => SymId::AccidentalFlat,
            AccidentalType::Natural => SymId::AccidentalNatural,
            AccidentalType::Sharp => SymId::AccidentalSharp,
            AccidentalType::DoubleSharp => SymId::AccidentalDoubleSharp,
            AccidentalType::DoubleFlat => SymId::AccidentalDoubleFlat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accidental {
    pub ty: AccidentalType,
    /// Drawn at small size (cautionary accidentals)
    #[serde(default)]
    pub small: bool,
    /// Position relative to the note (layout output)
    #[serde(default)]
    pub x: f64,
}

impl Accidental {
    pub fn new(ty: AccidentalType) -> Self {
        Accidental { ty, small: false, x: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FingeringKind {
    Fingering,
    LhGuitar,
    RhGuitar,
    StringNumber,
}

impl FingeringKind {
    /// Left-hand guitar fingering is positioned by the user only.
    pub fn is_auto_positioned(self) -> bool {
        self != FingeringKind::LhGuitar
    }
}

/// Finger or string number attached to a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingering {
    pub text: String,
    pub kind: FingeringKind,
    pub autoplace: bool,
    /// Offset from the note (layout output)
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Fingering {
    pub fn new(text: impl Into<String>, kind: FingeringKind) -> Self {
        Fingering { text: text.into(), kind, autoplace: true, x: 0.0, y: 0.0 }
    }
}

/// One notehead, owned by exactly one chord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Owning chord
    pub chord: ChordRestId,
    /// MIDI pitch
    pub pitch: i32,
    /// Tonal pitch class (line of fifths, 14 = C)
    pub tpc: i32,
    /// Staff position in half spaces from the top line (y grows downwards)
    pub line: i32,
    pub head_group: NoteHeadGroup,
    /// `Auto` follows the chord's duration
    pub head_type: NoteHeadType,
    pub user_mirror: DirectionH,
    pub user_dot_position: Direction,
    pub visible: bool,
    pub small: bool,
    /// Fixed notes (slash notation) keep their accidental out of the stack
    pub fixed: bool,
    pub accidental: Option<Accidental>,
    pub tie_for: Option<SpannerId>,
    pub tie_back: Option<SpannerId>,
    #[serde(default)]
    pub fingerings: Vec<Fingering>,

    // ── layout output ──
    /// Notehead drawn on the side of the stem opposite to the default
    pub mirror: bool,
    pub dots_hidden: bool,
    /// Resolved dot placement; `Auto` means on the note's own space
    pub dot_y: Direction,
    /// Position relative to the chord
    pub x: f64,
    pub y: f64,
}

impl Note {
    pub fn new(chord: ChordRestId, line: i32, pitch: i32) -> Self {
        Note {
            chord,
            pitch,
            tpc: 14,
            line,
            head_group: NoteHeadGroup::Normal,
            head_type: NoteHeadType::Auto,
            user_mirror: DirectionH::Auto,
            user_dot_position: Direction::Auto,
            visible: true,
            small: false,
            fixed: false,
            accidental: None,
            tie_for: None,
            tie_back: None,
            fingerings: Vec::new(),
            mirror: false,
            dots_hidden: false,
            dot_y: Direction::Auto,
            x: 0.0,
            y: 0.0,
        }
    }

    /// Diatonic pitch class derived from the staff position.
    pub fn pitch_class(&self) -> usize {
        ((self.line + 700) % 7) as usize
    }

    pub fn on_line(&self) -> bool {
        self.line & 1 == 0
    }
}
