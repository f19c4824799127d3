//! Chords, rests and the per-voice data they share.

use serde::{Deserialize, Serialize};

use super::duration::{DurationType, TDuration};
use super::note::Direction;
use super::{BeamId, ChordRestId, MeasureId, NoteId};
use crate::glyphs::SymId;
use crate::shape::{Rect, Shape};

/// User beam annotation on a chord or rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BeamMode {
    #[default]
    Auto,
    Begin,
    Mid,
    End,
    NoBeam,
    /// Continue the beam but break the 32nd sub-beam
    Begin32,
    /// Continue the beam but break the 64th sub-beam
    Begin64,
}

impl BeamMode {
    /// Modes that keep an active beam running.
    pub fn is_mid(self) -> bool {
        matches!(self, BeamMode::Mid | BeamMode::Begin32 | BeamMode::Begin64)
    }
}

/// Whether a chord's value is read across the following barline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossMeasure {
    #[default]
    Unknown,
    NoCross,
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraceKind {
    Acciaccatura,
    Appoggiatura,
    Grace4,
    Grace16,
    Grace32,
    Grace8After,
    Grace16After,
    Grace32After,
}

impl GraceKind {
    pub fn is_after(self) -> bool {
        matches!(self, GraceKind::Grace8After | GraceKind::Grace16After | GraceKind::Grace32After)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Placement {
    #[default]
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArticulationKind {
    Staccato,
    Tenuto,
    Accent,
    Marcato,
    Fermata,
    LongFermata,
    ShortFermata,
}

impl ArticulationKind {
    /// Playback stretch applied to the chord's duration.
    pub fn time_stretch(self) -> f64 {
        match self {
            ArticulationKind::Fermata => 2.0,
            ArticulationKind::LongFermata => 3.0,
            ArticulationKind::ShortFermata => 1.5,
            _ => 1.0,
        }
    }

    pub fn is_fermata(self) -> bool {
        matches!(self, ArticulationKind::Fermata | ArticulationKind::LongFermata | ArticulationKind::ShortFermata)
    }

    pub fn sym(self) -> SymId {
        match self {
            ArticulationKind::Staccato => SymId::ArticStaccato,
            ArticulationKind::Tenuto => SymId::ArticTenuto,
            ArticulationKind::Accent => SymId::ArticAccent,
            ArticulationKind::Marcato => SymId::ArticMarcato,
            ArticulationKind::Fermata => SymId::Fermata,
            ArticulationKind::LongFermata => SymId::FermataLong,
            ArticulationKind::ShortFermata => SymId::FermataShort,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Articulation {
    pub kind: ArticulationKind,
    #[serde(default)]
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lyrics {
    pub text: String,
    /// 0-based verse number
    pub verse: usize,
    pub placement: Placement,
    pub autoplace: bool,
    pub visible: bool,
    /// Offset the user dragged the syllable by
    pub user_y_offset: f64,

    // ── layout output ──
    pub x: f64,
    /// Baseline position relative to the staff top
    pub y: f64,
    pub bbox: Rect,
}

impl Lyrics {
    pub fn new(text: impl Into<String>, verse: usize) -> Self {
        Lyrics {
            text: text.into(),
            verse,
            placement: Placement::Below,
            autoplace: true,
            visible: true,
            user_y_offset: 0.0,
            x: 0.0,
            y: 0.0,
            bbox: Rect::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tremolo {
    /// Two-note tremolo, drawn between this chord and `chord2`
    pub two_notes: bool,
    pub chord2: Option<ChordRestId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    /// Owned notes, lowest pitch first
    pub notes: Vec<NoteId>,
    pub stem_direction: Direction,
    pub no_stem: bool,
    pub small: bool,
    pub grace: Option<GraceKind>,
    /// Owned grace chords, before-graces first
    pub grace_notes: Vec<ChordRestId>,
    pub tremolo: Option<Tremolo>,
    /// Horizontal offset set by the user; a nudged chord keeps its dots
    pub user_x_offset: f64,

    // ── layout output ──
    pub up: bool,
    pub has_stem: bool,
    pub has_hook: bool,
    /// Stem length in absolute units, 0 without a stem
    pub stem_len: f64,
}

impl Chord {
    pub fn new() -> Self {
        Chord {
            notes: Vec::new(),
            stem_direction: Direction::Auto,
            no_stem: false,
            small: false,
            grace: None,
            grace_notes: Vec::new(),
            tremolo: None,
            user_x_offset: 0.0,
            up: true,
            has_stem: false,
            has_hook: false,
            stem_len: 0.0,
        }
    }

    pub fn is_nudged(&self) -> bool {
        self.user_x_offset != 0.0
    }

    pub fn is_grace(&self) -> bool {
        self.grace.is_some()
    }

    pub fn is_grace_before(&self) -> bool {
        self.grace.is_some_and(|g| !g.is_after())
    }

    pub fn is_grace_after(&self) -> bool {
        self.grace.is_some_and(|g| g.is_after())
    }
}

impl Default for Chord {
    fn default() -> Self {
        Chord::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    /// Vertical offset in half spaces from the default rest position
    pub line_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChordRestKind {
    Chord(Chord),
    Rest(Rest),
}

/// An element occupying one track of a chord/rest segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordRest {
    pub track: usize,
    /// Absolute start tick
    pub tick: i32,
    pub duration: TDuration,
    /// Actual length in ticks (a measure rest spans the whole measure)
    pub ticks: i32,
    pub beam_mode: BeamMode,
    pub beam: Option<BeamId>,
    /// Cross-staff displacement in staves
    pub staff_move: i32,
    pub visible: bool,
    pub lyrics: Vec<Lyrics>,
    pub articulations: Vec<Articulation>,
    pub cross_measure: CrossMeasure,
    pub cross_measure_duration: Option<TDuration>,
    pub measure: MeasureId,
    /// Main chord of a grace chord
    pub parent: Option<ChordRestId>,
    pub kind: ChordRestKind,

    // ── layout output ──
    /// Offset from the segment origin
    pub x: f64,
    pub y: f64,
    /// Combined magnification (staff, small, grace)
    pub mag: f64,
    /// Footprint relative to the segment origin
    pub shape: Shape,
}

impl ChordRest {
    pub fn new(measure: MeasureId, track: usize, tick: i32, duration: TDuration, kind: ChordRestKind) -> Self {
        ChordRest {
            track,
            tick,
            duration,
            ticks: duration.ticks(),
            beam_mode: BeamMode::Auto,
            beam: None,
            staff_move: 0,
            visible: true,
            lyrics: Vec::new(),
            articulations: Vec::new(),
            cross_measure: CrossMeasure::default(),
            cross_measure_duration: None,
            measure,
            parent: None,
            kind,
            x: 0.0,
            y: 0.0,
            mag: 1.0,
            shape: Shape::default(),
        }
    }

    pub fn voice(&self) -> usize {
        self.track % super::VOICES
    }

    pub fn staff_idx(&self) -> usize {
        self.track / super::VOICES
    }

    pub fn end_tick(&self) -> i32 {
        self.tick + self.ticks
    }

    pub fn is_chord(&self) -> bool {
        matches!(self.kind, ChordRestKind::Chord(_))
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, ChordRestKind::Rest(_))
    }

    pub fn chord(&self) -> Option<&Chord> {
        match &self.kind {
            ChordRestKind::Chord(c) => Some(c),
            ChordRestKind::Rest(_) => None,
        }
    }

    pub fn chord_mut(&mut self) -> Option<&mut Chord> {
        match &mut self.kind {
            ChordRestKind::Chord(c) => Some(c),
            ChordRestKind::Rest(_) => None,
        }
    }

    pub fn is_grace(&self) -> bool {
        self.chord().is_some_and(|c| c.is_grace())
    }

    /// Chord stem points up. Rests count as up.
    pub fn up(&self) -> bool {
        self.chord().map_or(true, |c| c.up)
    }

    pub fn dots(&self) -> u8 {
        self.duration.dots
    }

    /// Duration used for hook and beam decisions.
    pub fn duration_type(&self) -> DurationType {
        if self.cross_measure == CrossMeasure::First {
            if let Some(d) = self.cross_measure_duration {
                return d.ty;
            }
        }
        self.duration.ty
    }

    pub fn is_full_measure_rest(&self) -> bool {
        self.is_rest() && self.duration.ty == DurationType::Measure
    }
}
