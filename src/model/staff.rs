//! Staves and their tick-indexed clef, key and meter lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::duration::Fraction;
use super::groups::Groups;
use super::segment::{ClefType, KeySigEvent};

/// When a staff may be hidden in a system without content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HideMode {
    /// Follow the `hide_empty_staves` style
    #[default]
    Auto,
    Always,
    Never,
    /// Hide only when every staff of the part is empty
    Instrument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffTimeSig {
    pub sig: Fraction,
    pub stretch: Fraction,
    /// Custom beam grouping; `None` uses the meter's default
    pub groups: Option<Groups>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    /// Index of the owning part; consecutive staves of a part are braced
    pub part: usize,
    pub lines: i32,
    pub mag: f64,
    /// Staff visible at all
    pub show: bool,
    pub hide_when_empty: HideMode,
    /// Keep the staff even when empty
    pub show_if_empty: bool,
    /// Extra distance above the staff, in spatium units
    pub user_dist: f64,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub clefs: BTreeMap<i32, ClefType>,
    pub keys: BTreeMap<i32, KeySigEvent>,
    pub timesigs: BTreeMap<i32, StaffTimeSig>,
}

impl Staff {
    pub fn new(part: usize) -> Self {
        Staff {
            part,
            lines: 5,
            mag: 1.0,
            show: true,
            hide_when_empty: HideMode::Auto,
            show_if_empty: false,
            user_dist: 0.0,
            long_name: None,
            short_name: None,
            clefs: BTreeMap::new(),
            keys: BTreeMap::new(),
            timesigs: BTreeMap::new(),
        }
    }

    pub fn clef(&self, tick: i32) -> ClefType {
        self.clefs.range(..=tick).next_back().map(|(_, c)| *c).unwrap_or_default()
    }

    pub fn key(&self, tick: i32) -> KeySigEvent {
        self.keys.range(..=tick).next_back().map(|(_, k)| *k).unwrap_or_default()
    }

    pub fn timesig(&self, tick: i32) -> Option<&StaffTimeSig> {
        self.timesigs.range(..=tick).next_back().map(|(_, t)| t)
    }

    /// Beam grouping in effect at `tick`.
    pub fn group(&self, tick: i32, measure_sig: Fraction) -> Groups {
        match self.timesig(tick) {
            Some(ts) => ts.groups.clone().unwrap_or_else(|| Groups::endings(ts.sig)),
            None => Groups::endings(measure_sig),
        }
    }

    /// Height from the top to the bottom line, in spatium units.
    pub fn height_sp(&self) -> f64 {
        (self.lines - 1).max(0) as f64 * self.mag
    }
}
