//! Systems (rows of measures) and pages.

use serde::{Deserialize, Serialize};

use super::{MeasureId, SpannerId, SystemId};

/// Vertical placement of one staff within a system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SysStaff {
    /// Top line, relative to the system
    pub y: f64,
    pub height: f64,
    pub show: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemDivider {
    /// Position relative to the system
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub measures: Vec<MeasureId>,
    pub staves: Vec<SysStaff>,
    /// Spanners with a segment in this system
    pub spanners: Vec<SpannerId>,
    /// Room for brackets and instrument names
    pub left_margin: f64,
    /// Instrument names use the long form
    pub long_names: bool,
    /// Index into the score's page list
    pub page: Option<usize>,
    pub divider_left: Option<SystemDivider>,
    pub divider_right: Option<SystemDivider>,
    /// Distance kept below the previous system by a vertical box
    pub vbox: bool,

    // ── layout output ──
    /// Position relative to the page
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl System {
    pub fn first_visible_staff(&self) -> Option<usize> {
        self.staves.iter().position(|s| s.show)
    }

    pub fn last_visible_staff(&self) -> Option<usize> {
        self.staves.iter().rposition(|s| s.show)
    }

    pub fn first_measure(&self) -> Option<MeasureId> {
        self.measures.first().copied()
    }

    pub fn last_measure(&self) -> Option<MeasureId> {
        self.measures.last().copied()
    }

    /// Strip everything a fresh collection pass rebuilds.
    pub fn clear(&mut self) {
        self.measures.clear();
        self.spanners.clear();
        self.page = None;
        self.divider_left = None;
        self.divider_right = None;
        self.vbox = false;
        self.height = 0.0;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 0-based page number
    pub no: usize,
    pub systems: Vec<SystemId>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}
