//! Flat, serializable view of a laid-out score: pages, systems and the
//! items they hold. This is what crosses the JSON and FFI boundary.

use serde::{Deserialize, Serialize};

use crate::model::{FrameKind, MeasureBase, Score, SystemId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSummary {
    pub pages: Vec<PageSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub no: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub systems: Vec<SystemSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffSummary {
    pub y: f64,
    pub height: f64,
    pub show: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub left_margin: f64,
    pub staves: Vec<StaffSummary>,
    pub items: Vec<ItemSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Measure,
    HBox,
    VBox,
    TBox,
}

/// A measure or frame of a system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub kind: ItemKind,
    pub tick: i32,
    /// Measure number, 0-based; frames carry none
    pub no: Option<i32>,
    /// Measures a multi-measure rest stands for
    pub mm_rest_count: Option<i32>,
    /// Relative to the system
    pub x: f64,
    pub width: f64,
}

impl LayoutSummary {
    pub fn from_score(score: &Score) -> Self {
        let pages = score
            .pages
            .iter()
            .map(|p| PageSummary {
                no: p.no,
                x: p.x,
                y: p.y,
                width: p.width,
                height: p.height,
                systems: p.systems.iter().map(|s| system_summary(score, *s)).collect(),
            })
            .collect();
        LayoutSummary { pages }
    }

    pub fn system_count(&self) -> usize {
        self.pages.iter().map(|p| p.systems.len()).sum()
    }
}

fn system_summary(score: &Score, sid: SystemId) -> SystemSummary {
    let system = score.system(sid);
    let items = system
        .measures
        .iter()
        .map(|&id| match score.mb(id) {
            MeasureBase::Measure(m) => ItemSummary {
                kind: ItemKind::Measure,
                tick: m.tick,
                no: Some(m.no),
                mm_rest_count: m.is_mm_rest().then_some(m.mm_rest_count),
                x: m.x,
                width: m.width,
            },
            MeasureBase::Frame(f) => ItemSummary {
                kind: match f.kind {
                    FrameKind::HBox => ItemKind::HBox,
                    FrameKind::VBox => ItemKind::VBox,
                    FrameKind::TBox => ItemKind::TBox,
                },
                tick: f.tick,
                no: None,
                mm_rest_count: None,
                x: f.x,
                width: f.width,
            },
        })
        .collect();
    SystemSummary {
        x: system.x,
        y: system.y,
        width: system.width,
        height: system.height,
        left_margin: system.left_margin,
        staves: system.staves.iter().map(|s| StaffSummary { y: s.y, height: s.height, show: s.show }).collect(),
        items,
    }
}
