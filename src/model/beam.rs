use serde::{Deserialize, Serialize};

use super::ChordRestId;
use crate::shape::Shape;

/// A beam spanning consecutive chords/rests of one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    pub track: usize,
    /// Spanned elements in tick order (non-owning)
    pub elements: Vec<ChordRestId>,
    /// Created by auto-beaming rather than by the user
    pub generated: bool,
    /// Beam over grace chords
    pub grace: bool,

    // ── layout output ──
    pub up: bool,
    /// Elements sit on different staves
    pub cross: bool,
    pub slope: f64,
    /// Beam line endpoints relative to the measure of the first element
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    /// Footprint relative to the first element's segment origin
    pub shape: Shape,
}

impl Beam {
    pub fn new(track: usize) -> Self {
        Beam {
            track,
            elements: Vec::new(),
            generated: true,
            grace: false,
            up: true,
            cross: false,
            slope: 0.0,
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            shape: Shape::new(),
        }
    }
}
