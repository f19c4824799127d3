//! Tempo and time-signature maps fed as a side effect of layout.
//!
//! Both maps are owned by the score and consumed by playback; layout only
//! clears and refills them while it walks the measures in tick order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::duration::Fraction;

/// Default tempo in quarter notes per second (120 BPM).
pub const DEFAULT_TEMPO: f64 = 2.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    /// Tick → quarter notes per second
    pub tempos: BTreeMap<i32, f64>,
    /// Tick → pause in seconds
    pub pauses: BTreeMap<i32, f64>,
}

impl TempoMap {
    pub fn clear(&mut self) {
        self.tempos.clear();
        self.pauses.clear();
    }

    pub fn set_tempo(&mut self, tick: i32, tempo: f64) {
        self.tempos.insert(tick, tempo);
    }

    pub fn set_pause(&mut self, tick: i32, pause: f64) {
        self.pauses.insert(tick, pause);
    }

    pub fn has_tempo_at(&self, tick: i32) -> bool {
        self.tempos.contains_key(&tick)
    }

    /// Tempo in effect at `tick`.
    pub fn tempo(&self, tick: i32) -> f64 {
        self.tempos.range(..=tick).next_back().map_or(DEFAULT_TEMPO, |(_, t)| *t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigEvent {
    /// Actual measure length
    pub timesig: Fraction,
    pub nominal: Fraction,
    /// Measure number the event starts at
    pub bar: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SigMap {
    pub events: BTreeMap<i32, SigEvent>,
}

impl SigMap {
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn add(&mut self, tick: i32, event: SigEvent) {
        self.events.insert(tick, event);
    }

    pub fn timesig(&self, tick: i32) -> Option<&SigEvent> {
        self.events.range(..=tick).next_back().map(|(_, e)| e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tempo_lookup_uses_last_event() {
        let mut map = TempoMap::default();
        assert_eq!(map.tempo(100), DEFAULT_TEMPO);
        map.set_tempo(0, 2.0);
        map.set_tempo(960, 1.0);
        assert_eq!(map.tempo(959), 2.0);
        assert_eq!(map.tempo(960), 1.0);
        assert_eq!(map.tempo(5000), 1.0);
    }
}
