//! Structural edits issued by the layout.
//!
//! Layout creates and removes generated content (system header clefs and
//! key signatures, courtesy signatures, barlines, multi-measure rests).
//! Each such edit is a [`Change`]: applied to the score, then handed to a
//! [`ChangeLog`] so that the editing layer can make it reversible. Every
//! change carries what it replaced, so [`Change::inverse`] restores the
//! previous state. Geometry (positions, widths, shapes) never goes through
//! here.

use serde::{Deserialize, Serialize};

use crate::model::{
    Annotation, BarLineType, ClefType, KeySigEvent, MeasureId, Score, Segment, SegmentElement,
    SegmentType,
};

/// Address of a segment within a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRef {
    pub measure: MeasureId,
    pub seg_type: SegmentType,
    pub tick: i32,
}

impl SegmentRef {
    pub fn new(measure: MeasureId, seg_type: SegmentType, tick: i32) -> Self {
        SegmentRef { measure, seg_type, tick }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    /// Put an element into a track slot, creating the segment if needed
    AddElement {
        at: SegmentRef,
        track: usize,
        element: SegmentElement,
    },
    /// Clear a track slot; an emptied segment is dropped
    RemoveElement {
        at: SegmentRef,
        track: usize,
        element: SegmentElement,
    },
    /// Insert a whole segment in sort order
    AddSegment {
        at: SegmentRef,
        segment: Segment,
    },
    /// Drop a whole segment with everything in it
    RemoveSegment {
        at: SegmentRef,
        segment: Segment,
    },
    ChangeKeySig {
        at: SegmentRef,
        track: usize,
        event: KeySigEvent,
        old: KeySigEvent,
    },
    ChangeClefType {
        at: SegmentRef,
        track: usize,
        ty: ClefType,
        old: ClefType,
    },
    ChangeBarLineType {
        at: SegmentRef,
        track: usize,
        ty: BarLineType,
        old: BarLineType,
        generated: bool,
        old_generated: bool,
    },
    /// Attach or detach the multi-measure rest substitute of a measure
    ChangeMMRest {
        measure: MeasureId,
        mm_rest: Option<MeasureId>,
        old: Option<MeasureId>,
    },
    AddAnnotation {
        at: SegmentRef,
        annotation: Annotation,
    },
    RemoveAnnotation {
        at: SegmentRef,
        annotation: Annotation,
    },
}

impl Change {
    /// The change that undoes this one.
    pub fn inverse(&self) -> Change {
        match self.clone() {
            Change::AddElement { at, track, element } => Change::RemoveElement { at, track, element },
            Change::RemoveElement { at, track, element } => Change::AddElement { at, track, element },
            Change::AddSegment { at, segment } => Change::RemoveSegment { at, segment },
            Change::RemoveSegment { at, segment } => Change::AddSegment { at, segment },
            Change::ChangeKeySig { at, track, event, old } => Change::ChangeKeySig { at, track, event: old, old: event },
            Change::ChangeClefType { at, track, ty, old } => Change::ChangeClefType { at, track, ty: old, old: ty },
            Change::ChangeBarLineType { at, track, ty, old, generated, old_generated } => Change::ChangeBarLineType {
                at,
                track,
                ty: old,
                old: ty,
                generated: old_generated,
                old_generated: generated,
            },
            Change::ChangeMMRest { measure, mm_rest, old } => Change::ChangeMMRest { measure, mm_rest: old, old: mm_rest },
            Change::AddAnnotation { at, annotation } => Change::RemoveAnnotation { at, annotation },
            Change::RemoveAnnotation { at, annotation } => Change::AddAnnotation { at, annotation },
        }
    }
}

/// Receiver of the structural edits made by a layout pass.
pub trait ChangeLog {
    fn record(&mut self, change: Change);
}

/// Keeps every change in order.
#[derive(Debug, Default)]
pub struct RecordingLog {
    pub changes: Vec<Change>,
}

impl ChangeLog for RecordingLog {
    fn record(&mut self, change: Change) {
        self.changes.push(change);
    }
}

/// Drops every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardLog;

impl ChangeLog for DiscardLog {
    fn record(&mut self, _change: Change) {}
}

/// Apply a change to the score. Changes addressing something that no
/// longer exists are ignored.
pub fn apply(score: &mut Score, change: &Change) {
    match change {
        Change::AddElement { at, track, element } => {
            let Some(m) = score.measure_mut(at.measure) else {
                return;
            };
            let s = m.get_segment(at.seg_type, at.tick);
            if let Some(slot) = m.segments[s].elements.get_mut(*track) {
                *slot = Some(element.clone());
            }
        }
        Change::RemoveElement { at, track, .. } => {
            let Some(m) = score.measure_mut(at.measure) else {
                return;
            };
            let Some(s) = m.find_segment(at.seg_type, at.tick) else {
                return;
            };
            if let Some(slot) = m.segments[s].elements.get_mut(*track) {
                *slot = None;
            }
            if m.segments[s].is_empty() && m.segments[s].annotations.is_empty() {
                m.segments.remove(s);
            }
        }
        Change::AddSegment { at, segment } => {
            let Some(m) = score.measure_mut(at.measure) else {
                return;
            };
            if m.find_segment(at.seg_type, at.tick).is_none() {
                let pos = m.segments.partition_point(|s| (s.tick, s.ty) < (at.tick, at.seg_type));
                m.segments.insert(pos, segment.clone());
            }
        }
        Change::RemoveSegment { at, .. } => {
            let Some(m) = score.measure_mut(at.measure) else {
                return;
            };
            if let Some(s) = m.find_segment(at.seg_type, at.tick) {
                m.segments.remove(s);
            }
        }
        Change::ChangeKeySig { at, track, event, .. } => {
            if let Some(SegmentElement::KeySig(k)) = element_mut(score, at, *track) {
                k.event = *event;
            }
        }
        Change::ChangeClefType { at, track, ty, .. } => {
            if let Some(SegmentElement::Clef(c)) = element_mut(score, at, *track) {
                c.ty = *ty;
            }
        }
        Change::ChangeBarLineType { at, track, ty, generated, .. } => {
            if let Some(SegmentElement::BarLine(b)) = element_mut(score, at, *track) {
                b.ty = *ty;
                b.generated = *generated;
            }
        }
        Change::ChangeMMRest { measure, mm_rest, .. } => {
            if let Some(m) = score.measure_mut(*measure) {
                m.mm_rest = *mm_rest;
            }
        }
        Change::AddAnnotation { at, annotation } => {
            let Some(m) = score.measure_mut(at.measure) else {
                return;
            };
            let s = m.get_segment(at.seg_type, at.tick);
            m.segments[s].annotations.push(annotation.clone());
        }
        Change::RemoveAnnotation { at, annotation } => {
            let Some(m) = score.measure_mut(at.measure) else {
                return;
            };
            let Some(s) = m.find_segment(at.seg_type, at.tick) else {
                return;
            };
            let list = &mut m.segments[s].annotations;
            if let Some(pos) = list.iter().position(|a| same_annotation(a, annotation)) {
                list.remove(pos);
            }
        }
    }
}

fn element_mut<'a>(score: &'a mut Score, at: &SegmentRef, track: usize) -> Option<&'a mut SegmentElement> {
    let m = score.measure_mut(at.measure)?;
    let s = m.find_segment(at.seg_type, at.tick)?;
    m.segments[s].element_mut(track)
}

fn same_annotation(a: &Annotation, b: &Annotation) -> bool {
    a.kind.same_kind(&b.kind) && a.track == b.track && a.text == b.text
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BarLine, ClefType, Fraction, ScoreBuilder};
    use crate::style::Style;

    fn one_measure() -> (Score, MeasureId) {
        let mut b = ScoreBuilder::new(Style::default());
        b.add_staff(0, ClefType::G);
        let m = b.add_measure(Fraction::new(4, 4));
        b.add_measure_rest(m, 0);
        (b.build(), m)
    }

    #[test]
    fn inverse_of_inverse_is_the_change() {
        let at = SegmentRef::new(MeasureId(0), SegmentType::EndBarLine, 1920);
        let change = Change::ChangeBarLineType {
            at,
            track: 0,
            ty: BarLineType::End,
            old: BarLineType::Normal,
            generated: true,
            old_generated: false,
        };
        assert_eq!(change.inverse().inverse(), change);
    }

    #[test]
    fn removing_the_last_element_drops_the_segment() {
        let (mut score, m) = one_measure();
        let at = SegmentRef::new(m, SegmentType::EndBarLine, 1920);
        let add = Change::AddElement {
            at,
            track: 0,
            element: SegmentElement::BarLine(BarLine::new(BarLineType::End, true)),
        };
        let before = score.measure(m).map(|m| m.segments.len());

        apply(&mut score, &add);
        assert!(score.measure(m).and_then(|m| m.end_barline_segment()).is_some());

        apply(&mut score, &add.inverse());
        assert!(score.measure(m).and_then(|m| m.end_barline_segment()).is_none());
        assert_eq!(score.measure(m).map(|m| m.segments.len()), before);
    }

    #[test]
    fn changes_to_missing_segments_are_ignored() {
        let (mut score, m) = one_measure();
        let before = score.clone();
        let at = SegmentRef::new(m, SegmentType::KeySig, 0);
        apply(&mut score, &Change::ChangeClefType { at, track: 0, ty: ClefType::F, old: ClefType::G });
        assert_eq!(score, before);
    }
}
