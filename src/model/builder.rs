//! Score construction.
//!
//! The layout consumes structurally valid scores: contiguous measure ticks,
//! one slot per track in every segment, chords with sorted notes. The
//! builder is the one place that guarantees this for the editing layer and
//! for tests.

use super::chord::{Articulation, ArticulationKind, BeamMode, Chord, ChordRest, ChordRestKind, GraceKind, Lyrics, Rest};
use super::duration::{DurationType, Fraction, NoteHeadType, TDuration};
use super::measure::{Frame, Measure, MeasureBase};
use super::note::{Accidental, AccidentalType, Direction, DirectionH, Fingering, Note};
use super::segment::{Annotation, Clef, ClefType, KeySig, KeySigEvent, SegmentElement, SegmentType, TimeSig};
use super::spanner::{Spanner, SpannerKind};
use super::staff::{Staff, StaffTimeSig};
use super::{ChordRestId, MeasureId, NoteId, Score, SpannerId, VOICES};
use crate::style::Style;

/// Semitone offset of each diatonic step above C.
const STEP_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
/// Line-of-fifths pitch class of each natural step (C = 14).
const STEP_TPC: [i32; 7] = [14, 16, 18, 13, 15, 17, 19];

/// Notes and options of a chord to add.
#[derive(Debug, Clone)]
pub struct ChordSpec {
    pub duration: TDuration,
    /// Staff lines of the notes, in any order
    pub lines: Vec<i32>,
    pub stem: Direction,
    pub beam_mode: BeamMode,
    pub accidentals: Vec<(i32, AccidentalType)>,
    pub heads: Vec<(i32, NoteHeadType)>,
    pub mirrors: Vec<(i32, DirectionH)>,
    pub small: bool,
    pub no_stem: bool,
    pub staff_move: i32,
    pub user_x_offset: f64,
    pub articulations: Vec<ArticulationKind>,
}

impl ChordSpec {
    pub fn new(duration: impl Into<TDuration>, lines: &[i32]) -> Self {
        ChordSpec {
            duration: duration.into(),
            lines: lines.to_vec(),
            stem: Direction::Auto,
            beam_mode: BeamMode::Auto,
            accidentals: Vec::new(),
            heads: Vec::new(),
            mirrors: Vec::new(),
            small: false,
            no_stem: false,
            staff_move: 0,
            user_x_offset: 0.0,
            articulations: Vec::new(),
        }
    }

    pub fn up(mut self) -> Self {
        self.stem = Direction::Up;
        self
    }

    pub fn down(mut self) -> Self {
        self.stem = Direction::Down;
        self
    }

    pub fn beam(mut self, mode: BeamMode) -> Self {
        self.beam_mode = mode;
        self
    }

    pub fn accidental(mut self, line: i32, ty: AccidentalType) -> Self {
        self.accidentals.push((line, ty));
        self
    }

    pub fn head(mut self, line: i32, ty: NoteHeadType) -> Self {
        self.heads.push((line, ty));
        self
    }

    pub fn mirror(mut self, line: i32, dir: DirectionH) -> Self {
        self.mirrors.push((line, dir));
        self
    }

    pub fn small(mut self) -> Self {
        self.small = true;
        self
    }

    pub fn no_stem(mut self) -> Self {
        self.no_stem = true;
        self
    }

    pub fn staff_move(mut self, staves: i32) -> Self {
        self.staff_move = staves;
        self
    }

    pub fn nudge(mut self, x: f64) -> Self {
        self.user_x_offset = x;
        self
    }

    pub fn articulation(mut self, kind: ArticulationKind) -> Self {
        self.articulations.push(kind);
        self
    }
}

pub struct ScoreBuilder {
    score: Score,
}

impl ScoreBuilder {
    pub fn new(style: Style) -> Self {
        ScoreBuilder { score: Score::new(style) }
    }

    /// Append a staff belonging to `part`; returns its index.
    pub fn add_staff(&mut self, part: usize, clef: ClefType) -> usize {
        let mut staff = Staff::new(part);
        staff.clefs.insert(0, clef);
        self.score.staves.push(staff);
        let nstaves = self.score.nstaves();
        for mb in &mut self.score.measures {
            if let MeasureBase::Measure(m) = mb {
                m.resize_staves(nstaves);
            }
        }
        let idx = nstaves - 1;
        if let Some(first) = self.score.first_measure() {
            if let Some(m) = self.score.measure_mut(first) {
                let s = m.get_segment(SegmentType::Clef, m.tick);
                m.segments[s].elements[idx * VOICES] = Some(SegmentElement::Clef(Clef::new(clef, false)));
            }
        }
        idx
    }

    pub fn staff_mut(&mut self, idx: usize) -> &mut Staff {
        &mut self.score.staves[idx]
    }

    fn end_tick(&self) -> i32 {
        self.score.last.map_or(0, |id| self.score.mb(id).end_tick())
    }

    fn append(&mut self, mut mb: MeasureBase) -> MeasureId {
        mb.set_prev(self.score.last);
        let id = self.score.add_measure_base(mb);
        match self.score.last {
            Some(last) => self.score.mb_mut(last).set_next(Some(id)),
            None => self.score.first = Some(id),
        }
        self.score.last = Some(id);
        id
    }

    /// Append a measure whose length equals its time signature.
    pub fn add_measure(&mut self, sig: Fraction) -> MeasureId {
        self.add_measure_with_len(sig, sig)
    }

    /// Append a measure of nominal signature `sig` and actual length `len`
    /// (pickups and other irregular measures).
    pub fn add_measure_with_len(&mut self, sig: Fraction, len: Fraction) -> MeasureId {
        let tick = self.end_tick();
        let nstaves = self.score.nstaves();
        let prev_sig = self.score.last_measure().and_then(|id| self.score.measure(id)).map(|m| m.timesig);
        let is_first = self.score.first_measure().is_none();

        let mut m = Measure::new(tick, len, nstaves);
        m.timesig = sig;
        if is_first {
            let s = m.get_segment(SegmentType::Clef, tick);
            for (idx, staff) in self.score.staves.iter().enumerate() {
                m.segments[s].elements[idx * VOICES] = Some(SegmentElement::Clef(Clef::new(staff.clef(tick), false)));
            }
            let keys: Vec<KeySigEvent> = self.score.staves.iter().map(|st| st.key(tick)).collect();
            if keys.iter().any(|k| k.key != 0) {
                let s = m.get_segment(SegmentType::KeySig, tick);
                for (idx, key) in keys.into_iter().enumerate() {
                    m.segments[s].elements[idx * VOICES] = Some(SegmentElement::KeySig(KeySig::new(key, false)));
                }
            }
        }
        if is_first || prev_sig.is_some_and(|p| !p.identical(&sig)) {
            let s = m.get_segment(SegmentType::TimeSig, tick);
            for idx in 0..nstaves {
                m.segments[s].elements[idx * VOICES] = Some(SegmentElement::TimeSig(TimeSig::new(sig, false)));
            }
            for staff in &mut self.score.staves {
                staff.timesigs.insert(tick, StaffTimeSig { sig, stretch: Fraction::new(1, 1), groups: None });
            }
        }
        self.append(MeasureBase::Measure(m))
    }

    /// Append a frame at the current end of the score.
    pub fn add_frame(&mut self, mut frame: Frame) -> MeasureId {
        frame.tick = self.end_tick();
        self.append(MeasureBase::Frame(frame))
    }

    pub fn measure_mut(&mut self, id: MeasureId) -> Option<&mut Measure> {
        self.score.measure_mut(id)
    }

    /// Key change for `staff` at the start of `measure`.
    pub fn set_key(&mut self, measure: MeasureId, staff: usize, key: i32) {
        let Some(m) = self.score.measure_mut(measure) else {
            return;
        };
        let tick = m.tick;
        let s = m.get_segment(SegmentType::KeySig, tick);
        m.segments[s].elements[staff * VOICES] = Some(SegmentElement::KeySig(KeySig::new(KeySigEvent::new(key), false)));
        self.score.staves[staff].keys.insert(tick, KeySigEvent::new(key));
    }

    /// Clef change for `staff` at the start of `measure`. The clef is drawn
    /// small at the end of the previous measure.
    pub fn clef_change(&mut self, measure: MeasureId, staff: usize, clef: ClefType) {
        let Some(tick) = self.score.measure(measure).map(|m| m.tick) else {
            return;
        };
        self.score.staves[staff].clefs.insert(tick, clef);
        let host = self.score.prev_measure(measure).unwrap_or(measure);
        let small = host != measure;
        if let Some(m) = self.score.measure_mut(host) {
            let s = m.get_segment(SegmentType::Clef, tick);
            let mut c = Clef::new(clef, false);
            c.small = small;
            m.segments[s].elements[staff * VOICES] = Some(SegmentElement::Clef(c));
        }
    }

    /// First free tick of `track` in `measure`.
    fn track_cursor(&self, measure: MeasureId, track: usize) -> i32 {
        let Some(m) = self.score.measure(measure) else {
            return 0;
        };
        m.chord_rest_segments()
            .filter_map(|s| s.cr(track))
            .map(|id| self.score.cr(id).end_tick())
            .fold(m.tick, i32::max)
    }

    fn place(&mut self, measure: MeasureId, track: usize, cr: ChordRest) -> ChordRestId {
        let tick = cr.tick;
        let id = self.score.add_chord_rest(cr);
        if let Some(m) = self.score.measure_mut(measure) {
            let s = m.get_segment(SegmentType::ChordRest, tick);
            m.segments[s].elements[track] = Some(SegmentElement::ChordRest(id));
        }
        id
    }

    /// Pitch and spelled pitch class of a natural note on `line`.
    fn pitch_of(clef: ClefType, line: i32, acc: Option<AccidentalType>) -> (i32, i32) {
        let step = clef.line_of_step(0) - line;
        let octave = step.div_euclid(7);
        let degree = step.rem_euclid(7) as usize;
        let mut pitch = (octave + 1) * 12 + STEP_SEMITONES[degree];
        let mut tpc = STEP_TPC[degree];
        match acc {
            Some(AccidentalType::Sharp) => {
                pitch += 1;
                tpc += 7;
            }
            Some(AccidentalType::Flat) => {
                pitch -= 1;
                tpc -= 7;
            }
            Some(AccidentalType::DoubleSharp) => {
                pitch += 2;
                tpc += 14;
            }
            Some(AccidentalType::DoubleFlat) => {
                pitch -= 2;
                tpc -= 14;
            }
            Some(AccidentalType::Natural) | None => {}
        }
        (pitch, tpc)
    }

    fn make_chord(&mut self, id: ChordRestId, spec: &ChordSpec, clef: ClefType) -> Vec<NoteId> {
        let mut lines = spec.lines.clone();
        // lowest pitch first
        lines.sort_unstable_by(|a, b| b.cmp(a));
        lines.dedup();
        let mut notes = Vec::with_capacity(lines.len());
        for line in lines {
            let acc = spec.accidentals.iter().find(|(l, _)| *l == line).map(|(_, t)| *t);
            let (pitch, tpc) = Self::pitch_of(clef, line, acc);
            let mut note = Note::new(id, line, pitch);
            note.tpc = tpc;
            note.accidental = acc.map(Accidental::new);
            note.small = spec.small;
            if let Some((_, h)) = spec.heads.iter().find(|(l, _)| *l == line) {
                note.head_type = *h;
            }
            if let Some((_, d)) = spec.mirrors.iter().find(|(l, _)| *l == line) {
                note.user_mirror = *d;
            }
            notes.push(self.score.add_note(note));
        }
        notes
    }

    /// Append a chord to `track` after the last chord/rest of the track.
    pub fn add_chord(&mut self, measure: MeasureId, track: usize, spec: ChordSpec) -> ChordRestId {
        let tick = self.track_cursor(measure, track);
        self.add_chord_at(measure, track, tick, spec)
    }

    pub fn add_chord_at(&mut self, measure: MeasureId, track: usize, tick: i32, spec: ChordSpec) -> ChordRestId {
        let mut chord = Chord::new();
        chord.stem_direction = spec.stem;
        chord.no_stem = spec.no_stem;
        chord.small = spec.small;
        chord.user_x_offset = spec.user_x_offset;
        let mut cr = ChordRest::new(measure, track, tick, spec.duration, ChordRestKind::Chord(chord));
        cr.beam_mode = spec.beam_mode;
        cr.staff_move = spec.staff_move;
        cr.articulations = spec
            .articulations
            .iter()
            .map(|&kind| Articulation { kind, placement: Default::default() })
            .collect();
        let id = self.place(measure, track, cr);
        let staff = (track / VOICES) as i32 + spec.staff_move;
        let clef = self
            .score
            .staves
            .get(staff.max(0) as usize)
            .map(|st| st.clef(tick))
            .unwrap_or_default();
        let notes = self.make_chord(id, &spec, clef);
        if let Some(c) = self.score.cr_mut(id).chord_mut() {
            c.notes = notes;
        }
        id
    }

    pub fn add_rest(&mut self, measure: MeasureId, track: usize, duration: impl Into<TDuration>) -> ChordRestId {
        let tick = self.track_cursor(measure, track);
        let cr = ChordRest::new(measure, track, tick, duration.into(), ChordRestKind::Rest(Rest::default()));
        self.place(measure, track, cr)
    }

    /// Whole-measure rest in `track`.
    pub fn add_measure_rest(&mut self, measure: MeasureId, track: usize) -> ChordRestId {
        let Some((tick, ticks)) = self.score.measure(measure).map(|m| (m.tick, m.ticks())) else {
            return self.add_rest(measure, track, DurationType::Measure);
        };
        let mut cr = ChordRest::new(
            measure,
            track,
            tick,
            TDuration::new(DurationType::Measure),
            ChordRestKind::Rest(Rest::default()),
        );
        cr.ticks = ticks;
        self.place(measure, track, cr)
    }

    /// Attach a grace chord to `main`. Grace notes before the chord keep
    /// their insertion order; after-graces follow them.
    pub fn add_grace(&mut self, main: ChordRestId, kind: GraceKind, spec: ChordSpec) -> ChordRestId {
        let (measure, track, tick, clef_staff) = {
            let m = self.score.cr(main);
            (m.measure, m.track, m.tick, m.staff_idx())
        };
        let mut chord = Chord::new();
        chord.grace = Some(kind);
        chord.stem_direction = if spec.stem == Direction::Auto { Direction::Up } else { spec.stem };
        chord.small = spec.small;
        let mut cr = ChordRest::new(measure, track, tick, spec.duration, ChordRestKind::Chord(chord));
        cr.parent = Some(main);
        cr.beam_mode = spec.beam_mode;
        let id = self.score.add_chord_rest(cr);
        let clef = self.score.staves[clef_staff].clef(tick);
        let notes = self.make_chord(id, &spec, clef);
        if let Some(c) = self.score.cr_mut(id).chord_mut() {
            c.notes = notes;
        }
        let graces: Vec<(ChordRestId, bool)> = self
            .score
            .cr(main)
            .chord()
            .map(|c| {
                c.grace_notes
                    .iter()
                    .map(|g| (*g, self.score.cr(*g).chord().is_some_and(|gc| gc.is_grace_after())))
                    .collect()
            })
            .unwrap_or_default();
        let after = kind.is_after();
        let pos = if after { graces.len() } else { graces.iter().take_while(|(_, a)| !a).count() };
        if let Some(c) = self.score.cr_mut(main).chord_mut() {
            c.grace_notes.insert(pos, id);
        }
        id
    }

    /// Tie two notes of equal pitch. An open tie (`end = None`) is
    /// connected by the layout when possible.
    pub fn add_tie(&mut self, start: NoteId, end: Option<NoteId>) -> SpannerId {
        let sc = self.score.note(start).chord;
        let (track, tick) = (self.score.cr(sc).track, self.score.cr(sc).tick);
        let tick2 = end.map_or(tick, |e| self.score.cr(self.score.note(e).chord).tick);
        let mut tie = Spanner::new(SpannerKind::Tie, track, tick, tick2);
        tie.start_note = Some(start);
        tie.end_note = end;
        let id = self.score.add_spanner(tie);
        self.score.note_mut(start).tie_for = Some(id);
        if let Some(e) = end {
            self.score.note_mut(e).tie_back = Some(id);
        }
        id
    }

    pub fn add_spanner(&mut self, spanner: Spanner) -> SpannerId {
        self.score.add_spanner(spanner)
    }

    pub fn add_annotation(&mut self, measure: MeasureId, tick: i32, annotation: Annotation) {
        if let Some(m) = self.score.measure_mut(measure) {
            let s = m.get_segment(SegmentType::ChordRest, tick);
            m.segments[s].annotations.push(annotation);
        }
    }

    pub fn add_lyrics(&mut self, cr: ChordRestId, lyrics: Lyrics) {
        self.score.cr_mut(cr).lyrics.push(lyrics);
    }

    pub fn add_fingering(&mut self, note: NoteId, fingering: Fingering) {
        self.score.note_mut(note).fingerings.push(fingering);
    }

    pub fn score_mut(&mut self) -> &mut Score {
        &mut self.score
    }

    pub fn build(mut self) -> Score {
        let ids: Vec<MeasureId> = self.score.measure_bases().collect();
        for id in ids {
            if let Some(m) = self.score.measure_mut(id) {
                m.update_segment_ticks();
            }
        }
        self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_c_in_treble_clef() {
        // C4 sits on the first ledger line below the staff
        assert_eq!(ScoreBuilder::pitch_of(ClefType::G, 10, None), (60, 14));
        assert_eq!(ScoreBuilder::pitch_of(ClefType::G, 0, None).0, 77);
        assert_eq!(ScoreBuilder::pitch_of(ClefType::F, 8, Some(AccidentalType::Sharp)), (44, 22));
    }

    #[test]
    fn measures_are_contiguous() {
        let mut b = ScoreBuilder::new(Style::default());
        b.add_staff(0, ClefType::G);
        let m1 = b.add_measure_with_len(Fraction::new(4, 4), Fraction::new(1, 4));
        let m2 = b.add_measure(Fraction::new(4, 4));
        let score = b.build();
        assert_eq!(score.measure(m1).map(|m| m.end_tick()), score.measure(m2).map(|m| m.tick));
        assert_eq!(score.measure(m2).map(|m| m.tick), Some(480));
    }

    #[test]
    fn chord_notes_are_lowest_first() {
        let mut b = ScoreBuilder::new(Style::default());
        b.add_staff(0, ClefType::G);
        let m = b.add_measure(Fraction::new(4, 4));
        let c = b.add_chord(m, 0, ChordSpec::new(DurationType::Whole, &[2, 6, 4]));
        let score = b.build();
        let lines: Vec<i32> = score.chord_notes(c).iter().map(|n| score.note(*n).line).collect();
        assert_eq!(lines, vec![6, 4, 2]);
    }

    #[test]
    fn segment_ticks_span_to_next_chord() {
        let mut b = ScoreBuilder::new(Style::default());
        b.add_staff(0, ClefType::G);
        let m = b.add_measure(Fraction::new(2, 4));
        b.add_chord(m, 0, ChordSpec::new(DurationType::Quarter, &[4]));
        b.add_chord(m, 0, ChordSpec::new(DurationType::Eighth, &[4]));
        let score = b.build();
        let ticks: Vec<i32> = score
            .measure(m)
            .map(|m| m.chord_rest_segments().map(|s| s.ticks).collect())
            .unwrap_or_default();
        assert_eq!(ticks, vec![480, 480]);
    }
}
