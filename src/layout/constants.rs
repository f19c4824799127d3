//! Fixed engraving constants not exposed through the style (spatium units
//! unless noted).

// ── Chord layout ────────────────────────────────────────────────────
/// Head width differences below this are treated as equal.
pub(super) const CENTER_THRESHOLD: f64 = 0.01;
/// Margin between conflicting up- and down-stem note columns.
pub(super) const VOICE_CLEARANCE: f64 = 0.3;
/// Offset used when a second has the up-stem note higher.
pub(super) const SECOND_CLEARANCE: f64 = 0.2;
/// Extra room for a second without shared stems.
pub(super) const SECOND_MARGIN: f64 = 0.1;
/// Accidentals left of ledger lines keep at least this distance.
pub(super) const LEDGER_ACCIDENTAL_X: f64 = -0.2;
/// Accidentals closer than this may tuck one notch into the other.
pub(super) const ACCIDENTAL_CLOSE_GAP: f64 = 0.33;
/// Horizontal separation of overlapping accidental stems, in accidental
/// distances.
pub(super) const ACCIDENTAL_OVERLAP_SHIFT: f64 = 1.41;
/// Line span an accidental octave column must cover to be used.
pub(super) const OCTAVE_COLUMN_SPAN: i32 = 7;

/// Gap between stacked articulations.
pub(super) const ARTICULATION_GAP: f64 = 0.25;

// ── Spacing ─────────────────────────────────────────────────────────
/// Logarithmic stretch factor of the spring model.
pub(super) const SPRING_K: f64 = 0.865_617;
/// Stand-in stretch for a degenerate zero-stretch first spring.
pub(super) const FALLBACK_STRETCH: f64 = 1.1;
/// Height of the simulated barline a measure starts after (4 spaces).
pub(super) const SIMULATED_BARLINE_HEIGHT: f64 = 4.0;
/// Very tall rectangle standing for the left system margin.
pub(super) const LEFT_MARGIN_EXTENT: f64 = 1_000_000.0;

// ── Stems and beams ─────────────────────────────────────────────────
/// Minimum stem length under a beam.
pub(super) const BEAM_MIN_STEM: f64 = 2.75;

// ── Pages ───────────────────────────────────────────────────────────
/// Gap between horizontally arranged pages (absolute units).
pub(super) const HORIZONTAL_PAGE_GAP: f64 = 50.0;

// ── Text ────────────────────────────────────────────────────────────
/// Text ascent as a fraction of the font size.
pub(super) const TEXT_ASCENT: f64 = 0.8;
/// Text descent as a fraction of the font size.
pub(super) const TEXT_DESCENT: f64 = 0.2;
