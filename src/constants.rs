//! Numeric constants for period search and filter construction
//!
//! These define the default-derivation ratios and epsilon guards used when
//! the caller leaves a parameter unspecified or a statistic degenerates.

/// Scale factor turning a median absolute deviation into a consistent
/// estimate of the standard deviation for normally distributed data.
pub const MAD_SCALE: f64 = 1.4826;

/// Spread below which the difference distribution is treated as degenerate
/// and outlier trimming is skipped (constant or near-constant signal).
pub const SPREAD_EPSILON: f64 = 1e-12;

/// Curvature below which parabolic refinement of the best candidate offset
/// is abandoned and the integer offset is kept.
pub const CURVATURE_EPSILON: f64 = 1e-12;

/// Upper bound on pooled sample pairs evaluated per candidate offset.
/// Longer recordings are subsampled with a seeded RNG stream.
pub const MAX_PAIRS_PER_CANDIDATE: usize = 50_000;

/// Mixing constant for deriving one independent RNG stream per candidate
/// offset from the base seed (golden-ratio increment).
pub const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Relative half-window used when deriving the candidate offset search
/// range from an assumed period.
pub const SEARCH_WINDOW_FRACTION: f64 = 0.25;

/// Minimum half-window, in samples, of the derived candidate search range.
pub const MIN_SEARCH_HALF_WINDOW: usize = 2;

/// Fraction of the period used for the default `period_half_width`.
pub const PERIOD_HALF_WIDTH_FRACTION: f64 = 1.0 / 50.0;

/// Floor for the default `period_half_width`, guaranteeing that every
/// period multiple captures at least its nearest integer offset.
pub const MIN_PERIOD_HALF_WIDTH: f64 = 0.5;

/// Default outlier boundary, in robust standard deviations.
pub const DEFAULT_OUTLIER_BOUNDARY: f64 = 3.0;

/// Default frequency resolution, in Hz, for spectral exploration.
pub const DEFAULT_FREQ_RES: f64 = 5.0;
