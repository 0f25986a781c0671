//! Typed per-operation configuration.
//!
//! Each public operation takes one configuration struct whose unset fields
//! are derived from the recording and the estimated period. Validation is a
//! single upfront `resolve` step producing the concrete values actually
//! used, so an operation either starts with a fully-checked configuration
//! or fails before any computation.

use std::fmt;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_FREQ_RES, DEFAULT_OUTLIER_BOUNDARY, MIN_PERIOD_HALF_WIDTH, MIN_SEARCH_HALF_WINDOW,
    PERIOD_HALF_WIDTH_FRACTION, SEARCH_WINDOW_FRACTION,
};
use crate::error::{ParrmError, Result};
use crate::parallel::Parallelism;

/// Which side of the reference sample a filter may draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterDirection {
    /// Only samples before the reference index (negative offsets).
    Past,
    /// Only samples after the reference index (positive offsets).
    Future,
    /// Samples on either side.
    Both,
}

impl Default for FilterDirection {
    fn default() -> Self {
        Self::Both
    }
}

impl fmt::Display for FilterDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Past => "past",
            Self::Future => "future",
            Self::Both => "both",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FilterDirection {
    type Err = ParrmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "past" => Ok(Self::Past),
            "future" => Ok(Self::Future),
            "both" => Ok(Self::Both),
            other => Err(ParrmError::InvalidParameter(format!(
                "`filter_direction` must be one of \"past\", \"future\", \"both\"; got \"{other}\""
            ))),
        }
    }
}

/// Settings for the period search.
///
/// `search_samples` takes precedence when supplied; otherwise candidates
/// are derived from `assumed_periods`, which itself defaults to the single
/// period implied by the sampling and artefact frequencies.
#[derive(Debug, Clone, Default)]
pub struct PeriodSearchConfig {
    /// Candidate sample offsets to score, each in `[1, n_samples - 1]`.
    pub search_samples: Option<Vec<usize>>,
    /// Hypothesised period lengths, in samples.
    pub assumed_periods: Option<Vec<f64>>,
    /// Outlier boundary in robust standard deviations; must be > 0.
    pub outlier_boundary: Option<f64>,
    /// Seed for the subsampling streams; `None` forfeits reproducibility.
    pub random_seed: Option<u64>,
    /// Worker count for candidate scoring.
    pub parallelism: Parallelism,
}

/// Fully-validated period-search settings.
#[derive(Debug, Clone)]
pub struct ResolvedPeriodSearch {
    pub search_samples: Vec<usize>,
    pub assumed_periods: Vec<f64>,
    pub outlier_boundary: f64,
    pub random_seed: Option<u64>,
    pub n_jobs: usize,
}

impl PeriodSearchConfig {
    pub(crate) fn resolve(
        &self,
        n_samples: usize,
        sampling_freq: f64,
        artefact_freq: f64,
    ) -> Result<ResolvedPeriodSearch> {
        if n_samples < 2 {
            return Err(ParrmError::InsufficientData {
                needed: 2,
                available: n_samples,
            });
        }

        let outlier_boundary = self.outlier_boundary.unwrap_or(DEFAULT_OUTLIER_BOUNDARY);
        if outlier_boundary <= 0.0 || !outlier_boundary.is_finite() {
            return Err(ParrmError::InvalidParameter(
                "`outlier_boundary` must be > 0".into(),
            ));
        }

        let n_jobs = self.parallelism.resolve()?;

        let assumed_periods = match &self.assumed_periods {
            Some(periods) if periods.is_empty() => {
                return Err(ParrmError::InvalidParameter(
                    "`assumed_periods` must not be empty".into(),
                ));
            }
            Some(periods) => {
                for &p in periods {
                    if !p.is_finite() || p <= 0.0 {
                        return Err(ParrmError::InvalidParameter(
                            "Entries of `assumed_periods` must be positive and finite".into(),
                        ));
                    }
                }
                periods.clone()
            }
            None => vec![sampling_freq / artefact_freq],
        };

        let search_samples = match &self.search_samples {
            Some(samples) => {
                if samples.is_empty() {
                    return Err(ParrmError::InvalidParameter(
                        "`search_samples` must not be empty".into(),
                    ));
                }
                for &k in samples {
                    if k < 1 || k > n_samples - 1 {
                        return Err(ParrmError::InvalidParameter(format!(
                            "Entries of `search_samples` must lie in the range [1, {}]",
                            n_samples - 1
                        )));
                    }
                }
                let mut sorted = samples.clone();
                sorted.sort_unstable();
                sorted.dedup();
                sorted
            }
            None => derive_search_samples(&assumed_periods, n_samples)?,
        };

        Ok(ResolvedPeriodSearch {
            search_samples,
            assumed_periods,
            outlier_boundary,
            random_seed: self.random_seed,
            n_jobs,
        })
    }
}

/// Symmetric candidate window around each assumed period, merged and
/// de-duplicated across hypotheses.
fn derive_search_samples(assumed_periods: &[f64], n_samples: usize) -> Result<Vec<usize>> {
    let mut candidates = std::collections::BTreeSet::new();
    for &period in assumed_periods {
        let centre = period.round() as i64;
        let half = (period * SEARCH_WINDOW_FRACTION).round() as i64;
        let half = half.max(MIN_SEARCH_HALF_WINDOW as i64);
        for k in (centre - half)..=(centre + half) {
            if k >= 1 && k <= (n_samples - 1) as i64 {
                candidates.insert(k as usize);
            }
        }
    }
    if candidates.is_empty() {
        return Err(ParrmError::InvalidParameter(format!(
            "`assumed_periods` produce no candidate offsets within [1, {}]",
            n_samples - 1
        )));
    }
    Ok(candidates.into_iter().collect())
}

/// Settings for filter construction. Unset geometry is derived from the
/// recording length and the estimated period.
#[derive(Debug, Clone, Default)]
pub struct FilterDesignConfig {
    /// Period cycles to include on each usable side of the reference.
    pub filter_half_width: Option<usize>,
    /// Symmetric exclusion band, in samples, around the zero offset.
    pub omit_n_samples: Option<usize>,
    /// Tolerance, in samples, around each period multiple.
    pub period_half_width: Option<f64>,
    /// Sign restriction on the offsets.
    pub filter_direction: FilterDirection,
}

/// Fully-validated filter geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGeometry {
    pub filter_half_width: usize,
    pub omit_n_samples: usize,
    pub period_half_width: f64,
    pub filter_direction: FilterDirection,
}

impl FilterDesignConfig {
    pub(crate) fn resolve(&self, n_samples: usize, period: f64) -> Result<FilterGeometry> {
        let omit_bound = (n_samples.saturating_sub(1)) / 2;
        if omit_bound == 0 {
            return Err(ParrmError::InsufficientData {
                needed: 3,
                available: n_samples,
            });
        }

        let omit_n_samples = self.omit_n_samples.unwrap_or(0);
        if omit_n_samples >= omit_bound {
            return Err(ParrmError::InvalidParameter(format!(
                "`omit_n_samples` must lie in the range [0, {omit_bound})"
            )));
        }

        let period_half_width = match self.period_half_width {
            Some(width) => {
                if !width.is_finite() || width <= 0.0 || width > period {
                    return Err(ParrmError::InvalidParameter(format!(
                        "`period_half_width` must lie in the range (0, {period}]"
                    )));
                }
                width
            }
            None => (period * PERIOD_HALF_WIDTH_FRACTION)
                .max(MIN_PERIOD_HALF_WIDTH)
                .min(period),
        };

        let (min_half_width, max_half_width) =
            feasible_half_width_range(n_samples, period, omit_n_samples)?;
        let filter_half_width = self.filter_half_width.unwrap_or(max_half_width);
        if filter_half_width < min_half_width || filter_half_width > max_half_width {
            return Err(ParrmError::InvalidParameter(format!(
                "`filter_half_width` must lie in the range [{min_half_width}, {max_half_width}]"
            )));
        }

        Ok(FilterGeometry {
            filter_half_width,
            omit_n_samples,
            period_half_width,
            filter_direction: self.filter_direction,
        })
    }
}

/// Feasible `filter_half_width` range for the given geometry: the smallest
/// cycle count whose furthest multiple clears the omission band, up to the
/// largest whose multiple keeps a centred reference index in bounds.
///
/// # Errors
/// `InsufficientData` when not even one full cycle fits the recording;
/// `NoSuitableFilter` when the omission band consumes every usable cycle.
pub(crate) fn feasible_half_width_range(
    n_samples: usize,
    period: f64,
    omit_n_samples: usize,
) -> Result<(usize, usize)> {
    let max_half_width = (((n_samples - 1) as f64 / 2.0) / period).floor() as usize;
    if max_half_width == 0 {
        return Err(ParrmError::InsufficientData {
            needed: (2.0 * period).ceil() as usize + 1,
            available: n_samples,
        });
    }
    let min_half_width = (((omit_n_samples + 1) as f64) / period).ceil().max(1.0) as usize;
    if min_half_width > max_half_width {
        return Err(ParrmError::NoSuitableFilter(format!(
            "the {omit_n_samples}-sample omission band leaves no usable period multiple \
             for a {period:.3}-sample period in {n_samples} samples"
        )));
    }
    Ok((min_half_width, max_half_width))
}

/// Settings for the numeric filter-parameter sweep.
#[derive(Debug, Clone)]
pub struct ExploreConfig {
    /// Frequency resolution, in Hz, of the comparison spectra.
    pub freq_res: f64,
    /// Candidate `filter_half_width` values; a small spread over the
    /// feasible range when unset.
    pub filter_half_widths: Option<Vec<usize>>,
    /// Candidate `period_half_width` values; a spread around the default
    /// when unset.
    pub period_half_widths: Option<Vec<f64>>,
    /// Worker count for the per-channel spectra.
    pub parallelism: Parallelism,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            freq_res: DEFAULT_FREQ_RES,
            filter_half_widths: None,
            period_half_widths: None,
            parallelism: Parallelism::default(),
        }
    }
}
