//! Numeric sweep over candidate filter geometries.
//!
//! For every feasible combination of `filter_half_width` and
//! `period_half_width` the session recording is filtered and its power
//! spectrum computed, so the suppression/distortion trade-off can be
//! tabulated or plotted externally before committing to a geometry.

use crate::config::{ExploreConfig, FilterDesignConfig, feasible_half_width_range};
use crate::constants::{MIN_PERIOD_HALF_WIDTH, PERIOD_HALF_WIDTH_FRACTION};
use crate::error::{ParrmError, Result};
use crate::filter::{FilterTemplate, apply_template};
use crate::parallel::WorkerPool;
use crate::spectral::{PowerSpectrum, power_spectrum};
use ndarray::ArrayView2;

/// One candidate geometry of the sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSelection {
    pub filter_half_width: usize,
    pub period_half_width: f64,
}

/// Spectrum of the recording filtered under one candidate geometry.
#[derive(Debug, Clone)]
pub struct FilteredSpectrum {
    pub params: ParamSelection,
    pub spectrum: PowerSpectrum,
}

/// Result of a filter-parameter sweep.
#[derive(Debug, Clone)]
pub struct ParamExploration {
    /// Spectrum of the unfiltered recording, for comparison.
    pub unfiltered: PowerSpectrum,
    /// One filtered spectrum per feasible geometry, in grid order.
    pub filtered: Vec<FilteredSpectrum>,
    /// Grid combinations that could not produce a filter.
    pub infeasible: Vec<ParamSelection>,
}

pub(crate) fn explore_filter_params(
    data: ArrayView2<'_, f64>,
    sampling_freq: f64,
    period: f64,
    config: &ExploreConfig,
) -> Result<ParamExploration> {
    if config.freq_res <= 0.0 || config.freq_res > sampling_freq / 2.0 {
        return Err(ParrmError::InvalidParameter(
            "`freq_res` must be > 0 and <= the Nyquist frequency".into(),
        ));
    }
    let pool = WorkerPool::new(config.parallelism)?;
    let n_samples = data.ncols();

    let half_widths = match &config.filter_half_widths {
        Some(values) if values.is_empty() => {
            return Err(ParrmError::InvalidParameter(
                "`filter_half_widths` must not be empty".into(),
            ));
        }
        Some(values) => values.clone(),
        None => default_half_width_grid(n_samples, period)?,
    };
    let period_half_widths = match &config.period_half_widths {
        Some(values) if values.is_empty() => {
            return Err(ParrmError::InvalidParameter(
                "`period_half_widths` must not be empty".into(),
            ));
        }
        Some(values) => values.clone(),
        None => default_period_half_width_grid(period),
    };

    let unfiltered = power_spectrum(data, sampling_freq, config.freq_res, &pool)?;

    let mut filtered = Vec::new();
    let mut infeasible = Vec::new();
    for &filter_half_width in &half_widths {
        for &period_half_width in &period_half_widths {
            let params = ParamSelection {
                filter_half_width,
                period_half_width,
            };
            let design = FilterDesignConfig {
                filter_half_width: Some(filter_half_width),
                period_half_width: Some(period_half_width),
                ..FilterDesignConfig::default()
            };
            let template = design
                .resolve(n_samples, period)
                .and_then(|geometry| FilterTemplate::build(n_samples, period, &geometry));
            match template {
                Ok(template) => {
                    let output = apply_template(&template, data);
                    let spectrum =
                        power_spectrum(output.view(), sampling_freq, config.freq_res, &pool)?;
                    filtered.push(FilteredSpectrum { params, spectrum });
                }
                Err(_) => infeasible.push(params),
            }
        }
    }

    log::debug!(
        "explored {} geometries: {} feasible, {} infeasible",
        filtered.len() + infeasible.len(),
        filtered.len(),
        infeasible.len()
    );
    Ok(ParamExploration {
        unfiltered,
        filtered,
        infeasible,
    })
}

/// Small spread over the feasible half-width range: its ends plus the
/// midpoint.
fn default_half_width_grid(n_samples: usize, period: f64) -> Result<Vec<usize>> {
    let (min, max) = feasible_half_width_range(n_samples, period, 0)?;
    let mut grid = vec![min, min.midpoint(max), max];
    grid.sort_unstable();
    grid.dedup();
    Ok(grid)
}

/// Spread around the default period half-width, capped at the period.
fn default_period_half_width_grid(period: f64) -> Vec<f64> {
    let base = (period * PERIOD_HALF_WIDTH_FRACTION)
        .max(MIN_PERIOD_HALF_WIDTH)
        .min(period);
    let mut grid = vec![(0.5 * base).min(period), base, (2.0 * base).min(period)];
    grid.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::Parallelism;
    use ndarray::Array2;
    use std::f64::consts::TAU;

    #[test]
    fn test_sweep_covers_grid() {
        let data = Array2::from_shape_fn((1, 400), |(_, t)| (TAU * t as f64 / 20.0).sin());
        let config = ExploreConfig {
            freq_res: 1.0,
            parallelism: Parallelism::Threads(1),
            ..ExploreConfig::default()
        };
        let exploration = explore_filter_params(data.view(), 100.0, 20.0, &config).unwrap();
        assert!(!exploration.filtered.is_empty());
        for entry in &exploration.filtered {
            assert_eq!(entry.spectrum.power.dim(), exploration.unfiltered.power.dim());
        }
    }

    #[test]
    fn test_infeasible_combinations_are_reported() {
        let data = Array2::from_shape_fn((1, 100), |(_, t)| (t as f64 * 0.7).sin());
        let config = ExploreConfig {
            freq_res: 5.0,
            // 0.1 samples of tolerance around multiples of 2.5 collects
            // nothing for odd cycle counts.
            filter_half_widths: Some(vec![1, 2]),
            period_half_widths: Some(vec![0.1]),
            parallelism: Parallelism::Threads(1),
        };
        let exploration = explore_filter_params(data.view(), 100.0, 2.5, &config).unwrap();
        assert_eq!(exploration.infeasible.len(), 1);
        assert_eq!(exploration.filtered.len(), 1);
    }

    #[test]
    fn test_bad_freq_res_rejected() {
        let data = Array2::zeros((1, 100));
        let config = ExploreConfig {
            freq_res: 0.0,
            ..ExploreConfig::default()
        };
        assert!(explore_filter_params(data.view(), 100.0, 2.0, &config).is_err());
    }
}
