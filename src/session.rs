//! The analysis session tying the pipeline stages together.
//!
//! A `Parrm` session owns one recording and the entities derived from it:
//! the estimated artefact period, the filter template and the most recent
//! filtered output. Each derived entity is an explicit
//! uninitialised-or-computed state; accessing one before the producing
//! step has run fails with the matching sequencing error, and a failed
//! operation leaves all prior state untouched.

use ndarray::{Array2, ArrayView2};
use serde::Serialize;

use crate::config::{
    ExploreConfig, FilterDesignConfig, FilterDirection, PeriodSearchConfig, ResolvedPeriodSearch,
};
use crate::error::{ParrmError, Result};
use crate::explore::{self, ParamExploration};
use crate::filter::{FilterTemplate, apply_template};
use crate::parallel::{Parallelism, WorkerPool};
use crate::period;

/// A derived entity that does not exist until its producing step has run.
#[derive(Debug, Clone)]
enum Derived<T> {
    Uninitialized,
    Computed(T),
}

impl<T> Derived<T> {
    fn computed(&self) -> Option<&T> {
        match self {
            Derived::Uninitialized => None,
            Derived::Computed(value) => Some(value),
        }
    }
}

/// Read-only snapshot of the parameters behind the most recent period
/// estimation and filter construction.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub data: DataSettings,
    pub period_search: PeriodSearchSettings,
    /// Present once a filter has been created.
    pub filter: Option<FilterSettings>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataSettings {
    pub n_channels: usize,
    pub n_samples: usize,
    pub sampling_freq: f64,
    pub artefact_freq: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodSearchSettings {
    pub search_samples: Vec<usize>,
    pub assumed_periods: Vec<f64>,
    pub outlier_boundary: f64,
    pub random_seed: Option<u64>,
    pub n_jobs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterSettings {
    pub filter_half_width: usize,
    pub omit_n_samples: usize,
    pub period_half_width: f64,
    pub filter_direction: FilterDirection,
}

/// Period-based artefact removal session.
///
/// The pipeline is `find_period` -> `create_filter` -> `filter_data`; the
/// filter template produced in between is translation-invariant and may be
/// replayed on recordings other than the one it was estimated from.
///
/// # Example
/// ```no_run
/// use ndarray::Array2;
/// use parrm::{FilterDesignConfig, Parrm, PeriodSearchConfig};
///
/// let data = Array2::<f64>::zeros((1, 100));
/// let mut parrm = Parrm::new(data, 20.0, 10.0).unwrap();
/// parrm.find_period(&PeriodSearchConfig::default()).unwrap();
/// parrm.create_filter(&FilterDesignConfig::default()).unwrap();
/// let filtered = parrm.filter_data(None).unwrap();
/// assert_eq!(filtered.dim(), (1, 100));
/// ```
pub struct Parrm {
    data: Array2<f64>,
    sampling_freq: f64,
    artefact_freq: f64,
    period: Derived<f64>,
    template: Derived<FilterTemplate>,
    filtered: Derived<Array2<f64>>,
    period_settings: Option<PeriodSearchSettings>,
    filter_settings: Option<FilterSettings>,
}

impl Parrm {
    /// Create a session for a recording with axes (channel, sample).
    ///
    /// # Errors
    /// `ParrmError::InvalidParameter` when either frequency is not a
    /// positive finite number.
    pub fn new(data: Array2<f64>, sampling_freq: f64, artefact_freq: f64) -> Result<Self> {
        if !sampling_freq.is_finite() || sampling_freq <= 0.0 {
            return Err(ParrmError::InvalidParameter(
                "`sampling_freq` must be > 0".into(),
            ));
        }
        if !artefact_freq.is_finite() || artefact_freq <= 0.0 {
            return Err(ParrmError::InvalidParameter(
                "`artefact_freq` must be > 0".into(),
            ));
        }
        Ok(Self {
            data,
            sampling_freq,
            artefact_freq,
            period: Derived::Uninitialized,
            template: Derived::Uninitialized,
            filtered: Derived::Uninitialized,
            period_settings: None,
            filter_settings: None,
        })
    }

    /// Estimate the artefact's period, in samples, and store it for the
    /// filter-construction step. Returns the (possibly fractional) period.
    pub fn find_period(&mut self, config: &PeriodSearchConfig) -> Result<f64> {
        let resolved =
            config.resolve(self.data.ncols(), self.sampling_freq, self.artefact_freq)?;
        let pool = WorkerPool::new(Parallelism::Threads(resolved.n_jobs))?;
        log::debug!(
            "scoring {} candidate offsets on {} worker(s)",
            resolved.search_samples.len(),
            resolved.n_jobs
        );

        let estimate = period::estimate_period(self.data.view(), &resolved, &pool);
        log::info!("estimated artefact period: {estimate:.4} samples");

        self.period_settings = Some(settings_from_resolved(&resolved));
        self.period = Derived::Computed(estimate);
        Ok(estimate)
    }

    /// Build the filter template from the estimated period.
    ///
    /// # Errors
    /// `ParrmError::PeriodNotEstimated` before `find_period`; validation
    /// and infeasible-geometry errors from the configuration.
    pub fn create_filter(&mut self, config: &FilterDesignConfig) -> Result<&FilterTemplate> {
        let estimate = *self.period.computed().ok_or(ParrmError::PeriodNotEstimated)?;
        let geometry = config.resolve(self.data.ncols(), estimate)?;
        let template = FilterTemplate::build(self.data.ncols(), estimate, &geometry)?;
        log::info!(
            "created {} filter with {} offsets over {} cycle(s)",
            geometry.filter_direction,
            template.len(),
            geometry.filter_half_width
        );

        self.filter_settings = Some(FilterSettings {
            filter_half_width: geometry.filter_half_width,
            omit_n_samples: geometry.omit_n_samples,
            period_half_width: geometry.period_half_width,
            filter_direction: geometry.filter_direction,
        });
        self.template = Derived::Computed(template);
        self.filter()
    }

    /// Apply the filter template, returning the artefact-suppressed
    /// recording. `None` filters the session's own recording; a supplied
    /// recording may have any channel and sample count. The result is also
    /// retained as the most recent filtered output.
    pub fn filter_data(&mut self, data: Option<ArrayView2<'_, f64>>) -> Result<Array2<f64>> {
        let template = self.template.computed().ok_or(ParrmError::FilterNotCreated)?;
        let filtered = match data {
            Some(view) => apply_template(template, view),
            None => apply_template(template, self.data.view()),
        };
        self.filtered = Derived::Computed(filtered.clone());
        Ok(filtered)
    }

    /// Filter the session recording under a grid of candidate geometries
    /// and return the resulting spectra for comparison.
    ///
    /// # Errors
    /// `ParrmError::PeriodNotEstimated` before `find_period`.
    pub fn explore_filter_params(&self, config: &ExploreConfig) -> Result<ParamExploration> {
        let estimate = *self.period.computed().ok_or(ParrmError::PeriodNotEstimated)?;
        explore::explore_filter_params(self.data.view(), self.sampling_freq, estimate, config)
    }

    /// The recording supplied at construction.
    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn sampling_freq(&self) -> f64 {
        self.sampling_freq
    }

    pub fn artefact_freq(&self) -> f64 {
        self.artefact_freq
    }

    /// The estimated period, once computed.
    pub fn period(&self) -> Result<f64> {
        self.period
            .computed()
            .copied()
            .ok_or(ParrmError::PeriodNotEstimated)
    }

    /// The filter template, once created.
    pub fn filter(&self) -> Result<&FilterTemplate> {
        self.template.computed().ok_or(ParrmError::FilterNotCreated)
    }

    /// The most recent filtered output, once produced.
    pub fn filtered_data(&self) -> Result<&Array2<f64>> {
        self.filtered.computed().ok_or(ParrmError::DataNotFiltered)
    }

    /// Snapshot of the parameters behind the most recent period estimation
    /// and filter construction.
    pub fn settings(&self) -> Result<Settings> {
        let period_search = self
            .period_settings
            .clone()
            .ok_or(ParrmError::SettingsNotEstablished)?;
        Ok(Settings {
            data: DataSettings {
                n_channels: self.data.nrows(),
                n_samples: self.data.ncols(),
                sampling_freq: self.sampling_freq,
                artefact_freq: self.artefact_freq,
            },
            period_search,
            filter: self.filter_settings.clone(),
        })
    }
}

fn settings_from_resolved(resolved: &ResolvedPeriodSearch) -> PeriodSearchSettings {
    PeriodSearchSettings {
        search_samples: resolved.search_samples.clone(),
        assumed_periods: resolved.assumed_periods.clone(),
        outlier_boundary: resolved.outlier_boundary,
        random_seed: resolved.random_seed,
        n_jobs: resolved.n_jobs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn recording() -> Array2<f64> {
        // Alternating artefact with exact 2-sample period plus a slow,
        // aperiodic background.
        Array2::from_shape_fn((1, 100), |(_, t)| {
            let artefact = if t % 2 == 0 { 1.0 } else { -1.0 };
            artefact + 0.1 * (0.37 * t as f64).sin()
        })
    }

    fn session() -> Parrm {
        Parrm::new(recording(), 20.0, 10.0).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_frequencies() {
        assert!(Parrm::new(recording(), 0.0, 10.0).is_err());
        assert!(Parrm::new(recording(), 20.0, 0.0).is_err());
        assert!(Parrm::new(recording(), 20.0, f64::NAN).is_err());
    }

    #[test]
    fn test_sequencing_errors() {
        let mut parrm = session();
        assert!(matches!(
            parrm.create_filter(&FilterDesignConfig::default()),
            Err(ParrmError::PeriodNotEstimated)
        ));
        assert!(matches!(
            parrm.filter_data(None),
            Err(ParrmError::FilterNotCreated)
        ));
        assert!(matches!(
            parrm.explore_filter_params(&ExploreConfig::default()),
            Err(ParrmError::PeriodNotEstimated)
        ));
        assert!(matches!(parrm.period(), Err(ParrmError::PeriodNotEstimated)));
        assert!(matches!(parrm.filter(), Err(ParrmError::FilterNotCreated)));
        assert!(matches!(
            parrm.filtered_data(),
            Err(ParrmError::DataNotFiltered)
        ));
        assert!(matches!(
            parrm.settings(),
            Err(ParrmError::SettingsNotEstablished)
        ));

        parrm.find_period(&PeriodSearchConfig::default()).unwrap();
        assert!(matches!(
            parrm.filter_data(None),
            Err(ParrmError::FilterNotCreated)
        ));
    }

    #[test]
    fn test_failed_operation_leaves_state_untouched() {
        let mut parrm = session();
        parrm.find_period(&PeriodSearchConfig::default()).unwrap();
        parrm.create_filter(&FilterDesignConfig::default()).unwrap();
        let before = parrm.filter().unwrap().clone();

        let bad = FilterDesignConfig {
            omit_n_samples: Some(48),
            ..FilterDesignConfig::default()
        };
        assert!(parrm.create_filter(&bad).is_err());
        assert_eq!(parrm.filter().unwrap(), &before);
    }

    #[test]
    fn test_settings_snapshot() {
        let mut parrm = session();
        parrm
            .find_period(&PeriodSearchConfig {
                random_seed: Some(44),
                ..PeriodSearchConfig::default()
            })
            .unwrap();

        let settings = parrm.settings().unwrap();
        assert_eq!(settings.data.n_channels, 1);
        assert_eq!(settings.data.n_samples, 100);
        assert_eq!(settings.period_search.random_seed, Some(44));
        assert!(settings.filter.is_none());

        parrm.create_filter(&FilterDesignConfig::default()).unwrap();
        let settings = parrm.settings().unwrap();
        let filter = settings.filter.expect("filter settings recorded");
        assert!(filter.period_half_width > 0.0);
        assert!(filter.filter_half_width >= 1);
    }

    #[test]
    fn test_filtered_data_matches_last_call() {
        let mut parrm = session();
        parrm.find_period(&PeriodSearchConfig::default()).unwrap();
        parrm.create_filter(&FilterDesignConfig::default()).unwrap();
        let filtered = parrm.filter_data(None).unwrap();
        assert_eq!(parrm.filtered_data().unwrap(), &filtered);
    }
}
