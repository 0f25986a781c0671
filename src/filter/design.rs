use crate::config::{FilterDirection, FilterGeometry};
use crate::error::{ParrmError, Result};
use serde::Serialize;

/// Translation-invariant filter template.
///
/// The template records, relative to an arbitrary reference sample, the
/// signed offsets of the samples believed to share the artefact's phase
/// (integer offsets within `period_half_width` of each period multiple up
/// to `filter_half_width` cycles away, outside the omission band) together
/// with their combination weights. Because the table only holds relative
/// offsets, the same template can be replayed on recordings of any length
/// and channel count, subject only to boundary truncation near the edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterTemplate {
    offsets: Vec<isize>,
    weights: Vec<f64>,
    period: f64,
}

impl FilterTemplate {
    /// Build the offset/weight table for `period` against a recording of
    /// `n_samples`, from already-validated geometry.
    ///
    /// # Errors
    /// Returns `ParrmError::NoSuitableFilter` when no offset satisfies the
    /// geometry, i.e. the parameters are individually valid but mutually
    /// infeasible.
    pub(crate) fn build(n_samples: usize, period: f64, geometry: &FilterGeometry) -> Result<Self> {
        let min_offset = geometry.omit_n_samples + 1;
        let max_offset = n_samples - 1;

        let mut magnitudes: Vec<usize> = Vec::new();
        for m in 1..=geometry.filter_half_width {
            let centre = m as f64 * period;
            let lo = (centre - geometry.period_half_width).ceil().max(min_offset as f64) as usize;
            let hi = (centre + geometry.period_half_width).floor().min(max_offset as f64);
            if hi < lo as f64 {
                continue;
            }
            magnitudes.extend(lo..=hi as usize);
        }
        magnitudes.sort_unstable();
        magnitudes.dedup();

        if magnitudes.is_empty() {
            return Err(ParrmError::NoSuitableFilter(format!(
                "no sample offset within {:.3} of a multiple of the {:.3}-sample period \
                 clears the {}-sample omission band in {} samples",
                geometry.period_half_width, period, geometry.omit_n_samples, n_samples
            )));
        }

        let mut offsets: Vec<isize> = Vec::with_capacity(2 * magnitudes.len());
        for &magnitude in &magnitudes {
            let offset = magnitude as isize;
            match geometry.filter_direction {
                FilterDirection::Past => offsets.push(-offset),
                FilterDirection::Future => offsets.push(offset),
                FilterDirection::Both => {
                    offsets.push(-offset);
                    offsets.push(offset);
                }
            }
        }
        offsets.sort_unstable();

        let weight = 1.0 / offsets.len() as f64;
        let weights = vec![weight; offsets.len()];
        Ok(Self {
            offsets,
            weights,
            period,
        })
    }

    /// Signed relative sample offsets, sorted ascending.
    pub fn offsets(&self) -> &[isize] {
        &self.offsets
    }

    /// Combination weights, parallel to `offsets`, summing to 1.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// The period, in samples, the template was built for.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Number of offsets in the template.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(
        filter_half_width: usize,
        omit_n_samples: usize,
        period_half_width: f64,
        filter_direction: FilterDirection,
    ) -> FilterGeometry {
        FilterGeometry {
            filter_half_width,
            omit_n_samples,
            period_half_width,
            filter_direction,
        }
    }

    #[test]
    fn test_build_symmetric_template() {
        let template =
            FilterTemplate::build(100, 2.0, &geometry(3, 0, 0.5, FilterDirection::Both)).unwrap();
        assert_eq!(template.offsets(), &[-6, -4, -2, 2, 4, 6]);
        assert_eq!(template.len(), 6);
        let total: f64 = template.weights().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_build_past_only() {
        let template =
            FilterTemplate::build(100, 2.0, &geometry(2, 0, 0.5, FilterDirection::Past)).unwrap();
        assert_eq!(template.offsets(), &[-4, -2]);
    }

    #[test]
    fn test_build_future_only() {
        let template =
            FilterTemplate::build(100, 2.0, &geometry(2, 0, 0.5, FilterDirection::Future)).unwrap();
        assert_eq!(template.offsets(), &[2, 4]);
    }

    #[test]
    fn test_omission_band_excludes_near_offsets() {
        let template =
            FilterTemplate::build(100, 2.0, &geometry(3, 2, 0.5, FilterDirection::Both)).unwrap();
        // Offsets with |offset| <= 2 are never used.
        assert_eq!(template.offsets(), &[-6, -4, 4, 6]);
    }

    #[test]
    fn test_wide_half_width_merges_overlapping_windows() {
        // period_half_width > period/2 makes adjacent windows overlap; the
        // collected offsets must still be unique.
        let template =
            FilterTemplate::build(50, 3.0, &geometry(2, 0, 2.0, FilterDirection::Future)).unwrap();
        let mut deduped = template.offsets().to_vec();
        deduped.dedup();
        assert_eq!(deduped.len(), template.len());
    }

    #[test]
    fn test_infeasible_geometry_is_detected() {
        // No integer lies within 0.1 of 2.5, the only reachable multiple.
        let err = FilterTemplate::build(100, 2.5, &geometry(1, 0, 0.1, FilterDirection::Both))
            .unwrap_err();
        assert!(matches!(err, ParrmError::NoSuitableFilter(_)));
    }
}
