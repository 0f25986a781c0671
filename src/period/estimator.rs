//! Candidate-offset scoring and fractional period refinement.
//!
//! The artefact period is found by testing how well each candidate offset
//! `k` explains the recording's periodicity: the pointwise differences
//! between the signal and its `k`-shifted copy collapse towards pure noise
//! at the true period, while wrong offsets additionally pick up signal
//! mismatch. Scores are pooled across channels and trimmed robustly so a
//! few large transients cannot steer the search.

use crate::config::ResolvedPeriodSearch;
use crate::constants::{CURVATURE_EPSILON, MAX_PAIRS_PER_CANDIDATE, SEED_MIX};
use crate::parallel::WorkerPool;
use crate::period::stats::robust_mean_square;
use ndarray::ArrayView2;
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Estimate the artefact period, in samples, from already-validated search
/// settings. The returned period may be fractional.
pub(crate) fn estimate_period(
    data: ArrayView2<'_, f64>,
    search: &ResolvedPeriodSearch,
    pool: &WorkerPool,
) -> f64 {
    // The base seed is fixed before dispatch so the per-candidate streams,
    // and therefore the scores, do not depend on the parallelism degree.
    let base_seed = search.random_seed.unwrap_or_else(|| {
        let mut rng: ChaCha8Rng = rand::make_rng();
        rng.random()
    });
    let outlier_boundary = search.outlier_boundary;

    let scores = pool.map(search.search_samples.clone(), |offset| {
        score_candidate(data, offset, outlier_boundary, candidate_seed(base_seed, offset))
    });

    let best = argmin(&scores);
    refine(&search.search_samples, &scores, best)
}

fn candidate_seed(base_seed: u64, offset: usize) -> u64 {
    base_seed ^ (offset as u64).wrapping_mul(SEED_MIX)
}

/// Robust dispersion of the differences between the recording and its
/// `offset`-shifted copy, pooled over every channel.
fn score_candidate(data: ArrayView2<'_, f64>, offset: usize, outlier_boundary: f64, seed: u64) -> f64 {
    let n_channels = data.nrows();
    let n_samples = data.ncols();
    let pairs_per_channel = n_samples - offset;
    let total_pairs = n_channels * pairs_per_channel;

    let diffs: Vec<f64> = if total_pairs <= MAX_PAIRS_PER_CANDIDATE {
        let mut diffs = Vec::with_capacity(total_pairs);
        for row in data.outer_iter() {
            for t in 0..pairs_per_channel {
                diffs.push(row[t + offset] - row[t]);
            }
        }
        diffs
    } else {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..MAX_PAIRS_PER_CANDIDATE)
            .map(|_| {
                let i = (rng.random::<u64>() % total_pairs as u64) as usize;
                let channel = i / pairs_per_channel;
                let t = i % pairs_per_channel;
                data[[channel, t + offset]] - data[[channel, t]]
            })
            .collect()
    };

    robust_mean_square(&diffs, outlier_boundary)
}

/// Index of the minimal score; ties break to the earliest (lowest) offset.
fn argmin(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate() {
        if score < scores[best] {
            best = i;
        }
    }
    best
}

/// Parabolic interpolation over the two adjacent candidates, converting the
/// best integer offset into a fractional period. Falls back to the integer
/// offset at the search-range edges, across gaps in the candidate set, and
/// for flat score triplets.
fn refine(search_samples: &[usize], scores: &[f64], best: usize) -> f64 {
    let k = search_samples[best] as f64;
    if best == 0 || best + 1 == search_samples.len() {
        return k;
    }
    if search_samples[best - 1] + 1 != search_samples[best]
        || search_samples[best] + 1 != search_samples[best + 1]
    {
        return k;
    }

    let below = scores[best - 1];
    let here = scores[best];
    let above = scores[best + 1];
    let curvature = below - 2.0 * here + above;
    if !curvature.is_finite() || curvature.abs() < CURVATURE_EPSILON {
        return k;
    }
    let delta = 0.5 * (below - above) / curvature;
    k + delta.clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeriodSearchConfig;
    use crate::parallel::Parallelism;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use std::f64::consts::TAU;

    fn sine_recording(n_channels: usize, n_samples: usize, period: f64) -> Array2<f64> {
        Array2::from_shape_fn((n_channels, n_samples), |(c, t)| {
            (TAU * t as f64 / period + c as f64).sin()
        })
    }

    fn resolved(search_samples: Vec<usize>, seed: Option<u64>) -> ResolvedPeriodSearch {
        ResolvedPeriodSearch {
            search_samples,
            assumed_periods: vec![10.0],
            outlier_boundary: 3.0,
            random_seed: seed,
            n_jobs: 1,
        }
    }

    #[test]
    fn test_estimates_integer_period_of_sinusoid() {
        let data = sine_recording(2, 200, 10.0);
        let pool = WorkerPool::new(Parallelism::Threads(1)).unwrap();
        let search = resolved((5..=15).collect(), Some(0));
        let period = estimate_period(data.view(), &search, &pool);
        assert_relative_eq!(period, 10.0, epsilon = 0.05);
    }

    #[test]
    fn test_constant_signal_ties_break_to_lowest_offset() {
        let data = Array2::from_elem((1, 64), 1.5);
        let pool = WorkerPool::new(Parallelism::Threads(1)).unwrap();
        let search = resolved(vec![4, 5, 6, 7], Some(0));
        let period = estimate_period(data.view(), &search, &pool);
        assert_eq!(period, 4.0);
    }

    #[test]
    fn test_refinement_stays_within_half_sample() {
        // A fractional true period lands between integer candidates.
        let data = sine_recording(1, 400, 12.4);
        let pool = WorkerPool::new(Parallelism::Threads(1)).unwrap();
        let search = resolved((8..=16).collect(), Some(0));
        let period = estimate_period(data.view(), &search, &pool);
        assert!(
            (period - 12.4).abs() <= 0.5,
            "refined period {period} too far from 12.4"
        );
    }

    #[test]
    fn test_refine_skips_non_contiguous_candidates() {
        let search_samples = vec![4, 8, 12];
        let scores = vec![3.0, 1.0, 3.0];
        assert_eq!(refine(&search_samples, &scores, 1), 8.0);
    }

    #[test]
    fn test_subsampled_scoring_is_seed_deterministic() {
        let n_samples = MAX_PAIRS_PER_CANDIDATE + 500;
        let data = sine_recording(1, n_samples, 10.0);
        let a = score_candidate(data.view(), 7, 3.0, 42);
        let b = score_candidate(data.view(), 7, 3.0, 42);
        let c = score_candidate(data.view(), 7, 3.0, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_seeded_search_is_reproducible_through_config() {
        let data = sine_recording(1, 100, 2.0);
        let config = PeriodSearchConfig {
            random_seed: Some(44),
            ..PeriodSearchConfig::default()
        };
        let resolved = config.resolve(data.ncols(), 20.0, 10.0).unwrap();
        let pool = WorkerPool::new(Parallelism::Threads(1)).unwrap();
        let a = estimate_period(data.view(), &resolved, &pool);
        let b = estimate_period(data.view(), &resolved, &pool);
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
