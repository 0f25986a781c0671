//! Caller-sized worker pool for the data-parallel stages.
//!
//! Candidate-offset scoring and per-channel spectral estimation fan out over
//! this pool and fan back in before returning. `map` keeps results in input
//! order, so every downstream reduction is independent of how the work was
//! scheduled across threads.

use crate::error::{ParrmError, Result};
use rayon::prelude::*;

/// Requested degree of parallelism for a single operation.
///
/// `Threads(n)` asks for exactly `n` workers; requesting more than the
/// available execution units is rejected, not clamped. `All` uses every
/// available unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// Use all available execution units.
    All,
    /// Use exactly this many worker threads (must be >= 1).
    Threads(usize),
}

impl Default for Parallelism {
    fn default() -> Self {
        Self::Threads(1)
    }
}

impl Parallelism {
    /// Resolve to a concrete thread count against the machine's available
    /// execution units.
    ///
    /// # Errors
    /// Returns `ParrmError::InvalidParameter` for a zero count or a count
    /// exceeding the available execution units.
    pub fn resolve(&self) -> Result<usize> {
        let available = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        match *self {
            Parallelism::All => Ok(available),
            Parallelism::Threads(0) => Err(ParrmError::InvalidParameter(
                "`parallelism` must request at least one thread".into(),
            )),
            Parallelism::Threads(n) if n > available => Err(ParrmError::InvalidParameter(format!(
                "`parallelism` requests {n} threads but only {available} execution units are available"
            ))),
            Parallelism::Threads(n) => Ok(n),
        }
    }
}

/// A fixed-size thread pool executing pure per-item functions.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    n_jobs: usize,
}

impl WorkerPool {
    /// Build a pool with the resolved thread count.
    ///
    /// # Errors
    /// Propagates invalid `Parallelism` configuration and pool construction
    /// failures.
    pub fn new(parallelism: Parallelism) -> Result<Self> {
        let n_jobs = parallelism.resolve()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_jobs)
            .build()
            .map_err(|e| ParrmError::WorkerPool(e.to_string()))?;
        Ok(Self { pool, n_jobs })
    }

    /// Number of worker threads in the pool.
    pub fn n_jobs(&self) -> usize {
        self.n_jobs
    }

    /// Apply `f` to every item, in parallel, returning results in input
    /// order regardless of scheduling.
    pub fn map<I, R, F>(&self, items: Vec<I>, f: F) -> Vec<R>
    where
        I: Send,
        R: Send,
        F: Fn(I) -> R + Send + Sync,
    {
        self.pool.install(|| items.into_par_iter().map(f).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_all() {
        let n = Parallelism::All.resolve().unwrap();
        assert!(n >= 1);
    }

    #[test]
    fn test_resolve_rejects_zero() {
        assert!(Parallelism::Threads(0).resolve().is_err());
    }

    #[test]
    fn test_resolve_rejects_oversubscription() {
        let available = Parallelism::All.resolve().unwrap();
        assert!(Parallelism::Threads(available + 1).resolve().is_err());
        assert_eq!(Parallelism::Threads(available).resolve().unwrap(), available);
    }

    #[test]
    fn test_map_preserves_order() {
        let pool = WorkerPool::new(Parallelism::All).unwrap();
        let items: Vec<usize> = (0..100).collect();
        let doubled = pool.map(items, |i| i * 2);
        assert_eq!(doubled, (0..100).map(|i| i * 2).collect::<Vec<_>>());
    }
}
