pub mod config;
mod constants;
pub mod error;
pub mod explore;
pub mod filter;
pub mod parallel;
pub mod period;
pub mod session;
pub mod spectral;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use config::{ExploreConfig, FilterDesignConfig, FilterDirection, PeriodSearchConfig};
pub use error::{ParrmError, Result};
pub use filter::{FilterTemplate, apply_template};
pub use parallel::Parallelism;
pub use session::{Parrm, Settings};
pub use spectral::{PowerSpectrum, power_spectrum};
