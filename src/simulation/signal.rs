//! Synthetic contaminated recordings for tests and benchmarks.

use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Settings for a synthetic recording: Gaussian background plus a
/// pulse-train artefact repeating at an exact, possibly fractional, period.
#[derive(Clone, Debug)]
pub struct SyntheticRecordingConfig {
    /// Artefact period in samples.
    pub period: f64,
    /// Peak amplitude of the artefact pulse.
    pub artefact_amplitude: f64,
    /// Pulse lobe width as a fraction of the cycle.
    pub pulse_width: f64,
    /// Standard deviation of the Gaussian background.
    pub noise_std: f64,
    pub seed: Option<u64>,
}

impl Default for SyntheticRecordingConfig {
    fn default() -> Self {
        Self {
            period: 30.0,
            artefact_amplitude: 1.0,
            pulse_width: 0.05,
            noise_std: 0.1,
            seed: None,
        }
    }
}

impl SyntheticRecordingConfig {
    pub fn with_period(mut self, period: f64) -> Self {
        self.period = period;
        self
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.artefact_amplitude = amplitude;
        self
    }

    pub fn with_noise_std(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Charge-balanced biphasic pulse as a function of the sample index.
pub fn artefact_waveform(t: f64, period: f64, pulse_width: f64) -> f64 {
    let phase = (t / period).fract();
    let lobe = |centre: f64| {
        let d = (phase - centre) / pulse_width;
        (-d * d).exp()
    };
    lobe(0.3) - lobe(0.5)
}

/// Generate a (channel, sample) recording with the same artefact train on
/// every channel and independent background noise.
pub fn generate_recording(
    config: &SyntheticRecordingConfig,
    n_channels: usize,
    n_samples: usize,
) -> Array2<f64> {
    let mut rng = create_rng(config.seed);
    let normal = Normal::new(0.0, config.noise_std).unwrap();

    let mut data = Array2::zeros((n_channels, n_samples));
    for channel in 0..n_channels {
        for t in 0..n_samples {
            let artefact = config.artefact_amplitude
                * artefact_waveform(t as f64, config.period, config.pulse_width);
            data[[channel, t]] = artefact + normal.sample(&mut rng);
        }
    }
    data
}

fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}
