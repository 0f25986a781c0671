mod signal;

pub use signal::{SyntheticRecordingConfig, artefact_waveform, generate_recording};
