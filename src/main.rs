use anyhow::{Context, bail};
use clap::Parser;
use ndarray::Array2;
use std::path::{Path, PathBuf};

use parrm::{
    FilterDesignConfig, FilterDirection, Parallelism, Parrm, PeriodSearchConfig,
};

#[derive(Parser, Debug)]
#[command(name = "parrm")]
#[command(about = "Remove a quasi-periodic stimulation artefact from a CSV recording", long_about = None)]
struct Args {
    /// Input CSV, one row per sample, one column per channel
    input: PathBuf,

    /// Output CSV (defaults to `<input>_filtered.csv`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Sampling frequency in Hz
    #[arg(long)]
    sampling_freq: f64,

    /// Nominal artefact frequency in Hz
    #[arg(long)]
    artefact_freq: f64,

    /// Outlier boundary for period scoring, in robust standard deviations
    #[arg(long)]
    outlier_boundary: Option<f64>,

    /// Seed for reproducible period estimation
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (0 = all available cores)
    #[arg(long, default_value = "1")]
    jobs: usize,

    /// Offsets the filter may draw from: past, future, both
    #[arg(long, value_enum, default_value = "both")]
    direction: FilterDirection,

    /// Period cycles to include on each side of the reference sample
    #[arg(long)]
    filter_half_width: Option<usize>,

    /// Samples around the zero offset excluded from the filter
    #[arg(long)]
    omit_n_samples: Option<usize>,

    /// Tolerance in samples around each period multiple
    #[arg(long)]
    period_half_width: Option<f64>,

    /// Print the settings snapshot as JSON after filtering
    #[arg(long)]
    print_settings: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let parallelism = match args.jobs {
        0 => Parallelism::All,
        n => Parallelism::Threads(n),
    };

    let data = read_recording(&args.input)?;
    log::info!(
        "loaded {} channel(s) x {} sample(s) from {}",
        data.nrows(),
        data.ncols(),
        args.input.display()
    );

    let mut parrm = Parrm::new(data, args.sampling_freq, args.artefact_freq)?;

    let period = parrm.find_period(&PeriodSearchConfig {
        outlier_boundary: args.outlier_boundary,
        random_seed: args.seed,
        parallelism,
        ..PeriodSearchConfig::default()
    })?;
    println!("Estimated artefact period: {period:.4} samples");

    let template = parrm.create_filter(&FilterDesignConfig {
        filter_half_width: args.filter_half_width,
        omit_n_samples: args.omit_n_samples,
        period_half_width: args.period_half_width,
        filter_direction: args.direction,
    })?;
    println!("Filter uses {} relative offsets", template.len());

    let filtered = parrm.filter_data(None)?;

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));
    write_recording(&output, &filtered)?;
    println!("Wrote filtered recording to {}", output.display());

    if args.print_settings {
        let settings = parrm.settings()?;
        println!("{}", serde_json::to_string_pretty(&settings)?);
    }

    Ok(())
}

/// Read a CSV of samples-by-channels into a (channel, sample) array.
fn read_recording(path: &Path) -> anyhow::Result<Array2<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut n_channels = 0usize;
    let mut samples: Vec<f64> = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read row {}", row + 1))?;
        if n_channels == 0 {
            n_channels = record.len();
        } else if record.len() != n_channels {
            bail!(
                "row {} has {} column(s), expected {}",
                row + 1,
                record.len(),
                n_channels
            );
        }
        for field in record.iter() {
            let value: f64 = field
                .trim()
                .parse()
                .with_context(|| format!("row {}: invalid value {field:?}", row + 1))?;
            samples.push(value);
        }
    }
    if n_channels == 0 {
        bail!("{} contains no samples", path.display());
    }

    let n_samples = samples.len() / n_channels;
    let by_sample = Array2::from_shape_vec((n_samples, n_channels), samples)?;
    Ok(by_sample.reversed_axes().as_standard_layout().to_owned())
}

/// Write a (channel, sample) array as a CSV of samples-by-channels.
fn write_recording(path: &Path, data: &Array2<f64>) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for t in 0..data.ncols() {
        let row: Vec<String> = data.column(t).iter().map(|v| v.to_string()).collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    input.with_file_name(format!("{stem}_filtered.csv"))
}
