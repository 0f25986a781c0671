use crate::filter::FilterTemplate;
use ndarray::{Array2, ArrayView2};

/// Apply a filter template to a recording, channel by channel.
///
/// At every reference index the weighted mean over the template offsets
/// that land inside the recording estimates the artefact level; the output
/// is the input minus that estimate. Offsets falling outside the recording
/// are dropped and the weights renormalised over the remaining subset, so
/// no out-of-bounds sample is ever referenced. An index whose valid subset
/// is empty (inputs much shorter than the smallest offset) passes through
/// unchanged.
///
/// The template is not mutated and may be reapplied to recordings of any
/// length and channel count.
pub fn apply_template(template: &FilterTemplate, data: ArrayView2<'_, f64>) -> Array2<f64> {
    let (n_channels, n_samples) = data.dim();
    let mut output = Array2::zeros((n_channels, n_samples));

    for (channel, row) in data.outer_iter().enumerate() {
        for t in 0..n_samples {
            let mut estimate = 0.0;
            let mut weight_sum = 0.0;
            for (&offset, &weight) in template.offsets().iter().zip(template.weights()) {
                let index = t as isize + offset;
                if index >= 0 && (index as usize) < n_samples {
                    estimate += weight * row[index as usize];
                    weight_sum += weight;
                }
            }
            output[[channel, t]] = if weight_sum > 0.0 {
                row[t] - estimate / weight_sum
            } else {
                row[t]
            };
        }
    }

    output
}
