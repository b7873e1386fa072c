//! Weighted quantile computation over samples and array axes
//!
//! Positions follow the Hazen weighted order-statistic convention: each sorted
//! sample sits at the midpoint of its cumulative weight mass,
//! `p_i = (cumsum(w)_i - w_i / 2) / sum(w)`. Query quantiles are linearly
//! interpolated against `(p_i, value_i)` and clamped to the extreme values
//! outside `[p_0, p_{N-1}]`.

use crate::errors::{ImpactLabError, Result};
use ndarray::{ArrayD, ArrayView1, Axis, IxDyn};
use rayon::prelude::*;
use tracing::debug;

/// Flags shared by the weighted quantile functions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantileOptions {
    /// Skip sorting; the caller guarantees the values are ascending
    pub values_sorted: bool,
    /// Min-max rescale midpoint positions onto [0, 1] instead of dividing by the total weight
    pub legacy_normalization: bool,
}

impl QuantileOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn values_sorted(mut self, values_sorted: bool) -> Self {
        self.values_sorted = values_sorted;
        self
    }

    #[must_use]
    pub const fn legacy_normalization(mut self, legacy_normalization: bool) -> Self {
        self.legacy_normalization = legacy_normalization;
        self
    }
}

/// Unweighted quantiles by linear interpolation between order statistics
///
/// Quantile `q` maps to rank `q * (N - 1)` in the sorted sample. Ranks outside
/// the sample are clamped to the minimum or maximum.
///
/// # Errors
///
/// Returns [`ImpactLabError::EmptySample`] if `values` is empty.
pub fn percentile_1d(values: &[f64], quantiles: &[f64]) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(ImpactLabError::EmptySample);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = sorted.len() - 1;

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let result = quantiles
        .iter()
        .map(|&q| {
            if q.is_nan() {
                return f64::NAN;
            }
            let rank = (q * last as f64).clamp(0.0, last as f64);
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
            }
        })
        .collect();

    Ok(result)
}

/// Weighted quantiles of a one-dimensional sample
///
/// Without weights this is [`percentile_1d`]. With weights, values are sorted
/// jointly with their weights (unless `options.values_sorted`), each sample is
/// placed at its weighted midpoint position and the requested quantiles are
/// interpolated. Negative weights and quantiles outside [0, 1] are not
/// rejected; a zero total weight yields NaN.
///
/// # Errors
///
/// Returns [`ImpactLabError::EmptySample`] for an empty sample and
/// [`ImpactLabError::ShapeError`] if `weights` differs in length from `values`.
pub fn weighted_quantile_1d(
    values: &[f64],
    quantiles: &[f64],
    weights: Option<&[f64]>,
    options: QuantileOptions,
) -> Result<Vec<f64>> {
    let Some(weights) = weights else {
        return percentile_1d(values, quantiles);
    };

    if values.is_empty() {
        return Err(ImpactLabError::EmptySample);
    }
    ImpactLabError::check_lengths(values.len(), weights.len())?;

    let (sorted_values, sorted_weights) = if options.values_sorted {
        (values.to_vec(), weights.to_vec())
    } else {
        sort_jointly(values, weights)
    };

    let positions = midpoint_positions(&sorted_weights, options.legacy_normalization);
    if positions.iter().any(|p| p.is_nan()) {
        return Ok(vec![f64::NAN; quantiles.len()]);
    }

    Ok(quantiles
        .iter()
        .map(|&q| interpolate(q, &positions, &sorted_values))
        .collect())
}

/// Weighted quantiles along one axis of an N-dimensional array
///
/// With `axis == None` the array is flattened in logical order and the result
/// has shape `[quantiles.len()]`. Otherwise every lane along `axis` is reduced
/// independently (in parallel) and the output keeps the input shape with
/// `axis` resized to `quantiles.len()`.
///
/// # Errors
///
/// Returns [`ImpactLabError::AxisOutOfBounds`] for an invalid axis, or any
/// error of [`weighted_quantile_1d`] raised on a lane.
pub fn weighted_quantile(
    values: &ArrayD<f64>,
    quantiles: &[f64],
    weights: Option<&[f64]>,
    axis: Option<usize>,
    options: QuantileOptions,
) -> Result<ArrayD<f64>> {
    let Some(axis) = axis else {
        let flat: Vec<f64> = values.iter().copied().collect();
        let result = weighted_quantile_1d(&flat, quantiles, weights, options)?;
        return Ok(ArrayD::from_shape_vec(IxDyn(&[quantiles.len()]), result)?);
    };

    if axis >= values.ndim() {
        return Err(ImpactLabError::AxisOutOfBounds {
            axis,
            ndim: values.ndim(),
        });
    }
    if let Some(w) = weights {
        ImpactLabError::check_lengths(values.len_of(Axis(axis)), w.len())?;
    }

    let lanes: Vec<ArrayView1<f64>> = values.lanes(Axis(axis)).into_iter().collect();

    debug!(
        "Computing {} quantiles over {} lanes of length {} on {} threads",
        quantiles.len(),
        lanes.len(),
        values.len_of(Axis(axis)),
        rayon::current_num_threads()
    );

    let results: Vec<Vec<f64>> = lanes
        .par_iter()
        .map(|lane| {
            let sample = lane.to_vec();
            weighted_quantile_1d(&sample, quantiles, weights, options)
        })
        .collect::<Result<_>>()?;

    let mut shape = values.shape().to_vec();
    shape[axis] = quantiles.len();
    let mut output = ArrayD::<f64>::zeros(shape);

    for (mut lane, result) in output.lanes_mut(Axis(axis)).into_iter().zip(&results) {
        lane.assign(&ArrayView1::from(result.as_slice()));
    }

    Ok(output)
}

/// Sort values ascending (NaN last) and carry the weights along
fn sort_jointly(values: &[f64], weights: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    order
        .into_iter()
        .map(|i| (values[i], weights[i]))
        .unzip()
}

/// Midpoint of each sample's cumulative weight mass, normalized onto [0, 1]
fn midpoint_positions(weights: &[f64], legacy_normalization: bool) -> Vec<f64> {
    let mut cumulative = 0.0;
    let mut positions: Vec<f64> = weights
        .iter()
        .map(|&w| {
            cumulative += w;
            cumulative - 0.5 * w
        })
        .collect();

    if legacy_normalization {
        let first = positions[0];
        positions.iter_mut().for_each(|p| *p -= first);
        let span = positions[positions.len() - 1];
        positions.iter_mut().for_each(|p| *p /= span);
    } else {
        let total: f64 = weights.iter().sum();
        positions.iter_mut().for_each(|p| *p /= total);
    }

    positions
}

/// Piecewise-linear interpolation with flat extrapolation
///
/// `xp` must be non-decreasing. On tied positions the last sample at that
/// position wins.
fn interpolate(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let last = xp.len() - 1;
    if x.is_nan() {
        return f64::NAN;
    }
    if x < xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }

    // xp[i] <= x < xp[j]
    let j = xp.partition_point(|&p| p <= x);
    let i = j - 1;
    fp[i] + (x - xp[i]) * (fp[j] - fp[i]) / (xp[j] - xp[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    #[test]
    fn test_percentile_matches_linear_interpolation() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        let result = percentile_1d(&values, &[0.0, 0.25, 0.5, 0.9, 1.0]).unwrap();
        // sorted: 1 1 3 4 5
        assert_relative_eq!(result[0], 1.0);
        assert_relative_eq!(result[1], 1.0);
        assert_relative_eq!(result[2], 3.0);
        assert_relative_eq!(result[3], 4.6, epsilon = 1e-12);
        assert_relative_eq!(result[4], 5.0);
    }

    #[test]
    fn test_percentile_clamps_out_of_range() {
        let result = percentile_1d(&[2.0, 4.0], &[-0.5, 1.5]).unwrap();
        assert_eq!(result, vec![2.0, 4.0]);
    }

    #[test]
    fn test_empty_sample() {
        assert!(matches!(
            weighted_quantile_1d(&[], &[0.5], None, QuantileOptions::new()),
            Err(ImpactLabError::EmptySample)
        ));
        assert!(matches!(
            weighted_quantile_1d(&[], &[0.5], Some(&[]), QuantileOptions::new()),
            Err(ImpactLabError::EmptySample)
        ));
    }

    #[test]
    fn test_weight_length_mismatch() {
        let result = weighted_quantile_1d(&[1.0, 2.0, 3.0], &[0.5], Some(&[1.0, 1.0]), QuantileOptions::new());
        assert!(matches!(
            result,
            Err(ImpactLabError::ShapeError {
                values: 3,
                weights: 2
            })
        ));
    }

    #[test]
    fn test_single_mass_returns_first_value() {
        let values = [0.1, 0.4, 0.5, 0.7, 0.9];
        let weights = [1.0, 0.0, 0.0, 0.0, 0.0];
        let result = weighted_quantile_1d(&values, &[0.5], Some(&weights), QuantileOptions::new()).unwrap();
        assert_eq!(result, vec![0.1]);
    }

    #[test]
    fn test_manual_weighting_matches_expanded_median() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0];
        let weights = [0.25, 0.5, 0.0, 0.0, 0.25];
        let result = weighted_quantile_1d(&values, &[0.5], Some(&weights), QuantileOptions::new()).unwrap();
        // median of {0, 1, 1, 4}
        assert_eq!(result, vec![1.0]);
    }

    #[test]
    fn test_hazen_positions() {
        let positions = midpoint_positions(&[0.25, 0.25, 0.5, 0.0], false);
        assert_eq!(positions, vec![0.125, 0.375, 0.75, 1.0]);
    }

    #[test]
    fn test_legacy_positions() {
        let positions = midpoint_positions(&[0.1, 0.2, 0.3, 0.4], true);
        // midpoints 0.05 0.2 0.45 0.8, shifted by 0.05 and divided by 0.75
        assert_relative_eq!(positions[0], 0.0);
        assert_relative_eq!(positions[1], 0.15 / 0.75, epsilon = 1e-12);
        assert_relative_eq!(positions[2], 0.4 / 0.75, epsilon = 1e-12);
        assert_relative_eq!(positions[3], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_weights_legacy_equals_unweighted() {
        let values = [7.0, -2.0, 3.5, 10.0, 0.25, 4.0];
        let quantiles = [0.0, 0.1, 0.33, 0.5, 0.8, 1.0];
        let weights = [1.0; 6];
        let options = QuantileOptions::new().legacy_normalization(true);

        let weighted = weighted_quantile_1d(&values, &quantiles, Some(&weights), options).unwrap();
        let unweighted = weighted_quantile_1d(&values, &quantiles, None, options).unwrap();
        for (w, u) in weighted.iter().zip(&unweighted) {
            assert_relative_eq!(w, u, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_uniform_weights_median_equals_unweighted() {
        let values = [0.3, 0.9, 0.1, 0.5, 0.7];
        let weighted =
            weighted_quantile_1d(&values, &[0.5], Some(&[1.0; 5]), QuantileOptions::new()).unwrap();
        let unweighted = weighted_quantile_1d(&values, &[0.5], None, QuantileOptions::new()).unwrap();
        assert_eq!(weighted, unweighted);
    }

    #[test]
    fn test_out_of_range_quantiles_clamp() {
        let values = [1.0, 2.0, 3.0];
        let result =
            weighted_quantile_1d(&values, &[-1.0, 2.0], Some(&[1.0, 1.0, 1.0]), QuantileOptions::new())
                .unwrap();
        assert_eq!(result, vec![1.0, 3.0]);
    }

    #[test]
    fn test_zero_total_weight_is_nan() {
        let result =
            weighted_quantile_1d(&[1.0, 2.0], &[0.5], Some(&[0.0, 0.0]), QuantileOptions::new()).unwrap();
        assert!(result[0].is_nan());
    }

    #[test]
    fn test_legacy_single_sample_is_nan() {
        let options = QuantileOptions::new().legacy_normalization(true);
        let result = weighted_quantile_1d(&[4.0], &[0.05, 0.5], Some(&[1.0]), options).unwrap();
        assert!(result.iter().all(|v| v.is_nan()));

        let result = weighted_quantile_1d(&[4.0], &[0.5], Some(&[1.0]), QuantileOptions::new()).unwrap();
        assert_eq!(result, vec![4.0]);
    }

    #[test]
    fn test_values_sorted_skips_sorting() {
        let values = [3.0, 1.0, 2.0];
        let weights = [1.0, 1.0, 1.0];
        let sorted_flag = QuantileOptions::new().values_sorted(true);
        // Unsorted input with the flag set is taken at face value
        let result = weighted_quantile_1d(&values, &[0.5], Some(&weights), sorted_flag).unwrap();
        assert_eq!(result, vec![1.0]);
        let result = weighted_quantile_1d(&values, &[0.5], Some(&weights), QuantileOptions::new()).unwrap();
        assert_eq!(result, vec![2.0]);
    }

    #[test]
    fn test_axis_out_of_bounds() {
        let values = ArrayD::<f64>::zeros(vec![2, 2]);
        let result = weighted_quantile(&values, &[0.5], None, Some(2), QuantileOptions::new());
        assert!(matches!(
            result,
            Err(ImpactLabError::AxisOutOfBounds { axis: 2, ndim: 2 })
        ));
    }

    #[test]
    fn test_flattened_without_axis() {
        let values = Array3::from_shape_fn((2, 2, 2), |(i, j, k)| (i * 4 + j * 2 + k) as f64).into_dyn();
        let result = weighted_quantile(&values, &[0.0, 0.5, 1.0], None, None, QuantileOptions::new()).unwrap();
        assert_eq!(result.shape(), &[3]);
        assert_eq!(result.as_slice().unwrap(), &[0.0, 3.5, 7.0]);
    }

    #[test]
    fn test_axis_broadcast_shape_and_values() {
        let values = Array3::from_shape_fn((5, 3, 4), |(i, j, k)| (i + j + k) as f64).into_dyn();
        let quantiles = [0.25, 0.5];
        let weights = [0.25, 0.5, 0.0, 0.0, 0.25];

        let result =
            weighted_quantile(&values, &quantiles, Some(&weights), Some(0), QuantileOptions::new()).unwrap();
        assert_eq!(result.shape(), &[2, 3, 4]);

        for j in 0..3 {
            for k in 0..4 {
                let lane: Vec<f64> = (0..5).map(|i| values[[i, j, k]]).collect();
                let expected =
                    weighted_quantile_1d(&lane, &quantiles, Some(&weights), QuantileOptions::new()).unwrap();
                assert_eq!(result[[0, j, k]], expected[0]);
                assert_eq!(result[[1, j, k]], expected[1]);
            }
        }
    }

    #[test]
    fn test_axis_weight_length_checked() {
        let values = ArrayD::<f64>::zeros(vec![2, 3]);
        let result = weighted_quantile(&values, &[0.5], Some(&[1.0, 1.0]), Some(1), QuantileOptions::new());
        assert!(matches!(result, Err(ImpactLabError::ShapeError { .. })));
    }
}
