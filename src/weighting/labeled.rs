//! Weighted quantiles over a named dimension of labeled arrays and datasets

use super::alignment::SampleWeights;
use super::quantile::{weighted_quantile, QuantileOptions};
use crate::errors::Result;
use crate::labeled::{labels, LabeledArray, LabeledData};
use tracing::debug;

/// Name of the dimension that replaces the weighting dimension in results
pub const QUANTILE_DIM: &str = "quantile";

/// Weighted quantiles of `data` along `dim`
///
/// Datasets are handled variable by variable: every variable indexed by `dim`
/// is reduced, the others are returned unchanged. Label-indexed weights are
/// selected in the order of the data's `dim` labels.
///
/// # Errors
///
/// Returns `DimensionNotFound` when a plain array lacks `dim`,
/// `AlignmentError` when a data label has no weight and `ShapeError` when
/// positional weights do not match the length of `dim`.
pub fn weighted_quantile_labeled(
    data: &LabeledData,
    quantiles: &[f64],
    sample_weight: &SampleWeights,
    dim: &str,
    values_sorted: bool,
) -> Result<LabeledData> {
    let options = QuantileOptions::new().values_sorted(values_sorted);
    weighted_quantile_labeled_with(data, quantiles, sample_weight, dim, options)
}

/// [`weighted_quantile_labeled`] with full control over [`QuantileOptions`]
///
/// # Errors
///
/// Same as [`weighted_quantile_labeled`].
pub fn weighted_quantile_labeled_with(
    data: &LabeledData,
    quantiles: &[f64],
    sample_weight: &SampleWeights,
    dim: &str,
    options: QuantileOptions,
) -> Result<LabeledData> {
    data.map_over_dim(dim, |array| {
        weighted_quantile_array(array, quantiles, sample_weight, dim, options)
    })
}

/// Weighted quantiles of a single labeled array along `dim`
///
/// The output has the same dimensions except that `dim` is replaced, in
/// place, by [`QUANTILE_DIM`] labeled with the requested quantile values.
///
/// # Errors
///
/// Same as [`weighted_quantile_labeled`].
pub fn weighted_quantile_array(
    array: &LabeledArray,
    quantiles: &[f64],
    sample_weight: &SampleWeights,
    dim: &str,
    options: QuantileOptions,
) -> Result<LabeledArray> {
    let axis = array.require_axis(dim)?;
    let weights = sample_weight.resolve(array.coords_of_axis(axis))?;
    quantiles_along(array, quantiles, Some(weights.as_slice()), axis, options)
}

/// Unweighted percentiles of `data` along `dim`, labeled like the weighted form
///
/// # Errors
///
/// Returns `DimensionNotFound` when a plain array lacks `dim`.
pub fn percentile_labeled(data: &LabeledData, quantiles: &[f64], dim: &str) -> Result<LabeledData> {
    data.map_over_dim(dim, |array| {
        let axis = array.require_axis(dim)?;
        quantiles_along(array, quantiles, None, axis, QuantileOptions::new())
    })
}

fn quantiles_along(
    array: &LabeledArray,
    quantiles: &[f64],
    weights: Option<&[f64]>,
    axis: usize,
    options: QuantileOptions,
) -> Result<LabeledArray> {
    debug!(
        "Quantiles of '{}' over axis {axis} with shape {:?} (weighted: {})",
        array.name().unwrap_or("<unnamed>"),
        array.shape(),
        weights.is_some()
    );

    let result = weighted_quantile(array.data(), quantiles, weights, Some(axis), options)?;

    let mut dims = array.dims().to_vec();
    dims[axis] = QUANTILE_DIM.to_string();
    let mut coords: Vec<_> = (0..array.ndim())
        .map(|i| array.coords_of_axis(i).to_vec())
        .collect();
    coords[axis] = labels(quantiles.iter().copied());

    array.rebuild(result, dims, coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ImpactLabError;
    use crate::labeled::{Coordinate, Dataset};
    use crate::weighting::alignment::LabeledWeights;
    use ndarray::{Array1, Array2};

    fn models() -> LabeledArray {
        let data = Array2::from_shape_vec((3, 2), vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0])
            .unwrap()
            .into_dyn();
        LabeledArray::new(
            data,
            vec!["model".to_string(), "year".to_string()],
            vec![labels(["a", "b", "c"]), labels([2050.0, 2090.0])],
        )
        .unwrap()
    }

    #[test]
    fn test_quantile_dim_replaces_weighting_dim() {
        let data = LabeledData::from(models());
        let weights = SampleWeights::from(vec![1.0, 1.0, 1.0]);
        let result = weighted_quantile_labeled(&data, &[0.5, 0.1], &weights, "model", false).unwrap();
        let result = result.as_array().unwrap();

        assert_eq!(result.dims(), &["quantile".to_string(), "year".to_string()]);
        assert_eq!(result.coords("quantile").unwrap(), labels([0.5, 0.1]).as_slice());
        assert_eq!(result.coords("year").unwrap(), labels([2050.0, 2090.0]).as_slice());
        assert_eq!(result.data()[[0, 0]], 2.0);
        assert_eq!(result.data()[[0, 1]], 20.0);
    }

    #[test]
    fn test_labeled_weights_follow_data_order() {
        let data = LabeledData::from(models());
        let weights = SampleWeights::from(LabeledWeights::from_pairs([("c", 1.0), ("a", 0.0), ("b", 0.0)]));
        let result = weighted_quantile_labeled(&data, &[0.5], &weights, "model", false).unwrap();
        let result = result.as_array().unwrap();
        assert_eq!(result.data().as_slice().unwrap(), &[3.0, 30.0]);
    }

    #[test]
    fn test_percentile_labeled() {
        let data = LabeledData::from(models());
        let result = percentile_labeled(&data, &[0.0, 0.25, 1.0], "model").unwrap();
        let result = result.as_array().unwrap();
        assert_eq!(result.dims(), &["quantile".to_string(), "year".to_string()]);
        let first_year: Vec<f64> = (0..3).map(|i| result.data()[[i, 0]]).collect();
        assert_eq!(first_year, vec![1.0, 1.5, 3.0]);
    }

    #[test]
    fn test_missing_weight_label() {
        let data = LabeledData::from(models());
        let weights = SampleWeights::from(LabeledWeights::from_pairs([("a", 1.0), ("b", 1.0)]));
        let err = weighted_quantile_labeled(&data, &[0.5], &weights, "model", false).unwrap_err();
        assert!(matches!(err, ImpactLabError::AlignmentError { label } if label == "c"));
    }

    #[test]
    fn test_missing_dim_on_array() {
        let data = LabeledData::from(models().with_name("tas"));
        let weights = SampleWeights::from(vec![1.0, 1.0, 1.0]);
        let err = weighted_quantile_labeled(&data, &[0.5], &weights, "scenario", false).unwrap_err();
        assert!(matches!(err, ImpactLabError::DimensionNotFound { var, dim } if var == "tas" && dim == "scenario"));
    }

    #[test]
    fn test_dataset_variables_without_dim_pass_through() {
        let mut dataset = Dataset::new();
        dataset.insert("tas", models());
        let area = LabeledArray::new(
            Array1::from(vec![5.0, 6.0]).into_dyn(),
            vec!["year".to_string()],
            vec![labels([2050.0, 2090.0])],
        )
        .unwrap();
        dataset.insert("area", area.clone());

        let weights = SampleWeights::from(vec![0.0, 1.0, 0.0]);
        let result =
            weighted_quantile_labeled(&LabeledData::from(dataset), &[0.5], &weights, "model", false).unwrap();
        let result = result.as_dataset().unwrap();

        let tas = result.variable("tas").unwrap();
        assert_eq!(tas.coords("quantile").unwrap(), &[Coordinate::Number(0.5)]);
        assert_eq!(tas.data().as_slice().unwrap(), &[2.0, 20.0]);
        assert_eq!(result.variable("area").unwrap(), &area.with_name("area"));
    }
}
