use approx::assert_relative_eq;
use impactlab_tools::labeled::{Coordinate, LabeledArray, LabeledData};
use impactlab_tools::weighting::{
    weighted_quantile, weighted_quantile_1d, weighted_quantile_labeled, LabeledWeights,
    QuantileOptions, SampleWeights,
};
use ndarray::{Array3, ArrayD, Axis};
use proptest::prelude::*;

const DIMS: [&str; 3] = ["x", "y", "z"];

fn labeled_cube(data: ArrayD<f64>) -> LabeledArray {
    let dims = DIMS.iter().map(ToString::to_string).collect();
    let coords = DIMS
        .iter()
        .map(|d| (0..5).map(|i| Coordinate::from(format!("{d}{i}"))).collect())
        .collect();
    LabeledArray::new(data, dims, coords).expect("valid cube")
}

/// Sum of the three indices, increasing along every axis
fn increasing_array() -> LabeledArray {
    labeled_cube(Array3::from_shape_fn((5, 5, 5), |(i, j, k)| (i + j + k) as f64).into_dyn())
}

/// Distinct values in scrambled order
fn scrambled_array() -> LabeledArray {
    labeled_cube(
        Array3::from_shape_fn((5, 5, 5), |(i, j, k)| ((i * 25 + j * 5 + k) * 37 % 125) as f64 / 125.0)
            .into_dyn(),
    )
}

fn quantiles_over(array: &LabeledArray, quantiles: &[f64], weights: SampleWeights, dim: &str) -> LabeledArray {
    let result = weighted_quantile_labeled(&LabeledData::from(array.clone()), quantiles, &weights, dim, false)
        .expect("weighted quantiles");
    result.as_array().expect("array result").clone()
}

#[test]
fn test_unweighted_median() {
    let array = scrambled_array();
    for dim in DIMS {
        let axis = array.axis_of(dim).unwrap();
        let weighted = quantiles_over(&array, &[0.5], SampleWeights::from(vec![1.0; 5]), dim);

        for (lane, result) in array
            .data()
            .lanes(Axis(axis))
            .into_iter()
            .zip(weighted.data().lanes(Axis(axis)))
        {
            let mut sorted = lane.to_vec();
            sorted.sort_by(f64::total_cmp);
            assert_eq!(result[0], sorted[2]);
        }
    }
}

#[test]
fn test_first_value() {
    let array = scrambled_array();
    for dim in DIMS {
        let weighted = quantiles_over(&array, &[0.5], SampleWeights::from(vec![1.0, 0.0, 0.0, 0.0, 0.0]), dim);
        let first = array.isel(dim, 0).unwrap();
        let result = weighted.isel("quantile", 0).unwrap();
        assert_eq!(result.data(), first.data());
    }
}

#[test]
fn test_manual_weighting() {
    let array = increasing_array();
    for dim in DIMS {
        let weighted = quantiles_over(&array, &[0.5], SampleWeights::from(vec![0.25, 0.5, 0.0, 0.0, 0.25]), dim);
        // median of the samples at [0, 1, 1, 4] is the sample at index 1
        let manual = array.isel(dim, 1).unwrap();
        let result = weighted.isel("quantile", 0).unwrap();
        assert_eq!(result.data(), manual.data());
    }
}

#[test]
fn test_unsorted_weights_index() {
    let array = increasing_array();
    for dim in DIMS {
        let weights = LabeledWeights::from_pairs(
            [2, 4, 1, 3, 0]
                .into_iter()
                .map(|i| format!("{dim}{i}"))
                .zip([0.25, 0.5, 0.25, 0.0, 0.0]),
        );
        let weighted = quantiles_over(&array, &[0.125, 0.5], SampleWeights::from(weights), dim);

        assert_eq!(
            weighted.coords("quantile").unwrap(),
            &[Coordinate::Number(0.125), Coordinate::Number(0.5)]
        );
        for (q, index) in [1, 3].into_iter().enumerate() {
            let manual = array.isel(dim, index).unwrap();
            let result = weighted.isel("quantile", q).unwrap();
            assert_eq!(result.data(), manual.data());
        }
    }
}

#[test]
fn test_weighted_quantile_documented_examples() {
    let values = [0.0, 1.0, 2.0, 3.0, 4.0];
    let result =
        weighted_quantile_1d(&values, &[0.5], Some(&[0.25, 0.5, 0.0, 0.0, 0.25]), QuantileOptions::new())
            .unwrap();
    assert_eq!(result, vec![1.0]);

    let result =
        weighted_quantile_1d(&values, &[0.5], Some(&[1.0, 0.0, 0.0, 0.0, 0.0]), QuantileOptions::new())
            .unwrap();
    assert_eq!(result, vec![0.0]);
}

fn sample_and_weights() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    prop::collection::btree_set(-1000i32..1000, 1..20).prop_flat_map(|set| {
        let values: Vec<f64> = set.into_iter().map(f64::from).collect();
        let len = values.len();
        (Just(values), prop::collection::vec(0.1f64..10.0, len))
    })
}

fn array_axis_and_weights() -> impl Strategy<Value = (ArrayD<f64>, usize, Vec<f64>)> {
    (1usize..5, 1usize..5, 1usize..5, 0usize..3).prop_flat_map(|(a, b, c, axis)| {
        let shape = [a, b, c];
        (
            prop::collection::vec(-50.0f64..50.0, a * b * c),
            Just(axis),
            prop::collection::vec(0.0f64..5.0, shape[axis]),
        )
            .prop_map(move |(data, axis, weights)| {
                let array = ArrayD::from_shape_vec(shape.to_vec(), data).expect("matching length");
                (array, axis, weights)
            })
    })
}

proptest! {
    #[test]
    fn prop_joint_permutation_does_not_change_result(
        (values, weights) in sample_and_weights(),
        shift in 0usize..20,
        quantiles in prop::collection::vec(0.0f64..1.0, 1..6),
    ) {
        let expected = weighted_quantile_1d(&values, &quantiles, Some(&weights), QuantileOptions::new()).unwrap();

        let n = values.len();
        let permuted_values: Vec<f64> = (0..n).rev().map(|i| values[(i + shift) % n]).collect();
        let permuted_weights: Vec<f64> = (0..n).rev().map(|i| weights[(i + shift) % n]).collect();
        let result =
            weighted_quantile_1d(&permuted_values, &quantiles, Some(&permuted_weights), QuantileOptions::new())
                .unwrap();

        for (r, e) in result.iter().zip(&expected) {
            assert_relative_eq!(r, e, epsilon = 1e-9, max_relative = 1e-9);
        }
    }

    #[test]
    fn prop_lanes_match_one_dimensional_result(
        (array, axis, weights) in array_axis_and_weights(),
        legacy in any::<bool>(),
    ) {
        let quantiles = [0.05, 0.5, 0.95];
        let options = QuantileOptions::new().legacy_normalization(legacy);
        let result = weighted_quantile(&array, &quantiles, Some(&weights), Some(axis), options).unwrap();

        let mut expected_shape = array.shape().to_vec();
        expected_shape[axis] = quantiles.len();
        prop_assert_eq!(result.shape(), expected_shape.as_slice());

        for (lane, out) in array.lanes(Axis(axis)).into_iter().zip(result.lanes(Axis(axis))) {
            let expected = weighted_quantile_1d(&lane.to_vec(), &quantiles, Some(&weights), options).unwrap();
            for (r, e) in out.iter().zip(&expected) {
                prop_assert!(r == e || (r.is_nan() && e.is_nan()));
            }
        }
    }
}
