//! Value binning along a labeled dimension
//!
//! Every lane along the binned dimension is sorted into value bins and each
//! bin is summarized by a [`BinStatistic`]. The dimension is replaced by
//! [`BIN_DIM`], labeled with the interval of each bin.

use crate::errors::{ImpactLabError, Result};
use crate::labeled::{Coordinate, LabeledArray};
use ndarray::{ArrayD, Axis};
use rayon::prelude::*;
use tracing::debug;

/// Dimension holding the bins in binned output
pub const BIN_DIM: &str = "groups";

/// Default number of equal-width bins
pub const DEFAULT_BIN_COUNT: usize = 10;

/// Summary computed over the values falling in one bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinStatistic {
    /// Number of values; 0 for an empty bin
    #[default]
    Count,
    /// Sum of values; 0 for an empty bin
    Sum,
    Mean,
    Median,
    Min,
    Max,
}

impl BinStatistic {
    fn summarize(self, values: &mut [f64]) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let count = values.len() as f64;
        match self {
            Self::Count => count,
            Self::Sum => values.iter().sum(),
            _ if values.is_empty() => f64::NAN,
            Self::Mean => values.iter().sum::<f64>() / count,
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Median => {
                values.sort_by(f64::total_cmp);
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    0.5 * (values[mid - 1] + values[mid])
                } else {
                    values[mid]
                }
            }
        }
    }
}

/// How bins are laid out
#[derive(Debug, Clone, PartialEq)]
pub enum Bins {
    /// Equal-width bins spanning the value range
    Count(usize),
    /// Explicit increasing edges, including the rightmost
    Edges(Vec<f64>),
}

impl Default for Bins {
    fn default() -> Self {
        Self::Count(DEFAULT_BIN_COUNT)
    }
}

impl From<usize> for Bins {
    fn from(count: usize) -> Self {
        Self::Count(count)
    }
}

impl From<Vec<f64>> for Bins {
    fn from(edges: Vec<f64>) -> Self {
        Self::Edges(edges)
    }
}

impl Bins {
    /// Concrete bin edges for `data`
    ///
    /// A bin count spans `value_range`, or the finite minimum and maximum of
    /// the whole array so every lane shares the same edges. A degenerate range
    /// is widened by 0.5 on each side.
    fn edges(&self, data: &ArrayD<f64>, value_range: Option<(f64, f64)>) -> Result<Vec<f64>> {
        match self {
            Self::Count(0) => Err(ImpactLabError::InvalidBins(
                "the number of bins must be positive".to_string(),
            )),
            Self::Count(count) => {
                let (mut lo, mut hi) = match value_range {
                    Some(range) => range,
                    None => finite_range(data),
                };
                if lo > hi || !lo.is_finite() || !hi.is_finite() {
                    return Err(ImpactLabError::InvalidBins(format!(
                        "invalid value range ({lo}, {hi})"
                    )));
                }
                if lo == hi {
                    lo -= 0.5;
                    hi += 0.5;
                }
                #[allow(clippy::cast_precision_loss)]
                let step = (hi - lo) / *count as f64;
                #[allow(clippy::cast_precision_loss)]
                let mut edges: Vec<f64> = (0..*count).map(|i| lo + step * i as f64).collect();
                edges.push(hi);
                Ok(edges)
            }
            Self::Edges(edges) => {
                if edges.len() < 2 {
                    return Err(ImpactLabError::InvalidBins(
                        "at least two bin edges are required".to_string(),
                    ));
                }
                if edges.windows(2).any(|w| !(w[0] < w[1])) {
                    return Err(ImpactLabError::InvalidBins(
                        "bin edges must be strictly increasing".to_string(),
                    ));
                }
                Ok(edges.clone())
            }
        }
    }
}

fn finite_range(data: &ArrayD<f64>) -> (f64, f64) {
    let (lo, hi) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo > hi {
        (0.0, 0.0)
    } else {
        (lo, hi)
    }
}

/// Bin index of `x`: half-open `[lo, hi)` bins, the last one closed
///
/// NaN and values outside the edges belong to no bin.
fn bin_of(x: f64, edges: &[f64]) -> Option<usize> {
    let last = edges.len() - 1;
    if x.is_nan() || x < edges[0] || x > edges[last] {
        return None;
    }
    if x == edges[last] {
        return Some(last - 1);
    }
    Some(edges.partition_point(|&e| e <= x) - 1)
}

fn bin_labels(edges: &[f64]) -> Vec<Coordinate> {
    let last = edges.len() - 2;
    edges
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            let close = if i == last { ']' } else { ')' };
            Coordinate::Text(format!("[{}, {}{close}", w[0], w[1]))
        })
        .collect()
}

/// Bin the values of `data` along `dim` and summarize each bin
///
/// `dim` is replaced in place by [`BIN_DIM`], labeled with the bin intervals.
/// `value_range` only applies to a bin count; values outside it are ignored.
/// Empty bins give 0 for `Count` and `Sum`, NaN otherwise.
///
/// # Errors
///
/// Returns `DimensionNotFound` when `data` lacks `dim`, and
/// [`ImpactLabError::InvalidBins`] for a zero bin count, an inverted range or
/// edges that are not strictly increasing.
pub fn binned_statistic_1d(
    data: &LabeledArray,
    dim: &str,
    bins: &Bins,
    statistic: BinStatistic,
    value_range: Option<(f64, f64)>,
) -> Result<LabeledArray> {
    let axis = data.require_axis(dim)?;
    let edges = bins.edges(data.data(), value_range)?;
    let nbins = edges.len() - 1;
    debug!("Binning '{dim}' into {nbins} bins for {statistic:?}");

    let lanes: Vec<Vec<f64>> = data
        .data()
        .lanes(Axis(axis))
        .into_iter()
        .map(|lane| lane.to_vec())
        .collect();
    let summaries: Vec<Vec<f64>> = lanes
        .par_iter()
        .map(|lane| {
            let mut members = vec![Vec::new(); nbins];
            for &x in lane {
                if let Some(bin) = bin_of(x, &edges) {
                    members[bin].push(x);
                }
            }
            members
                .iter_mut()
                .map(|values| statistic.summarize(values))
                .collect()
        })
        .collect();

    let mut shape = data.shape().to_vec();
    shape[axis] = nbins;
    let mut output = ArrayD::<f64>::zeros(shape);
    for (mut out, summary) in output.lanes_mut(Axis(axis)).into_iter().zip(&summaries) {
        for (slot, &value) in out.iter_mut().zip(summary) {
            *slot = value;
        }
    }

    let mut dims = data.dims().to_vec();
    dims[axis] = BIN_DIM.to_string();
    let mut coords: Vec<Vec<Coordinate>> = (0..data.ndim())
        .map(|i| data.coords_of_axis(i).to_vec())
        .collect();
    coords[axis] = bin_labels(&edges);

    data.rebuild(output, dims, coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeled::labels;
    use ndarray::Array2;

    /// 4x4 array of 0..16 with letter labels
    fn grid() -> LabeledArray {
        LabeledArray::new(
            Array2::from_shape_vec((4, 4), (0..16).map(f64::from).collect())
                .unwrap()
                .into_dyn(),
            vec!["a".to_string(), "b".to_string()],
            vec![labels(["a", "b", "c", "d"]), labels(["w", "x", "y", "z"])],
        )
        .unwrap()
    }

    #[test]
    fn test_count_with_edges() {
        let bins = Bins::from(vec![0.0, 2.0, 5.0, 20.0]);
        let result = binned_statistic_1d(&grid(), "b", &bins, BinStatistic::Count, None).unwrap();

        assert_eq!(result.dims(), &["a".to_string(), BIN_DIM.to_string()]);
        assert_eq!(
            result.coords(BIN_DIM).unwrap(),
            labels(["[0, 2)", "[2, 5)", "[5, 20]"]).as_slice()
        );
        assert_eq!(result.coords("a"), grid().coords("a"));
        let expected = [[2.0, 2.0, 0.0], [0.0, 1.0, 3.0], [0.0, 0.0, 4.0], [0.0, 0.0, 4.0]];
        for (i, row) in expected.iter().enumerate() {
            for (j, &count) in row.iter().enumerate() {
                assert_eq!(result.data()[[i, j]], count);
            }
        }
    }

    #[test]
    fn test_sum_with_bin_count_over_data_range() {
        let result = binned_statistic_1d(&grid(), "a", &Bins::default(), BinStatistic::Sum, None).unwrap();

        assert_eq!(result.dims(), &[BIN_DIM.to_string(), "b".to_string()]);
        assert_eq!(result.shape(), &[10, 4]);
        assert_eq!(result.coords(BIN_DIM).unwrap()[0], Coordinate::from("[0, 1.5)"));
        // column w holds 0 4 8 12 over the range 0..15
        let column: Vec<f64> = (0..10).map(|i| result.data()[[i, 0]]).collect();
        assert_eq!(column, vec![0.0, 0.0, 4.0, 0.0, 0.0, 8.0, 0.0, 0.0, 12.0, 0.0]);
        // the maximum lands in the closed last bin
        assert_eq!(result.data()[[9, 3]], 15.0);
    }

    #[test]
    fn test_empty_bins_are_nan_for_summaries() {
        let bins = Bins::from(vec![0.0, 2.0, 5.0, 20.0]);
        let mean = binned_statistic_1d(&grid(), "b", &bins, BinStatistic::Mean, None).unwrap();
        assert_eq!(mean.data()[[0, 0]], 0.5);
        assert_eq!(mean.data()[[0, 1]], 2.5);
        assert!(mean.data()[[0, 2]].is_nan());

        let median = binned_statistic_1d(&grid(), "b", &bins, BinStatistic::Median, None).unwrap();
        assert_eq!(median.data()[[1, 2]], 6.0);

        let min = binned_statistic_1d(&grid(), "b", &bins, BinStatistic::Min, None).unwrap();
        let max = binned_statistic_1d(&grid(), "b", &bins, BinStatistic::Max, None).unwrap();
        assert_eq!(min.data()[[1, 2]], 5.0);
        assert_eq!(max.data()[[1, 2]], 7.0);
        assert!(max.data()[[3, 0]].is_nan());
    }

    #[test]
    fn test_value_range_ignores_outside_values() {
        let result =
            binned_statistic_1d(&grid(), "b", &Bins::Count(2), BinStatistic::Count, Some((1.0, 3.0)))
                .unwrap();
        assert_eq!(result.coords(BIN_DIM).unwrap(), labels(["[1, 2)", "[2, 3]"]).as_slice());
        assert_eq!(result.data()[[0, 0]], 1.0);
        assert_eq!(result.data()[[0, 1]], 2.0);
        assert_eq!(result.data()[[1, 0]], 0.0);
    }

    #[test]
    fn test_nan_values_fall_in_no_bin() {
        let data = LabeledArray::with_positional_coords(
            ndarray::arr1(&[1.0, f64::NAN, 3.0]).into_dyn(),
            vec!["model".to_string()],
        )
        .unwrap();
        let result = binned_statistic_1d(&data, "model", &Bins::Count(2), BinStatistic::Count, None).unwrap();
        assert_eq!(result.data().as_slice().unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn test_invalid_bins() {
        assert!(matches!(
            binned_statistic_1d(&grid(), "b", &Bins::Count(0), BinStatistic::Count, None),
            Err(ImpactLabError::InvalidBins(_))
        ));
        assert!(matches!(
            binned_statistic_1d(&grid(), "b", &Bins::from(vec![0.0, 5.0, 5.0]), BinStatistic::Count, None),
            Err(ImpactLabError::InvalidBins(_))
        ));
        assert!(matches!(
            binned_statistic_1d(&grid(), "b", &Bins::Count(3), BinStatistic::Count, Some((4.0, 1.0))),
            Err(ImpactLabError::InvalidBins(_))
        ));
        assert!(matches!(
            binned_statistic_1d(&grid(), "c", &Bins::default(), BinStatistic::Count, None),
            Err(ImpactLabError::DimensionNotFound { .. })
        ));
    }
}
