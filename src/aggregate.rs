//! Population-weighted aggregation to coarser regions
//!
//! County-level (or impact-region-level) results are averaged up to an
//! aggregation level such as state or census region, weighting each member by
//! its population: `sum(x * pop) / sum(pop)` within every group.

use crate::errors::{ImpactLabError, Result};
use crate::labeled::{Coordinate, LabeledArray};
use crate::weighting::LabeledWeights;
use ndarray::{ArrayD, Axis};
use std::collections::HashMap;
use tracing::debug;

/// Assignment of fine-grained labels to the groups of an aggregation level
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    level: String,
    assignments: HashMap<Coordinate, Coordinate>,
}

impl GroupBy {
    /// Empty grouping for an aggregation level such as `"state"`
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            assignments: HashMap::new(),
        }
    }

    /// Grouping built from `(member, group)` pairs
    pub fn from_pairs<I, M, G>(level: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (M, G)>,
        M: Into<Coordinate>,
        G: Into<Coordinate>,
    {
        let mut grouping = Self::new(level);
        for (member, group) in pairs {
            grouping = grouping.assign(member, group);
        }
        grouping
    }

    #[must_use]
    pub fn assign(mut self, member: impl Into<Coordinate>, group: impl Into<Coordinate>) -> Self {
        self.assignments.insert(member.into(), group.into());
        self
    }

    #[must_use]
    pub fn level(&self) -> &str {
        &self.level
    }

    #[must_use]
    pub fn group_of(&self, member: &Coordinate) -> Option<&Coordinate> {
        self.assignments.get(member)
    }
}

/// Population-weighted mean of `data` along `dim`, grouped by `groups`
///
/// The output replaces `dim` with a dimension named after the aggregation
/// level whose labels are the groups in order of first appearance along
/// `dim`. NaN data values are skipped in the numerator, so a missing value
/// pulls its group mean towards zero rather than poisoning it.
///
/// # Errors
///
/// Returns `DimensionNotFound` when `data` lacks `dim`, and
/// [`ImpactLabError::AlignmentError`] when a label along `dim` has no
/// population or no group.
pub fn population_weighted_mean(
    data: &LabeledArray,
    population: &LabeledWeights,
    dim: &str,
    groups: &GroupBy,
) -> Result<LabeledArray> {
    let axis = data.require_axis(dim)?;
    let members = data.coords_of_axis(axis);
    let pop = population.select(members)?;

    let mut group_labels: Vec<Coordinate> = Vec::new();
    let mut group_index = Vec::with_capacity(members.len());
    for member in members {
        let group = groups
            .group_of(member)
            .ok_or_else(|| ImpactLabError::AlignmentError {
                label: member.to_string(),
            })?;
        let idx = match group_labels.iter().position(|g| g == group) {
            Some(idx) => idx,
            None => {
                group_labels.push(group.clone());
                group_labels.len() - 1
            }
        };
        group_index.push(idx);
    }

    debug!(
        "Aggregating {} '{dim}' members into {} '{}' groups",
        members.len(),
        group_labels.len(),
        groups.level()
    );

    let mut denominators = vec![0.0; group_labels.len()];
    for (&g, &p) in group_index.iter().zip(&pop) {
        denominators[g] += p;
    }

    let mut shape = data.shape().to_vec();
    shape[axis] = group_labels.len();
    let mut output = ArrayD::<f64>::zeros(shape);

    for (lane, mut out) in data
        .data()
        .lanes(Axis(axis))
        .into_iter()
        .zip(output.lanes_mut(Axis(axis)))
    {
        for ((&x, &g), &p) in lane.iter().zip(&group_index).zip(&pop) {
            let product = x * p;
            if !product.is_nan() {
                out[g] += product;
            }
        }
        for (value, &denominator) in out.iter_mut().zip(&denominators) {
            *value /= denominator;
        }
    }

    let mut dims = data.dims().to_vec();
    dims[axis] = groups.level().to_string();
    let mut coords: Vec<Vec<Coordinate>> = (0..data.ndim())
        .map(|i| data.coords_of_axis(i).to_vec())
        .collect();
    coords[axis] = group_labels;

    data.rebuild(output, dims, coords)
}
