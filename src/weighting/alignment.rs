//! Aligning sample weights to the labels of a weighting axis

use crate::errors::{ImpactLabError, Result};
use crate::labeled::Coordinate;
use std::collections::HashMap;

/// Weights indexed by coordinate label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledWeights {
    labels: Vec<Coordinate>,
    values: Vec<f64>,
}

impl LabeledWeights {
    /// # Errors
    ///
    /// Returns [`ImpactLabError::ShapeError`] if `labels` and `values` differ in length.
    pub fn new(labels: Vec<Coordinate>, values: Vec<f64>) -> Result<Self> {
        ImpactLabError::check_lengths(labels.len(), values.len())?;
        Ok(Self { labels, values })
    }

    pub fn from_pairs<I, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, f64)>,
        L: Into<Coordinate>,
    {
        let (labels, values): (Vec<Coordinate>, Vec<f64>) =
            pairs.into_iter().map(|(l, w)| (l.into(), w)).unzip();
        Self { labels, values }
    }

    #[must_use]
    pub fn labels(&self) -> &[Coordinate] {
        &self.labels
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Weight for a single label (first match)
    #[must_use]
    pub fn get(&self, label: &Coordinate) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.values[i])
    }

    /// Weights reordered to follow `targets`
    ///
    /// # Errors
    ///
    /// Returns [`ImpactLabError::AlignmentError`] naming the first target label
    /// without a weight.
    pub fn select(&self, targets: &[Coordinate]) -> Result<Vec<f64>> {
        let index = first_index(self.labels.iter().cloned());
        targets
            .iter()
            .map(|target| {
                index
                    .get(target)
                    .map(|&i| self.values[i])
                    .ok_or_else(|| ImpactLabError::AlignmentError {
                        label: target.to_string(),
                    })
            })
            .collect()
    }
}

/// Sample weights matched to the data by position or by label
#[derive(Debug, Clone, PartialEq)]
pub enum SampleWeights {
    Positional(Vec<f64>),
    Labeled(LabeledWeights),
}

impl SampleWeights {
    /// Weight vector in the order of `targets`
    ///
    /// # Errors
    ///
    /// Positional weights of the wrong length fail with
    /// [`ImpactLabError::ShapeError`]; labeled weights missing a target fail
    /// with [`ImpactLabError::AlignmentError`].
    pub fn resolve(&self, targets: &[Coordinate]) -> Result<Vec<f64>> {
        match self {
            Self::Positional(values) => {
                ImpactLabError::check_lengths(targets.len(), values.len())?;
                Ok(values.clone())
            }
            Self::Labeled(weights) => weights.select(targets),
        }
    }
}

impl From<Vec<f64>> for SampleWeights {
    fn from(value: Vec<f64>) -> Self {
        Self::Positional(value)
    }
}

impl From<&[f64]> for SampleWeights {
    fn from(value: &[f64]) -> Self {
        Self::Positional(value.to_vec())
    }
}

impl From<LabeledWeights> for SampleWeights {
    fn from(value: LabeledWeights) -> Self {
        Self::Labeled(value)
    }
}

/// Realign weights to `target_labels`, matching text labels case-insensitively
///
/// Lower-casing is used only to find matches. The result is ordered like
/// `target_labels` and carries the target's original labels, so it can be
/// used directly with [`LabeledWeights::select`] against the data.
///
/// # Errors
///
/// Returns [`ImpactLabError::AlignmentError`] for the first target label
/// that has no case-insensitive match among the weights.
pub fn normalize_and_realign(
    weights: &LabeledWeights,
    target_labels: &[Coordinate],
) -> Result<LabeledWeights> {
    let index = first_index(weights.labels.iter().map(Coordinate::normalized));

    let values = target_labels
        .iter()
        .map(|target| {
            index
                .get(&target.normalized())
                .map(|&i| weights.values[i])
                .ok_or_else(|| ImpactLabError::AlignmentError {
                    label: target.to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LabeledWeights {
        labels: target_labels.to_vec(),
        values,
    })
}

fn first_index(labels: impl Iterator<Item = Coordinate>) -> HashMap<Coordinate, usize> {
    let mut index = HashMap::new();
    for (i, label) in labels.enumerate() {
        index.entry(label).or_insert(i);
    }
    index
}
