//! Labeled N-dimensional arrays
//!
//! A [`LabeledArray`] pairs an `ndarray::ArrayD<f64>` with a name for every
//! axis and an ordered sequence of coordinate labels along each axis, the way
//! NetCDF variables carry their dimensions and coordinate variables. A
//! [`Dataset`] is a named collection of such arrays, and [`LabeledData`] lets
//! operations accept either form.

use crate::errors::{ImpactLabError, Result};
use ndarray::{ArrayD, Axis};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Coordinate label along one axis of a labeled array
#[derive(Debug, Clone)]
pub enum Coordinate {
    /// Textual label such as a climate model or region id
    Text(String),
    /// Numeric label such as a quantile, year or shape number
    Number(f64),
}

impl Coordinate {
    /// Label used for case-insensitive matching; numbers are returned as-is
    #[must_use]
    pub fn normalized(&self) -> Self {
        match self {
            Self::Text(s) => Self::Text(s.to_lowercase()),
            Self::Number(v) => Self::Number(*v),
        }
    }

    /// Numeric value of the label, parsing text labels when possible
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    fn number_bits(v: f64) -> u64 {
        // -0.0 and 0.0 label the same coordinate
        if v == 0.0 {
            0
        } else {
            v.to_bits()
        }
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => Self::number_bits(*a) == Self::number_bits(*b),
            _ => false,
        }
    }
}

impl Eq for Coordinate {}

impl Hash for Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Text(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            Self::Number(v) => {
                1u8.hash(state);
                Self::number_bits(*v).hash(state);
            }
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Coordinate {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Coordinate {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Coordinate {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<usize> for Coordinate {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

/// Build a label sequence from anything convertible to [`Coordinate`]
pub fn labels<I, L>(items: I) -> Vec<Coordinate>
where
    I: IntoIterator<Item = L>,
    L: Into<Coordinate>,
{
    items.into_iter().map(Into::into).collect()
}

/// Numeric array with named axes and per-axis coordinate labels
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray {
    name: Option<String>,
    data: ArrayD<f64>,
    dims: Vec<String>,
    coords: Vec<Vec<Coordinate>>,
}

impl LabeledArray {
    /// Create a labeled array, checking that dims and coords agree with the data shape
    ///
    /// # Errors
    ///
    /// Returns [`ImpactLabError::InvalidLabels`] if the number of dimension
    /// names or label sequences does not match the array, if a label sequence
    /// has the wrong length, or if a dimension name is repeated.
    pub fn new(data: ArrayD<f64>, dims: Vec<String>, coords: Vec<Vec<Coordinate>>) -> Result<Self> {
        if dims.len() != data.ndim() || coords.len() != data.ndim() {
            return Err(ImpactLabError::InvalidLabels(format!(
                "array has {} dimensions but {} names and {} label sequences were given",
                data.ndim(),
                dims.len(),
                coords.len()
            )));
        }

        for (axis, (dim, labels)) in dims.iter().zip(&coords).enumerate() {
            if labels.len() != data.len_of(Axis(axis)) {
                return Err(ImpactLabError::InvalidLabels(format!(
                    "dimension '{dim}' has length {} but {} labels",
                    data.len_of(Axis(axis)),
                    labels.len()
                )));
            }
            if dims[..axis].contains(dim) {
                return Err(ImpactLabError::InvalidLabels(format!(
                    "dimension '{dim}' appears more than once"
                )));
            }
        }

        Ok(Self {
            name: None,
            data,
            dims,
            coords,
        })
    }

    /// Create a labeled array whose labels are the positional indices `0..len`
    ///
    /// # Errors
    ///
    /// Returns an error if the number of dimension names does not match the data.
    pub fn with_positional_coords(data: ArrayD<f64>, dims: Vec<String>) -> Result<Self> {
        let coords = data.shape().iter().map(|&len| labels(0..len)).collect();
        Self::new(data, dims, coords)
    }

    /// Attach a variable name, used in error messages and when writing results
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    #[must_use]
    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Axis index of a named dimension
    #[must_use]
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    /// Axis index of a named dimension, failing when it is absent
    ///
    /// # Errors
    ///
    /// Returns [`ImpactLabError::DimensionNotFound`] if `dim` is not one of the array's dimensions.
    pub fn require_axis(&self, dim: &str) -> Result<usize> {
        self.axis_of(dim)
            .ok_or_else(|| ImpactLabError::DimensionNotFound {
                var: self.name.clone().unwrap_or_else(|| "<unnamed>".to_string()),
                dim: dim.to_string(),
            })
    }

    /// Coordinate labels of a named dimension
    #[must_use]
    pub fn coords(&self, dim: &str) -> Option<&[Coordinate]> {
        self.axis_of(dim).map(|axis| self.coords[axis].as_slice())
    }

    /// Coordinate labels of an axis by position
    #[must_use]
    pub fn coords_of_axis(&self, axis: usize) -> &[Coordinate] {
        &self.coords[axis]
    }

    /// Return a copy with `old` renamed to `new`
    ///
    /// # Errors
    ///
    /// Returns an error if `old` is missing or `new` already names another dimension.
    pub fn rename_dim(&self, old: &str, new: &str) -> Result<Self> {
        let axis = self.require_axis(old)?;
        let mut dims = self.dims.clone();
        dims[axis] = new.to_string();
        self.rebuild(self.data.clone(), dims, self.coords.clone())
    }

    /// Return a copy with the labels along `dim` replaced
    ///
    /// # Errors
    ///
    /// Returns an error if `dim` is missing or the label count does not match its length.
    pub fn with_coords(&self, dim: &str, labels: Vec<Coordinate>) -> Result<Self> {
        let axis = self.require_axis(dim)?;
        let mut coords = self.coords.clone();
        coords[axis] = labels;
        self.rebuild(self.data.clone(), self.dims.clone(), coords)
    }

    /// Sub-array at position `index` along `dim`, with `dim` dropped
    ///
    /// # Errors
    ///
    /// Returns an error if `dim` is missing or `index` is out of range.
    pub fn isel(&self, dim: &str, index: usize) -> Result<Self> {
        let axis = self.require_axis(dim)?;
        let len = self.data.len_of(Axis(axis));
        if index >= len {
            return Err(ImpactLabError::InvalidLabels(format!(
                "index {index} out of range for dimension '{dim}' of length {len}"
            )));
        }

        let data = self.data.index_axis(Axis(axis), index).to_owned();
        let mut dims = self.dims.clone();
        dims.remove(axis);
        let mut coords = self.coords.clone();
        coords.remove(axis);
        self.rebuild(data, dims, coords)
    }

    /// Sub-array at coordinate `label` along `dim`, with `dim` dropped
    ///
    /// # Errors
    ///
    /// Returns [`ImpactLabError::AlignmentError`] if no coordinate along `dim` equals `label`.
    pub fn sel(&self, dim: &str, label: &Coordinate) -> Result<Self> {
        let axis = self.require_axis(dim)?;
        let index = self.coords[axis]
            .iter()
            .position(|c| c == label)
            .ok_or_else(|| ImpactLabError::AlignmentError {
                label: label.to_string(),
            })?;
        self.isel(dim, index)
    }

    /// Build an array of the same name from new parts
    pub(crate) fn rebuild(
        &self,
        data: ArrayD<f64>,
        dims: Vec<String>,
        coords: Vec<Vec<Coordinate>>,
    ) -> Result<Self> {
        let array = Self::new(data, dims, coords)?;
        Ok(match &self.name {
            Some(name) => array.with_name(name.clone()),
            None => array,
        })
    }
}

/// Named collection of labeled arrays, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    variables: Vec<(String, LabeledArray)>,
}

impl Dataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable; the array takes the variable's name
    ///
    /// Replacing an existing variable keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, array: LabeledArray) {
        let name = name.into();
        let array = array.with_name(name.clone());
        match self.variables.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = array,
            None => self.variables.push((name, array)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LabeledArray> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, array)| array)
    }

    /// Variable by name, failing when it is absent
    ///
    /// # Errors
    ///
    /// Returns [`ImpactLabError::VariableNotFound`] if the dataset has no such variable.
    pub fn variable(&self, name: &str) -> Result<&LabeledArray> {
        self.get(name).ok_or_else(|| ImpactLabError::VariableNotFound {
            var: name.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabeledArray)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl FromIterator<(String, LabeledArray)> for Dataset {
    fn from_iter<I: IntoIterator<Item = (String, LabeledArray)>>(iter: I) -> Self {
        let mut dataset = Self::new();
        for (name, array) in iter {
            dataset.insert(name, array);
        }
        dataset
    }
}

/// Either a single labeled array or a dataset of them
#[derive(Debug, Clone, PartialEq)]
pub enum LabeledData {
    Array(LabeledArray),
    Dataset(Dataset),
}

impl LabeledData {
    /// Apply `op` to every array carrying `dim`
    ///
    /// A single array without `dim` is an error; dataset variables without
    /// `dim` are passed through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ImpactLabError::DimensionNotFound`] for a plain array lacking
    /// `dim`, or the first error produced by `op`.
    pub fn map_over_dim<F>(&self, dim: &str, mut op: F) -> Result<Self>
    where
        F: FnMut(&LabeledArray) -> Result<LabeledArray>,
    {
        match self {
            Self::Array(array) => {
                array.require_axis(dim)?;
                Ok(Self::Array(op(array)?))
            }
            Self::Dataset(dataset) => {
                let mut out = Dataset::new();
                for (name, array) in dataset.iter() {
                    if array.axis_of(dim).is_some() {
                        out.insert(name, op(array)?);
                    } else {
                        out.insert(name, array.clone());
                    }
                }
                Ok(Self::Dataset(out))
            }
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&LabeledArray> {
        match self {
            Self::Array(array) => Some(array),
            Self::Dataset(_) => None,
        }
    }

    #[must_use]
    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Self::Array(_) => None,
            Self::Dataset(dataset) => Some(dataset),
        }
    }
}

impl From<LabeledArray> for LabeledData {
    fn from(value: LabeledArray) -> Self {
        Self::Array(value)
    }
}

impl From<Dataset> for LabeledData {
    fn from(value: Dataset) -> Self {
        Self::Dataset(value)
    }
}
