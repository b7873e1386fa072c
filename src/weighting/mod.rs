//! Weighted quantile estimation
//!
//! This module provides weighted quantiles of one-dimensional samples, their
//! broadcast along one axis of an N-dimensional array, and the labeled form
//! that aligns weights to a named dimension by coordinate label.
//!
//! # Organization
//!
//! - [`quantile`]: the numeric core over slices and `ndarray` axes
//! - [`alignment`]: label-indexed weights and case-insensitive realignment
//! - [`labeled`]: quantiles over named dimensions of labeled arrays and datasets

pub mod alignment;
pub mod labeled;
pub mod quantile;

pub use alignment::{normalize_and_realign, LabeledWeights, SampleWeights};
pub use labeled::{
    percentile_labeled, weighted_quantile_array, weighted_quantile_labeled,
    weighted_quantile_labeled_with, QUANTILE_DIM,
};
pub use quantile::{percentile_1d, weighted_quantile, weighted_quantile_1d, QuantileOptions};
