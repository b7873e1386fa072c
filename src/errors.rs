//! Centralized error handling for impactlab-tools
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! [`ImpactLabError`]. Failures propagate immediately; nothing is retried.

use thiserror::Error;

/// Main error type for impactlab-tools operations
#[derive(Error, Debug)]
pub enum ImpactLabError {
    /// Weight vector length does not match the sample axis length
    #[error("Shape error: {weights} weights supplied for a sample axis of length {values}")]
    ShapeError { values: usize, weights: usize },

    /// A data label has no corresponding entry in the label-indexed weights
    #[error("Alignment error: label '{label}' has no corresponding weight")]
    AlignmentError { label: String },

    /// Quantiles of an empty sample are undefined
    #[error("Cannot compute quantiles of an empty sample")]
    EmptySample,

    /// Requested axis does not exist on the array
    #[error("Axis {axis} is out of bounds for array with {ndim} dimensions")]
    AxisOutOfBounds { axis: usize, ndim: usize },

    /// Dimension not found in a labeled array
    #[error("Dimension '{dim}' not found in variable '{var}'")]
    DimensionNotFound { var: String, dim: String },

    /// Variable not found in a NetCDF file or dataset
    #[error("Variable '{var}' not found")]
    VariableNotFound { var: String },

    /// Scenario missing from a model weight table
    #[error("Scenario '{scenario}' not found in model weight table")]
    UnknownScenario { scenario: String },

    /// Coordinate labels that are missing from a region mapping
    #[error("Not all values in '{dim}' found in region mapping (first missing: {label})")]
    RegionNotFound { dim: String, label: String },

    /// Labeled array construction with inconsistent metadata
    #[error("Invalid labeled array: {0}")]
    InvalidLabels(String),

    /// Bin count, edges or value range that cannot define bins
    #[error("Invalid bins: {0}")]
    InvalidBins(String),

    /// Configuration lookup or parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Array shape errors raised by ndarray
    #[error("Array error: {0}")]
    Array(#[from] ndarray::ShapeError),

    /// CSV table parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML server configuration parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON value errors in configuration trees
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImpactLabError {
    /// Check that a weight vector matches the length of the sample it weights
    pub fn check_lengths(values: usize, weights: usize) -> Result<()> {
        if values != weights {
            return Err(ImpactLabError::ShapeError { values, weights });
        }
        Ok(())
    }
}

/// Result type alias for impactlab-tools operations
pub type Result<T> = std::result::Result<T, ImpactLabError>;
