//! impactlab-tools: weighting and reshaping of labeled climate-impact data
//!
//! Utilities for turning per-model, per-region climate impact projections into
//! summary results. The core is a weighted quantile engine that reduces an
//! ensemble of climate models to the likely range and median, with weights
//! aligned to model names by label.
//!
//! ## Module Organization
//!
//! - [`weighting`]: weighted quantiles over slices, array axes and labeled dimensions
//! - [`labeled`]: labeled N-dimensional arrays and datasets
//! - [`dist`]: climate-model weight tables and model quantiles
//! - [`aggregate`]: population-weighted means over aggregation levels
//! - [`binning`]: per-bin statistics of values along a dimension
//! - [`reindex`]: shape number and hierarchical region id remapping
//! - [`cache`]: injectable memoization of loaded tables
//! - [`config`]: shared directory paths and run configuration
//! - [`paralog`]: claiming directories for jobs sharing a file system
//! - [`netcdf_io`]: NetCDF reading and writing of labeled arrays
//! - [`parallel`]: Rayon thread pool configuration
//! - [`errors`]: Centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use impactlab_tools::prelude::*;
//! use std::path::Path;
//!
//! let file = impactlab_tools::netcdf_io::open(Path::new("rebased.nc")).unwrap();
//! let data = LabeledData::from(read_labeled_variable(&file, "rebased").unwrap());
//!
//! let table = ModelWeightTable::from_csv_path(Path::new("weights.csv"), "weight").unwrap();
//! let result = model_quantiles(
//!     &data,
//!     &table,
//!     "rcp85",
//!     &DEFAULT_QUANTILES,
//!     "model",
//!     QuantileOptions::new(),
//! )
//! .unwrap();
//! ```

// Core modules
pub mod aggregate;
pub mod binning;
pub mod cache;
pub mod config;
pub mod dist;
pub mod errors;
pub mod labeled;
pub mod netcdf_io;
pub mod parallel;
pub mod paralog;
pub mod reindex;
pub mod weighting;

// Command-line definitions shared with the binary
pub mod cli;

pub use errors::{ImpactLabError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::aggregate::{population_weighted_mean, GroupBy};
    pub use crate::binning::{binned_statistic_1d, BinStatistic, Bins};
    pub use crate::cache::DataCache;
    pub use crate::dist::{model_quantiles, ModelWeightTable, DEFAULT_QUANTILES};
    pub use crate::errors::{ImpactLabError, Result};
    pub use crate::labeled::{Coordinate, Dataset, LabeledArray, LabeledData};
    pub use crate::netcdf_io::{read_labeled_variable, QuantileWriter};
    pub use crate::parallel::ParallelConfig;
    pub use crate::reindex::{hierid_to_shapenum, shapenum_to_hierid, RegionMapping};
    pub use crate::weighting::{
        normalize_and_realign, weighted_quantile, weighted_quantile_1d, weighted_quantile_labeled,
        LabeledWeights, QuantileOptions, SampleWeights,
    };
}
