//! Defines command-line interface options using `clap` for the `impactlab` binary.

use crate::dist::{DEFAULT_QUANTILES, DEFAULT_WEIGHT_COLUMN};
use clap::Parser;
use std::path::PathBuf;

/// Weighted quantiles of NetCDF variables across climate models
#[derive(Parser, Debug)]
#[command(
    name = "impactlab",
    version,
    about = "Weighted quantiles of labeled NetCDF variables"
)]
pub struct Args {
    /// Path to the NetCDF file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Variable and the dimension to compute quantiles over, formatted as <var>:<dim>
    #[arg(long, value_parser = parse_var_dim)]
    pub quantiles: (String, String),

    /// CSV table of model weights with `model` and `rcp` columns
    #[arg(long, requires = "scenario")]
    pub weights: Option<PathBuf>,

    /// Scenario whose model weights are used, e.g. rcp85
    #[arg(long, requires = "weights")]
    pub scenario: Option<String>,

    /// Name of the weight column in the weight table
    #[arg(long, default_value = DEFAULT_WEIGHT_COLUMN)]
    pub weight_column: String,

    /// Comma-separated quantiles on the 0-1 scale
    #[arg(long, value_parser = parse_quantile_list)]
    pub q: Option<QuantileList>,

    /// Min-max rescale weighted positions onto [0, 1]
    #[arg(long, default_value_t = false)]
    pub legacy: bool,

    /// Path to save result as NetCDF. If not set, prints to terminal.
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}

impl Args {
    /// Requested quantiles, or the default likely range and median
    #[must_use]
    pub fn quantile_values(&self) -> Vec<f64> {
        self.q
            .as_ref()
            .map_or_else(|| DEFAULT_QUANTILES.to_vec(), |list| list.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantileList(pub Vec<f64>);

fn parse_var_dim(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [var, dim] if !var.is_empty() && !dim.is_empty() => Ok((var.to_string(), dim.to_string())),
        _ => Err("Invalid format: Expected '<variable>:<dimension>'.".to_string()),
    }
}

fn parse_quantile_list(s: &str) -> Result<QuantileList, String> {
    let values = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid quantile '{}'", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.is_empty() {
        return Err("Expected at least one quantile".to_string());
    }
    Ok(QuantileList(values))
}
