//! Quantiles of climate-model ensembles using model weight tables
//!
//! Model weight tables list one weight per climate model and emissions
//! scenario (`rcp26`, `rcp45`, `rcp85`, ...). Data indexed by model along a
//! named dimension is matched to the table case-insensitively, so a file that
//! spells a model `CCSM4` uses the table's `ccsm4` weight.

use crate::cache::DataCache;
use crate::errors::{ImpactLabError, Result};
use crate::labeled::{Coordinate, LabeledData};
use crate::weighting::{
    normalize_and_realign, weighted_quantile_array, LabeledWeights, QuantileOptions, SampleWeights,
};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Quantiles reported by default: the likely range and median
pub const DEFAULT_QUANTILES: [f64; 5] = [0.05, 0.17, 0.5, 0.83, 0.95];

/// Default name of the model dimension
pub const DEFAULT_MODEL_DIM: &str = "model";

/// Default name of the weight column in weight tables
pub const DEFAULT_WEIGHT_COLUMN: &str = "weight";

/// One row of a model weight table
#[derive(Debug, Clone, PartialEq)]
pub struct ModelWeight {
    pub model: String,
    pub scenario: String,
    pub weight: f64,
}

/// Climate-model weights for every scenario
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelWeightTable {
    rows: Vec<ModelWeight>,
}

impl ModelWeightTable {
    #[must_use]
    pub fn new(rows: Vec<ModelWeight>) -> Self {
        Self { rows }
    }

    /// Parse a CSV table with `model` and `rcp` columns and a weight column
    ///
    /// # Errors
    ///
    /// Returns a CSV error for malformed input and a configuration error if a
    /// required column is missing or a weight is not a number.
    pub fn from_csv_reader<R: Read>(reader: R, weight_column: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ImpactLabError::Config(format!("weight table has no '{name}' column")))
        };
        let model_idx = column("model")?;
        let scenario_idx = column("rcp")?;
        let weight_idx = column(weight_column)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or_default().trim();
            let weight = field(weight_idx).parse::<f64>().map_err(|e| {
                ImpactLabError::Config(format!(
                    "invalid weight '{}' for model '{}': {e}",
                    field(weight_idx),
                    field(model_idx)
                ))
            })?;
            rows.push(ModelWeight {
                model: field(model_idx).to_string(),
                scenario: field(scenario_idx).to_string(),
                weight,
            });
        }

        debug!("Parsed {} model weights", rows.len());
        Ok(Self { rows })
    }

    /// Read a CSV weight table from disk
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened, otherwise as
    /// [`ModelWeightTable::from_csv_reader`].
    pub fn from_csv_path(path: &Path, weight_column: &str) -> Result<Self> {
        let file = File::open(path)?;
        info!("Loading model weights from {}", path.display());
        Self::from_csv_reader(file, weight_column)
    }

    #[must_use]
    pub fn rows(&self) -> &[ModelWeight] {
        &self.rows
    }

    /// Scenarios in order of first appearance
    #[must_use]
    pub fn scenarios(&self) -> Vec<&str> {
        let mut scenarios: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !scenarios.contains(&row.scenario.as_str()) {
                scenarios.push(&row.scenario);
            }
        }
        scenarios
    }

    /// Model weights of one scenario, labeled by model name
    ///
    /// # Errors
    ///
    /// Returns [`ImpactLabError::UnknownScenario`] if no row has this scenario.
    pub fn weights_for(&self, scenario: &str) -> Result<LabeledWeights> {
        let weights = LabeledWeights::from_pairs(
            self.rows
                .iter()
                .filter(|row| row.scenario == scenario)
                .map(|row| (row.model.as_str(), row.weight)),
        );

        if weights.is_empty() {
            return Err(ImpactLabError::UnknownScenario {
                scenario: scenario.to_string(),
            });
        }
        Ok(weights)
    }
}

/// Load a weight table through `cache`, parsing it only on first use
///
/// # Errors
///
/// Propagates the loader's error.
pub fn cached_weight_table<F>(
    cache: &DataCache<String, ModelWeightTable>,
    key: &str,
    loader: F,
) -> Result<Arc<ModelWeightTable>>
where
    F: FnOnce() -> Result<ModelWeightTable>,
{
    cache.get_or_compute(key.to_string(), |_| loader())
}

/// Weighted quantiles across climate models for one scenario
///
/// Weights for `scenario` are realigned to the model labels of each array
/// (case-insensitively) before computing quantiles along `dim`. Dataset
/// variables without `dim` are returned unchanged.
///
/// # Errors
///
/// Returns [`ImpactLabError::UnknownScenario`] for a scenario missing from
/// the table, [`ImpactLabError::AlignmentError`] for models without a weight
/// and any error of the labeled quantile computation.
pub fn model_quantiles(
    data: &LabeledData,
    table: &ModelWeightTable,
    scenario: &str,
    quantiles: &[f64],
    dim: &str,
    options: QuantileOptions,
) -> Result<LabeledData> {
    let weights = table.weights_for(scenario)?;

    data.map_over_dim(dim, |array| {
        let models: Vec<Coordinate> = array.coords(dim).unwrap_or_default().to_vec();
        let aligned = normalize_and_realign(&weights, &models)?;
        weighted_quantile_array(array, quantiles, &SampleWeights::Labeled(aligned), dim, options)
    })
}
