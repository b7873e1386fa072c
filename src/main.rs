//! Entry point for the `impactlab` binary.
//! Parses arguments, loads a NetCDF variable and computes quantiles over one of its dimensions.

use clap::Parser;
use impactlab_tools::cli::Args;
use impactlab_tools::dist::{model_quantiles, ModelWeightTable};
use impactlab_tools::labeled::LabeledData;
use impactlab_tools::netcdf_io::{open, read_labeled_variable, QuantileWriter};
use impactlab_tools::parallel::{get_parallel_info, ParallelConfig};
use impactlab_tools::weighting::{percentile_labeled, QuantileOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    ParallelConfig::new(args.threads).setup_global_pool()?;
    get_parallel_info().log();

    let file = open(&args.file)?;
    info!("Successfully opened NetCDF file: {}", args.file.display());

    let (var, dim) = &args.quantiles;
    let data = LabeledData::from(read_labeled_variable(&file, var)?);
    let quantiles = args.quantile_values();

    let result = match (&args.weights, &args.scenario) {
        (Some(weights_path), Some(scenario)) => {
            let table = ModelWeightTable::from_csv_path(weights_path, &args.weight_column)?;
            let options = QuantileOptions::new().legacy_normalization(args.legacy);
            model_quantiles(&data, &table, scenario, &quantiles, dim, options)?
        }
        _ => percentile_labeled(&data, &quantiles, dim)?,
    };

    let Some(result) = result.as_array() else {
        return Err(format!("expected a single variable result for '{var}'").into());
    };

    if let Some(output_path) = &args.output_netcdf {
        let new_var_name = format!("{var}_quantiles");
        QuantileWriter::new(Some(&file), output_path).write_array(result, &new_var_name, Some(var))?;
        info!("Saved result to {}", output_path.display());
    } else {
        println!("Quantiles of '{var}' over '{dim}' at {quantiles:?}");
        println!("Dimensions: {:?}", result.dims());
        println!("{}", result.data());
    }

    Ok(())
}
