//! NetCDF reading and writing of labeled arrays
//!
//! Variables are read as `f64` with `_FillValue` entries replaced by NaN.
//! Labels come from coordinate variables (a 1-D variable named after its
//! dimension), which may hold numbers or strings. Dimensions without a
//! coordinate variable get positional labels.

use crate::errors::{ImpactLabError, Result};
use crate::labeled::{Coordinate, Dataset, LabeledArray, LabeledData};
use chrono::Utc;
use ndarray::{ArrayD, IxDyn};
use netcdf::{create, AttributeValue, File, FileMut, Variable, VariableMut};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

const FILL_VALUE_ATTR: &str = "_FillValue";

/// Open a NetCDF file for reading
///
/// # Errors
///
/// Returns a NetCDF error if the file cannot be opened.
pub fn open(path: &Path) -> Result<File> {
    debug!("Opening NetCDF file {}", path.display());
    Ok(netcdf::open(path)?)
}

/// Read one variable together with the labels of its dimensions
///
/// # Errors
///
/// Returns [`ImpactLabError::VariableNotFound`] if the variable is missing,
/// otherwise NetCDF or shape errors.
pub fn read_labeled_variable(file: &File, var_name: &str) -> Result<LabeledArray> {
    let var = file
        .variable(var_name)
        .ok_or_else(|| ImpactLabError::VariableNotFound {
            var: var_name.to_string(),
        })?;

    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

    let mut values = var.get_values::<f64, _>(..)?;
    if let Some(fill) = fill_value(&var) {
        for v in values.iter_mut().filter(|v| **v == fill) {
            *v = f64::NAN;
        }
    }
    let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;

    let coords = dims
        .iter()
        .zip(&shape)
        .map(|(dim, &len)| read_coordinates(file, dim, len))
        .collect::<Result<Vec<_>>>()?;

    debug!("Read variable '{var_name}' with dimensions {dims:?} and shape {shape:?}");
    Ok(LabeledArray::new(data, dims, coords)?.with_name(var_name))
}

/// Read several variables into a [`Dataset`]
///
/// # Errors
///
/// Same as [`read_labeled_variable`].
pub fn read_dataset(file: &File, var_names: &[&str]) -> Result<Dataset> {
    var_names
        .iter()
        .map(|&name| Ok((name.to_string(), read_labeled_variable(file, name)?)))
        .collect()
}

fn fill_value(var: &Variable) -> Option<f64> {
    var.attribute(FILL_VALUE_ATTR)
        .and_then(|attr| match attr.value().ok()? {
            AttributeValue::Double(v) => Some(v),
            AttributeValue::Float(v) => Some(f64::from(v)),
            AttributeValue::Int(v) => Some(f64::from(v)),
            AttributeValue::Short(v) => Some(f64::from(v)),
            _ => None,
        })
}

fn read_coordinates(file: &File, dim: &str, len: usize) -> Result<Vec<Coordinate>> {
    let Some(coord_var) = file.variable(dim) else {
        return Ok((0..len).map(Coordinate::from).collect());
    };
    if coord_var.dimensions().len() != 1 || coord_var.dimensions()[0].len() != len {
        warn!("Ignoring coordinate variable '{dim}' that does not match its dimension");
        return Ok((0..len).map(Coordinate::from).collect());
    }

    if let Ok(values) = coord_var.get_values::<f64, _>(..) {
        return Ok(values.into_iter().map(Coordinate::Number).collect());
    }

    (0..len)
        .map(|i| Ok(Coordinate::Text(coord_var.get_string([i])?)))
        .collect()
}

/// Writer for computed results, copying metadata from the source file
pub struct QuantileWriter<'a> {
    input_file: Option<&'a File>,
    output_path: &'a Path,
}

impl<'a> QuantileWriter<'a> {
    pub fn new(input_file: Option<&'a File>, output_path: &'a Path) -> Self {
        Self {
            input_file,
            output_path,
        }
    }

    /// Write one array, replacing any existing file at the output path
    ///
    /// Attributes of `source_var` in the input file are copied onto the new
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns NetCDF or I/O errors, or [`ImpactLabError::VariableNotFound`]
    /// if `source_var` is not in the input file.
    pub fn write_array(
        &self,
        array: &LabeledArray,
        var_name: &str,
        source_var: Option<&str>,
    ) -> Result<()> {
        let mut file = self.create_output()?;
        self.write_variable(&mut file, array, var_name, source_var)?;
        Self::finish(&mut file)
    }

    /// Write every variable of `data`
    ///
    /// Dataset variables keep their names and copy attributes from the input
    /// variable of the same name when there is one.
    ///
    /// # Errors
    ///
    /// Same as [`QuantileWriter::write_array`].
    pub fn write_data(&self, data: &LabeledData, default_name: &str) -> Result<()> {
        let mut file = self.create_output()?;
        match data {
            LabeledData::Array(array) => {
                let name = array.name().unwrap_or(default_name);
                let source = self.source_for(name);
                self.write_variable(&mut file, array, name, source)?;
            }
            LabeledData::Dataset(dataset) => {
                for (name, array) in dataset.iter() {
                    let source = self.source_for(name);
                    self.write_variable(&mut file, array, name, source)?;
                }
            }
        }
        Self::finish(&mut file)
    }

    fn source_for<'n>(&self, name: &'n str) -> Option<&'n str> {
        self.input_file
            .filter(|f| f.variable(name).is_some())
            .map(|_| name)
    }

    fn create_output(&self) -> Result<FileMut> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }
        info!("Writing NetCDF output to {}", self.output_path.display());
        Ok(create(self.output_path)?)
    }

    fn finish(file: &mut FileMut) -> Result<()> {
        file.add_attribute(
            "history",
            format!("Created by impactlab-tools on {}", Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    fn write_variable(
        &self,
        file: &mut FileMut,
        array: &LabeledArray,
        var_name: &str,
        source_var: Option<&str>,
    ) -> Result<()> {
        for (axis, (dim, &len)) in array.dims().iter().zip(array.shape()).enumerate() {
            if file.dimension(dim).is_none() {
                file.add_dimension(dim, len)?;
                write_coordinates(file, dim, array.coords_of_axis(axis))?;
            }
        }

        let dim_refs: Vec<&str> = array.dims().iter().map(String::as_str).collect();
        let mut new_var = file.add_variable::<f64>(var_name, &dim_refs)?;
        new_var.put(array.data().view(), ..)?;

        if let Some(source) = source_var {
            let input_file = self
                .input_file
                .ok_or_else(|| ImpactLabError::VariableNotFound {
                    var: source.to_string(),
                })?;
            let orig_var =
                input_file
                    .variable(source)
                    .ok_or_else(|| ImpactLabError::VariableNotFound {
                        var: source.to_string(),
                    })?;
            copy_attributes(&orig_var, &mut new_var)?;
        }

        Ok(())
    }
}

/// Numeric coordinate variable only when every label is a number
///
/// Text labels such as zero-padded FIPS codes stay strings even when they parse.
fn write_coordinates(file: &mut FileMut, dim: &str, labels: &[Coordinate]) -> Result<()> {
    let numbers: Option<Vec<f64>> = labels
        .iter()
        .map(|label| match label {
            Coordinate::Number(v) => Some(*v),
            Coordinate::Text(_) => None,
        })
        .collect();
    match numbers {
        Some(values) => {
            let mut var = file.add_variable::<f64>(dim, &[dim])?;
            var.put_values(&values, ..)?;
        }
        None => {
            let mut var = file.add_string_variable(dim, &[dim])?;
            for (i, label) in labels.iter().enumerate() {
                var.put_string(&label.to_string(), [i])?;
            }
        }
    }
    Ok(())
}

/// Copy attributes, excluding `_FillValue` since values are written as `f64`
fn copy_attributes(orig_var: &Variable, new_var: &mut VariableMut) -> Result<()> {
    for attr in orig_var.attributes().filter(|a| a.name() != FILL_VALUE_ATTR) {
        match attr.value()? {
            AttributeValue::Str(val) => {
                new_var.put_attribute(attr.name(), val)?;
            }
            AttributeValue::Strs(vals) => {
                new_var.put_attribute(attr.name(), vals)?;
            }
            AttributeValue::Float(val) => {
                new_var.put_attribute(attr.name(), val)?;
            }
            AttributeValue::Floats(vals) => {
                new_var.put_attribute(attr.name(), vals)?;
            }
            AttributeValue::Double(val) => {
                new_var.put_attribute(attr.name(), val)?;
            }
            AttributeValue::Doubles(vals) => {
                new_var.put_attribute(attr.name(), vals)?;
            }
            AttributeValue::Int(val) => {
                new_var.put_attribute(attr.name(), val)?;
            }
            AttributeValue::Ints(vals) => {
                new_var.put_attribute(attr.name(), vals)?;
            }
            AttributeValue::Short(val) => {
                new_var.put_attribute(attr.name(), val)?;
            }
            AttributeValue::Shorts(vals) => {
                new_var.put_attribute(attr.name(), vals)?;
            }
            _ => {
                warn!("Skipped unsupported attribute type for '{}'", attr.name());
            }
        }
    }
    Ok(())
}
