//! Remapping region indices between shape numbers and hierarchical ids
//!
//! Impact regions are identified either by the positional `SHAPENUM` of the
//! region shapefile or by a hierarchical id (`hierid`, e.g. `USA.14.608`).
//! Reindexing swaps the coordinate labels of a dimension and renames it; the
//! data values are never reordered.

use crate::errors::{ImpactLabError, Result};
use crate::labeled::{Coordinate, LabeledArray, LabeledData};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub const SHAPENUM_DIM: &str = "SHAPENUM";
pub const HIERID_DIM: &str = "hierid";

#[derive(Debug, Deserialize)]
struct RegionRecord {
    #[serde(rename = "SHAPENUM")]
    shapenum: f64,
    hierid: String,
}

/// Bidirectional mapping between shape numbers and hierarchical region ids
#[derive(Debug, Clone, Default)]
pub struct RegionMapping {
    hierid_by_shapenum: HashMap<Coordinate, String>,
    shapenum_by_hierid: HashMap<String, f64>,
}

impl RegionMapping {
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, S)>,
        S: Into<String>,
    {
        let mut mapping = Self::default();
        for (shapenum, hierid) in pairs {
            let hierid = hierid.into();
            mapping
                .hierid_by_shapenum
                .insert(Coordinate::Number(shapenum), hierid.clone());
            mapping.shapenum_by_hierid.insert(hierid, shapenum);
        }
        mapping
    }

    /// Parse a CSV mapping with `SHAPENUM` and `hierid` columns
    ///
    /// # Errors
    ///
    /// Returns a CSV error for malformed rows.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let records = reader
            .deserialize::<RegionRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Parsed {} region mapping records", records.len());
        Ok(Self::new(records.into_iter().map(|r| (r.shapenum, r.hierid))))
    }

    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened, otherwise as
    /// [`RegionMapping::from_csv_reader`].
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        info!("Loading region mapping from {}", path.display());
        Self::from_csv_reader(File::open(path)?)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hierid_by_shapenum.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hierid_by_shapenum.is_empty()
    }

    #[must_use]
    pub fn hierid(&self, shapenum: f64) -> Option<&str> {
        self.hierid_by_shapenum
            .get(&Coordinate::Number(shapenum))
            .map(String::as_str)
    }

    #[must_use]
    pub fn shapenum(&self, hierid: &str) -> Option<f64> {
        self.shapenum_by_hierid.get(hierid).copied()
    }
}

/// Relabel `dim` from shape numbers to hierarchical ids and rename it to `new_dim`
///
/// Text labels holding numbers (`"17"`) are accepted as shape numbers.
///
/// # Errors
///
/// Returns [`ImpactLabError::RegionNotFound`] if any label is not in the mapping.
pub fn shapenum_to_hierid(
    data: &LabeledData,
    mapping: &RegionMapping,
    dim: &str,
    new_dim: &str,
) -> Result<LabeledData> {
    data.map_over_dim(dim, |array| {
        relabel(array, dim, new_dim, |label| {
            label
                .as_f64()
                .and_then(|n| mapping.hierid(n))
                .map(Coordinate::from)
        })
    })
}

/// Relabel `dim` from hierarchical ids to shape numbers and rename it to `new_dim`
///
/// # Errors
///
/// Returns [`ImpactLabError::RegionNotFound`] if any label is not in the mapping.
pub fn hierid_to_shapenum(
    data: &LabeledData,
    mapping: &RegionMapping,
    dim: &str,
    new_dim: &str,
) -> Result<LabeledData> {
    data.map_over_dim(dim, |array| {
        relabel(array, dim, new_dim, |label| {
            let hierid = match label {
                Coordinate::Text(s) => s.clone(),
                Coordinate::Number(_) => label.to_string(),
            };
            mapping.shapenum(&hierid).map(Coordinate::Number)
        })
    })
}

fn relabel<F>(array: &LabeledArray, dim: &str, new_dim: &str, lookup: F) -> Result<LabeledArray>
where
    F: Fn(&Coordinate) -> Option<Coordinate>,
{
    let labels = array
        .coords(dim)
        .unwrap_or_default()
        .iter()
        .map(|label| {
            lookup(label).ok_or_else(|| ImpactLabError::RegionNotFound {
                dim: dim.to_string(),
                label: label.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    array.with_coords(dim, labels)?.rename_dim(dim, new_dim)
}
