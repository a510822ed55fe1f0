//! Cube
//!
//! A labelled forecast field: an optional leading realization dimension over a
//! regular `y`/`x` grid, plus time coordinates and free-form attributes.
//! Missing values are held as NaN and written as `null`.
use crate::constants::GRID_TOLERANCE;
use crate::errors::CalibrationError;
use crate::units;
use crate::utils::{mean, variance};
use is_close::is_close;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn parse_masked<'de, D>(d: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    Deserialize::deserialize(d).map(|x: Vec<Option<f32>>| x.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
}

/// Forecast or observation field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cube {
    /// Standard name of the diagnostic.
    pub name: String,
    /// Units of `data`.
    pub units: String,
    /// Realization coordinate, absent for deterministic fields such as truths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realization: Option<Vec<i32>>,
    /// Grid y coordinate points.
    pub y: Vec<f64>,
    /// Grid x coordinate points.
    pub x: Vec<f64>,
    /// Validity time, seconds since 1970-01-01 00:00:00 UTC.
    pub time: i64,
    /// Forecast reference time, seconds since 1970-01-01 00:00:00 UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_reference_time: Option<i64>,
    /// Row-major values, `[realization][y][x]`.
    #[serde(deserialize_with = "parse_masked")]
    pub data: Vec<f32>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Cube {
    /// Number of realizations, one for deterministic fields.
    pub fn n_realizations(&self) -> usize {
        self.realization.as_ref().map_or(1, |r| r.len())
    }

    /// Number of grid points in a single realization.
    pub fn n_points(&self) -> usize {
        self.y.len() * self.x.len()
    }

    pub fn shape(&self) -> Vec<usize> {
        match &self.realization {
            Some(r) => vec![r.len(), self.y.len(), self.x.len()],
            None => vec![self.y.len(), self.x.len()],
        }
    }

    /// Check the data length agrees with the coordinates.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let expected = self.n_realizations() * self.n_points();
        if self.data.len() != expected {
            return Err(CalibrationError::InvalidCube(format!(
                "{} has {} values but its coordinates describe {:?} ({} values)",
                self.name,
                self.data.len(),
                self.shape(),
                expected
            )));
        }
        if matches!(&self.realization, Some(r) if r.is_empty()) {
            return Err(CalibrationError::InvalidCube(format!(
                "{} has an empty realization coordinate",
                self.name
            )));
        }
        Ok(())
    }

    /// Values of a single realization.
    pub fn realization_slice(&self, r: usize) -> &[f32] {
        let n = self.n_points();
        &self.data[r * n..(r + 1) * n]
    }

    /// All realization values at grid point `p`.
    pub fn point_values(&self, p: usize) -> Vec<f64> {
        let n = self.n_points();
        (0..self.n_realizations())
            .map(|r| f64::from(self.data[r * n + p]))
            .collect()
    }

    /// Ensemble mean at each grid point.
    pub fn ensemble_mean(&self) -> Vec<f64> {
        (0..self.n_points()).map(|p| mean(&self.point_values(p))).collect()
    }

    /// Ensemble (population) variance at each grid point.
    pub fn ensemble_variance(&self) -> Vec<f64> {
        (0..self.n_points()).map(|p| variance(&self.point_values(p))).collect()
    }

    /// Lead time in seconds, if the cube is a forecast.
    pub fn forecast_period(&self) -> Option<i64> {
        self.forecast_reference_time.map(|frt| self.time - frt)
    }

    /// Whether both cubes are defined on the same grid.
    pub fn spatial_coords_match(&self, other: &Cube) -> bool {
        let coords_close = |a: &[f64], b: &[f64]| {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(i, j)| is_close!(*i, *j, rel_tol = 0.0, abs_tol = GRID_TOLERANCE))
        };
        coords_close(&self.y, &other.y) && coords_close(&self.x, &other.x)
    }

    /// Convert the data into `target` units in place.
    pub fn convert_units(&mut self, target: &str) -> Result<(), CalibrationError> {
        units::convert_values(&mut self.data, &self.units, target)?;
        self.units = target.to_string();
        Ok(())
    }

    /// Copy of the cube's metadata carrying new data and realization coordinate.
    pub fn copy_with_data(&self, realization: Option<Vec<i32>>, data: Vec<f32>) -> Cube {
        Cube {
            name: self.name.clone(),
            units: self.units.clone(),
            realization,
            y: self.y.clone(),
            x: self.x.clone(),
            time: self.time,
            forecast_reference_time: self.forecast_reference_time,
            data,
            attributes: self.attributes.clone(),
        }
    }

    /// Load a cube from a path to a json cube object.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let json_str = fs::read_to_string(path)
            .map_err(|e| CalibrationError::UnableToRead(format!("{}: {}", path.display(), e)))?;
        let cube = Self::from_json(&json_str)
            .map_err(|e| CalibrationError::UnableToRead(format!("{}: {}", path.display(), e)))?;
        Ok(cube)
    }

    /// Load a cube from a json string.
    pub fn from_json(json_str: &str) -> Result<Self, CalibrationError> {
        let cube = serde_json::from_str::<Self>(json_str).map_err(|e| CalibrationError::UnableToRead(e.to_string()))?;
        cube.validate()?;
        Ok(cube)
    }

    /// Dump the cube as a json object.
    pub fn json_dump(&self) -> Result<String, CalibrationError> {
        serde_json::to_string_pretty(self).map_err(|e| CalibrationError::UnableToWrite(e.to_string()))
    }

    /// Save the cube as a json object to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        let path = path.as_ref();
        fs::write(path, self.json_dump()?)
            .map_err(|e| CalibrationError::UnableToWrite(format!("{}: {}", path.display(), e)))
    }
}

/// Expand a glob pattern into a sorted list of paths.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, CalibrationError> {
    let paths = glob::glob(pattern)
        .map_err(|e| CalibrationError::ParseString(pattern.to_string(), "glob pattern".to_string(), e.to_string()))?;
    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| CalibrationError::UnableToRead(e.to_string()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(CalibrationError::NoFilesMatched(pattern.to_string()));
    }
    files.sort();
    Ok(files)
}

/// Load every cube matched by a glob pattern, in path order.
pub fn load_cubes(pattern: &str) -> Result<Vec<Cube>, CalibrationError> {
    expand_glob(pattern)?.iter().map(Cube::load).collect()
}
