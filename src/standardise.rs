//! Standardise
//!
//! Metadata standardisation of input cubes and grid containment checks.
use crate::constants::GRID_TOLERANCE;
use crate::cube::Cube;
use crate::errors::CalibrationError;
use crate::metadata::amend_attributes;
use is_close::is_close;
use log::debug;
use std::collections::BTreeMap;

#[inline]
fn points_close(a: f64, b: f64) -> bool {
    is_close!(a, b, rel_tol = 0.0, abs_tol = GRID_TOLERANCE)
}

/// Whether `cutout` points appear as one contiguous run inside `grid`.
fn axis_contains(grid: &[f64], cutout: &[f64]) -> bool {
    let Some(first) = cutout.first() else {
        return false;
    };
    let Some(start) = grid.iter().position(|g| points_close(*first, *g)) else {
        return false;
    };
    match grid.get(start..start + cutout.len()) {
        Some(window) => window.iter().zip(cutout).all(|(g, c)| points_close(*g, *c)),
        None => false,
    }
}

/// Check that the spatial grid of `cutout` is contained within that of `grid`.
pub fn grid_contains_cutout(grid: &Cube, cutout: &Cube) -> bool {
    if grid.spatial_coords_match(cutout) {
        return true;
    }
    axis_contains(&grid.x, &cutout.x) && axis_contains(&grid.y, &cutout.y)
}

/// User-configurable metadata adjustments applied to a cube.
#[derive(Debug, Clone, Default)]
pub struct StandardiseMetadata {
    pub new_name: Option<String>,
    pub new_units: Option<String>,
    /// Attribute amendments; the value `"remove"` deletes the attribute.
    pub attributes: BTreeMap<String, String>,
}

impl StandardiseMetadata {
    /// Rename, convert units and amend attributes, in that order.
    pub fn process(&self, mut cube: Cube) -> Result<Cube, CalibrationError> {
        cube.validate()?;
        if let Some(name) = &self.new_name {
            if name.trim().is_empty() {
                return Err(CalibrationError::InvalidParameter(
                    "new_name".to_string(),
                    "a non-empty name".to_string(),
                    format!("{:?}", name),
                ));
            }
            debug!("Renaming {} to {}.", cube.name, name);
            cube.name = name.clone();
        }
        if let Some(units) = &self.new_units {
            debug!("Converting {} from {} to {}.", cube.name, cube.units, units);
            cube.convert_units(units)?;
        }
        amend_attributes(&mut cube, &self.attributes);
        Ok(cube)
    }
}
