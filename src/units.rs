//! Units
//!
//! Affine conversions between the units forecasts are commonly supplied in.
//! Each unit maps onto the base unit of its dimension as `base = value * scale + offset`.
use crate::errors::CalibrationError;
use crate::utils::items_to_strings;

/// Physical dimension of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Temperature,
    Speed,
    Length,
    Dimensionless,
}

struct UnitDefinition {
    symbols: &'static [&'static str],
    dimension: Dimension,
    scale: f64,
    offset: f64,
}

const REGISTRY: &[UnitDefinition] = &[
    UnitDefinition {
        symbols: &["K", "kelvin"],
        dimension: Dimension::Temperature,
        scale: 1.0,
        offset: 0.0,
    },
    UnitDefinition {
        symbols: &["degC", "celsius", "Celsius", "deg_C"],
        dimension: Dimension::Temperature,
        scale: 1.0,
        offset: 273.15,
    },
    UnitDefinition {
        symbols: &["degF", "fahrenheit", "Fahrenheit", "deg_F"],
        dimension: Dimension::Temperature,
        scale: 5.0 / 9.0,
        offset: 459.67 * 5.0 / 9.0,
    },
    UnitDefinition {
        symbols: &["m s-1", "m/s", "m s^-1"],
        dimension: Dimension::Speed,
        scale: 1.0,
        offset: 0.0,
    },
    UnitDefinition {
        symbols: &["km h-1", "km/h", "km h^-1"],
        dimension: Dimension::Speed,
        scale: 1.0 / 3.6,
        offset: 0.0,
    },
    UnitDefinition {
        symbols: &["knots", "kt", "knot"],
        dimension: Dimension::Speed,
        scale: 1852.0 / 3600.0,
        offset: 0.0,
    },
    UnitDefinition {
        symbols: &["m", "metres", "meters"],
        dimension: Dimension::Length,
        scale: 1.0,
        offset: 0.0,
    },
    UnitDefinition {
        symbols: &["mm", "millimetres"],
        dimension: Dimension::Length,
        scale: 1e-3,
        offset: 0.0,
    },
    UnitDefinition {
        symbols: &["km", "kilometres"],
        dimension: Dimension::Length,
        scale: 1e3,
        offset: 0.0,
    },
    UnitDefinition {
        symbols: &["1", ""],
        dimension: Dimension::Dimensionless,
        scale: 1.0,
        offset: 0.0,
    },
];

fn normalise(unit: &str) -> String {
    unit.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn lookup(unit: &str) -> Result<&'static UnitDefinition, CalibrationError> {
    let unit = normalise(unit);
    REGISTRY
        .iter()
        .find(|d| d.symbols.contains(&unit.as_str()))
        .ok_or_else(|| {
            let known: Vec<&str> = REGISTRY.iter().map(|d| d.symbols[0]).collect();
            CalibrationError::ParseString(unit, "Unit".to_string(), items_to_strings(known))
        })
}

/// Dimension of a unit string.
pub fn dimension(unit: &str) -> Result<Dimension, CalibrationError> {
    Ok(lookup(unit)?.dimension)
}

/// Whether two unit strings refer to the same unit.
pub fn same_unit(a: &str, b: &str) -> bool {
    match (lookup(a), lookup(b)) {
        (Ok(da), Ok(db)) => std::ptr::eq(da, db),
        _ => normalise(a) == normalise(b),
    }
}

/// Return `(scale, offset)` such that `to = from * scale + offset`.
///
/// Variances and other spreads convert with `scale` (or `scale²`) alone.
pub fn conversion(from: &str, to: &str) -> Result<(f64, f64), CalibrationError> {
    let f = lookup(from)?;
    let t = lookup(to)?;
    if f.dimension != t.dimension {
        return Err(CalibrationError::IncompatibleUnits(from.to_string(), to.to_string()));
    }
    let scale = f.scale / t.scale;
    let offset = (f.offset - t.offset) / t.scale;
    Ok((scale, offset))
}

/// Convert a slice of values in place, leaving NaN untouched.
pub fn convert_values(values: &mut [f32], from: &str, to: &str) -> Result<(), CalibrationError> {
    if same_unit(from, to) {
        return Ok(());
    }
    let (scale, offset) = conversion(from, to)?;
    values
        .iter_mut()
        .for_each(|v| *v = (f64::from(*v) * scale + offset) as f32);
    Ok(())
}
