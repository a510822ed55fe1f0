use crate::errors::CalibrationError;

/// Create a string of all available items.
pub fn items_to_strings(items: Vec<&str>) -> String {
    let mut s = String::new();
    for i in items {
        s.push_str(i);
        s.push_str(&String::from(", "));
    }
    s
}

pub fn fmt_vec_output(v: &[f64]) -> String {
    let mut res = String::new();
    if let Some(last) = v.len().checked_sub(1) {
        if last == 0 {
            return format!("{:.4}", v[0]);
        }
        for n in &v[..last] {
            res.push_str(format!("{:.4}", n).as_str());
            res.push_str(", ");
        }
        res.push_str(format!("{:.4}", &v[last]).as_str());
    }
    res
}

// Validation
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), CalibrationError> {
    validate_float_parameter(value, 0.0, f64::INFINITY, parameter)
}

pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), CalibrationError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(CalibrationError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Mean of the values, NaN if any value is NaN or the slice is empty.
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (zero degrees of freedom).
#[inline]
pub fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    if m.is_nan() {
        return f64::NAN;
    }
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variance() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(mean(&v), 2.5);
        assert_eq!(variance(&v), 1.25);
        assert!(mean(&[]).is_nan());
        assert!(variance(&[1.0, f64::NAN]).is_nan());
    }

    #[test]
    fn test_validate_float_parameter() {
        assert!(validate_float_parameter(0.5, 0.0, 1.0, "tolerance").is_ok());
        assert!(validate_positive_float_parameter(-1.0, "tolerance").is_err());
        assert!(validate_positive_float_parameter(f64::NAN, "tolerance").is_err());
    }

    #[test]
    fn test_fmt_vec_output() {
        assert_eq!(fmt_vec_output(&[1.0]), "1.0000");
        assert_eq!(fmt_vec_output(&[1.0, 0.5]), "1.0000, 0.5000");
        assert_eq!(fmt_vec_output(&[]), "");
    }
}
