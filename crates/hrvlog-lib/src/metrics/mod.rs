pub mod frequency;
pub mod spectral;
pub mod time;

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (ddof = 0).
///
/// Deviations are taken against the first sample before the usual two-pass
/// formula, so a constant input yields exactly zero.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let first = *values.first()?;
    let shifted: Vec<f64> = values.iter().map(|v| v - first).collect();
    let m = mean(&shifted)?;
    let var = shifted.iter().map(|v| (v - m).powi(2)).sum::<f64>() / shifted.len() as f64;
    Some(var.sqrt())
}

/// `num / den`, or `None` when the quotient is undefined.
pub fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 || !num.is_finite() || !den.is_finite() {
        return None;
    }
    Some(num / den)
}
