use std::collections::HashMap;

/// Get a parameter value with a default fallback
pub fn get_param(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

/// Extract a parameter as f64, clamped to a range with finite checks
pub fn get_param_clamped(
    params: &HashMap<String, f64>,
    key: &str,
    default: f64,
    min: f64,
    max: f64,
) -> f64 {
    let raw = params.get(key).copied().unwrap_or(default);
    if !raw.is_finite() {
        return default;
    }
    raw.clamp(min, max)
}

/// Get a parameter rounded to an i32
pub fn get_rounded_param(params: &HashMap<String, f64>, key: &str, default: i32) -> i32 {
    params
        .get(key)
        .copied()
        .map(|v| v.round() as i32)
        .unwrap_or(default)
}

/// Get a parameter as usize with a minimum value
pub fn get_usize_param_min(
    params: &HashMap<String, f64>,
    key: &str,
    default: usize,
    min: usize,
) -> usize {
    params
        .get(key)
        .copied()
        .filter(|v| v.is_finite())
        .map(|v| v.round().max(min as f64) as usize)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let params = HashMap::new();
        assert_eq!(get_param(&params, "x", 1.5), 1.5);
        assert_eq!(get_rounded_param(&params, "x", 3), 3);
        assert_eq!(get_usize_param_min(&params, "x", 5, 1), 5);
    }

    #[test]
    fn clamped_getter_rejects_non_finite_values() {
        let mut params = HashMap::new();
        params.insert("rate".to_string(), f64::NAN);
        assert_eq!(get_param_clamped(&params, "rate", 0.1, 0.0, 1.0), 0.1);
        params.insert("rate".to_string(), 5.0);
        assert_eq!(get_param_clamped(&params, "rate", 0.1, 0.0, 1.0), 1.0);
    }
}
