//! Body metrics and number formatting helpers.

/// Sleep duration recommended to every user (hours per day).
pub const RECOMMENDED_SLEEP_HOURS: f64 = 7.5;

/// Calculates Body-Mass-Index rounded to one decimal place.
///
/// Formula: BMI = weight_kg / (height_cm / 100)²
///
/// Rounding is half away from zero. Returns None for non-positive height,
/// which the wizard never lets through.
///
/// # Arguments
/// * `weight_kg` - Body weight in kilograms
/// * `height_cm` - Height in centimetres
pub fn calculate_bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if height_cm <= 0.0 || !height_cm.is_finite() || !weight_kg.is_finite() {
        return None;
    }

    let height_m = height_cm / 100.0;
    Some(round_to_one_decimal(weight_kg / (height_m * height_m)))
}

/// Rounds half away from zero to one decimal place.
pub fn round_to_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Truncates a model output toward zero.
///
/// Values beyond the i64 range saturate and NaN becomes 0.
pub fn truncate_output(value: f64) -> i64 {
    value.trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_bmi_reference_value() {
        // 70 / 1.75² = 22.857... → 22.9
        assert_eq!(calculate_bmi(70.0, 175.0), Some(22.9));
    }

    #[test]
    fn test_bmi_other_values() {
        // 90 / 1.8² = 27.777... → 27.8
        assert_eq!(calculate_bmi(90.0, 180.0), Some(27.8));
        // 50 / 1.6² = 19.53125 → 19.5
        assert_eq!(calculate_bmi(50.0, 160.0), Some(19.5));
    }

    #[test]
    fn test_bmi_invalid_height() {
        assert!(calculate_bmi(70.0, 0.0).is_none());
        assert!(calculate_bmi(70.0, -175.0).is_none());
        assert!(calculate_bmi(70.0, f64::NAN).is_none());
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert!(approx_eq(round_to_one_decimal(22.25), 22.3, 1e-9));
        assert!(approx_eq(round_to_one_decimal(-22.25), -22.3, 1e-9));
        assert!(approx_eq(round_to_one_decimal(22.24), 22.2, 1e-9));
    }

    #[test]
    fn test_truncate_output_does_not_round() {
        assert_eq!(truncate_output(2199.99), 2199);
        assert_eq!(truncate_output(44.5), 44);
        assert_eq!(truncate_output(-3.7), -3);
        assert_eq!(truncate_output(f64::NAN), 0);
    }
}
