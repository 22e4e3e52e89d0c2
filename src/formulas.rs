//! Strength calculation formulas for e1RM scores and the ideal progress curve.

/// Daily growth rate of the ideal trend.
///
/// Approximates a 2.5% per week target: 0.025 / 7 ≈ 0.0035.
pub const IDEAL_DAILY_GROWTH: f64 = 0.0035;

/// Calculates estimated 1RM from weight and reps using the Epley formula.
///
/// Epley: w × (1 + r/30)
///
/// No input is guarded: zero reps returns the weight itself and a
/// non-positive weight follows the linear extension of the formula.
///
/// # Arguments
/// * `weight_kg` - Weight lifted in kilograms
/// * `reps` - Number of repetitions performed
///
/// # Returns
/// Estimated 1RM in kilograms, used as the strength score
pub fn calculate_e1rm(weight_kg: f64, reps: u32) -> f64 {
    weight_kg * (1.0 + f64::from(reps) / 30.0)
}

/// Value of the ideal trend `days_passed` days after the anchor score.
pub fn ideal_trend_value(anchor_score: f64, days_passed: usize) -> f64 {
    anchor_score * (1.0 + IDEAL_DAILY_GROWTH * days_passed as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to check floating point equality with tolerance
    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_e1rm_zero_reps_is_weight() {
        assert_eq!(calculate_e1rm(100.0, 0), 100.0);
        assert_eq!(calculate_e1rm(0.0, 0), 0.0);
    }

    #[test]
    fn test_e1rm_thirty_reps_doubles() {
        for w in [0.0, 2.5, 60.0, 100.0, 312.5] {
            assert!(approx_eq(calculate_e1rm(w, 30), 2.0 * w, 1e-9));
        }
    }

    #[test]
    fn test_e1rm_five_reps() {
        // 100 × (1 + 5/30) = 116.67
        assert!(approx_eq(calculate_e1rm(100.0, 5), 116.67, 0.01));
    }

    #[test]
    fn test_e1rm_ten_reps() {
        // 90 × (1 + 10/30) = 120
        assert!(approx_eq(calculate_e1rm(90.0, 10), 120.0, 1e-9));
    }

    #[test]
    fn test_e1rm_negative_weight_is_linear() {
        assert!(approx_eq(calculate_e1rm(-30.0, 3), -33.0, 1e-9));
    }

    #[test]
    fn test_ideal_trend_one_week() {
        assert!(approx_eq(ideal_trend_value(100.0, 7), 102.45, 1e-9));
    }

    #[test]
    fn test_ideal_trend_at_anchor() {
        assert_eq!(ideal_trend_value(87.5, 0), 87.5);
    }
}
