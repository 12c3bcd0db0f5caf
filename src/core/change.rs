//! Relative price change between a baseline and a latest price.

/// Percentage change from `old` to `new`.
///
/// Returns `0.0` when either price is missing, when `old` is zero, or when
/// the result would not be finite. The baseline is taken by absolute value
/// so a negative baseline does not flip the sign of the move.
pub fn percent_change(old: Option<f64>, new: Option<f64>) -> f64 {
    let (Some(old), Some(new)) = (old, new) else {
        return 0.0;
    };
    if old == 0.0 {
        return 0.0;
    }
    let change = (new - old) / old.abs() * 100.0;
    if change.is_finite() { change } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_operands_yield_zero() {
        assert_eq!(percent_change(None, Some(110.0)), 0.0);
        assert_eq!(percent_change(Some(100.0), None), 0.0);
        assert_eq!(percent_change(None, None), 0.0);
    }

    #[test]
    fn test_zero_baseline_yields_zero() {
        assert_eq!(percent_change(Some(0.0), Some(110.0)), 0.0);
        assert_eq!(percent_change(Some(-0.0), Some(5.0)), 0.0);
    }

    #[test]
    fn test_rises_and_falls() {
        assert_eq!(percent_change(Some(100.0), Some(110.0)), 10.0);
        assert_eq!(percent_change(Some(100.0), Some(90.0)), -10.0);
        assert_eq!(percent_change(Some(100.0), Some(100.0)), 0.0);
    }

    #[test]
    fn test_negative_baseline_keeps_direction() {
        assert_eq!(percent_change(Some(-50.0), Some(-40.0)), 20.0);
        assert_eq!(percent_change(Some(-50.0), Some(-60.0)), -20.0);
    }

    #[test]
    fn test_non_finite_inputs_yield_zero() {
        assert_eq!(percent_change(Some(f64::NAN), Some(1.0)), 0.0);
        assert_eq!(percent_change(Some(1.0), Some(f64::INFINITY)), 0.0);
        assert_eq!(percent_change(Some(f64::MIN_POSITIVE), Some(f64::MAX)), 0.0);
    }

    #[test]
    fn test_same_inputs_same_output() {
        let first = percent_change(Some(4900.0), Some(5000.0));
        let second = percent_change(Some(4900.0), Some(5000.0));
        assert_eq!(first, second);
        assert!((first - 2.0408).abs() < 0.001);
    }
}
