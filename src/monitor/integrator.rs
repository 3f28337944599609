//! Numeric integration of power samples into an energy delta.

/// `V * A * s` is joules; one kWh is 3.6 MJ, so this divisor converts a
/// sampled power window straight to kWh, the unit of the bus history
/// entities and the persisted indexes.
pub const JOULES_PER_KWH: f64 = 3_600_000.0;

/// Energy transferred during the elapsed window, in kWh, assuming voltage
/// and current held their last-sampled values for the whole window
/// (left-rectangle approximation; fine at a 100 ms cadence).
///
/// Returns zero when the window is non-positive (clock skew, first tick)
/// or when the samples come from a failed bus read.
pub fn integrate(voltage: f64, current: f64, elapsed_secs: f64, samples_valid: bool) -> f64 {
    if !samples_valid || elapsed_secs <= 0.0 {
        return 0.0;
    }
    voltage * current * elapsed_secs / JOULES_PER_KWH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charging_formula() {
        // 50 V * 10 A for one hour is exactly 0.5 kWh.
        let delta = integrate(50.0, 10.0, 3600.0, true);
        assert!((delta - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_discharging_is_negative() {
        let delta = integrate(50.0, -10.0, 3600.0, true);
        assert!((delta + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_subsecond_window() {
        // 48 V * 20 A over 100 ms.
        let delta = integrate(48.0, 20.0, 0.1, true);
        assert!((delta - 48.0 * 20.0 * 0.1 / JOULES_PER_KWH).abs() < 1e-15);
    }

    #[test]
    fn test_zero_elapsed_is_zero() {
        assert_eq!(integrate(50.0, 10.0, 0.0, true), 0.0);
    }

    #[test]
    fn test_negative_elapsed_is_zero() {
        assert_eq!(integrate(50.0, 10.0, -5.0, true), 0.0);
    }

    #[test]
    fn test_invalid_samples_are_zero() {
        assert_eq!(integrate(50.0, 10.0, 3600.0, false), 0.0);
    }
}
