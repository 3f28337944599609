use chrono::{DateTime, Local};

/// In-memory state of the monitored battery. Owned by the monitor and
/// mutated only on its single thread of control; no locking required.
#[derive(Debug, Clone)]
pub struct BatteryState {
    /// Last voltage sample from the bus, in volts.
    pub voltage: f64,
    /// Last current sample from the bus, in amps (positive = charging).
    pub current: f64,
    /// Cumulative energy delivered into the battery, in kWh. Never
    /// decreases except by an external rewrite of the persisted index.
    pub charged_energy: f64,
    /// Cumulative energy drawn from the battery, in kWh. Never decreases.
    pub discharged_energy: f64,
    /// Wall-clock time of the previous tick, valid or not.
    pub last_sample_time: DateTime<Local>,
    /// Hour-edge latch: true once a checkpoint has been written during the
    /// current clock hour, cleared as soon as the minute rolls off zero.
    pub historized_this_hour: bool,
    /// Whether the most recent bus read succeeded; gates whether the next
    /// elapsed interval is trusted for integration.
    pub samples_valid: bool,
}

impl BatteryState {
    /// State resumed from persisted totals, before the first bus sample.
    ///
    /// The latch starts set so a process started during minute 0 does not
    /// immediately checkpoint the totals it just loaded.
    pub fn resumed(charged: f64, discharged: f64, now: DateTime<Local>) -> Self {
        Self {
            voltage: 0.0,
            current: 0.0,
            charged_energy: charged,
            discharged_energy: discharged,
            last_sample_time: now,
            historized_this_hour: true,
            samples_valid: false,
        }
    }

    /// Routes a signed energy delta to the matching accumulator. Exactly
    /// one accumulator changes for a non-zero delta, neither for zero.
    pub fn apply_delta(&mut self, delta: f64) {
        if delta > 0.0 {
            self.charged_energy += delta;
        } else if delta < 0.0 {
            self.discharged_energy -= delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> BatteryState {
        BatteryState::resumed(10.0, 5.0, Local::now())
    }

    #[test]
    fn test_positive_delta_charges() {
        let mut s = state();
        s.apply_delta(0.25);
        assert_eq!(s.charged_energy, 10.25);
        assert_eq!(s.discharged_energy, 5.0);
    }

    #[test]
    fn test_negative_delta_discharges() {
        let mut s = state();
        s.apply_delta(-0.25);
        assert_eq!(s.charged_energy, 10.0);
        assert_eq!(s.discharged_energy, 5.25);
    }

    #[test]
    fn test_zero_delta_touches_neither() {
        let mut s = state();
        s.apply_delta(0.0);
        assert_eq!(s.charged_energy, 10.0);
        assert_eq!(s.discharged_energy, 5.0);
    }
}
