//! Per-cycle round-trip efficiency estimation.

use chrono::{DateTime, FixedOffset, TimeDelta};

use crate::{
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts},
    statistics::Flow,
};

/// Compares the energy integrated from power readings against the capacity
/// delta implied by the state-of-charge change over the active cycle.
///
/// Values above 100 % are measurement artifacts and are clamped; there is
/// no lower bound. Nothing is published until the first cycle has moved
/// the state of charge.
#[must_use]
pub struct CycleEfficiency {
    flow: Flow,
    capacity: KilowattHours,
    min_update_interval: TimeDelta,
    start_state_of_charge: Option<f64>,
    accumulated_energy: KilowattHours,
    last_power: Kilowatts,
    last_state_of_charge: Option<f64>,
    last_update: Option<DateTime<FixedOffset>>,
    efficiency: Option<f64>,
}

impl CycleEfficiency {
    pub fn new(flow: Flow, capacity: KilowattHours) -> Self {
        Self {
            flow,
            capacity,
            min_update_interval: TimeDelta::seconds(58),
            start_state_of_charge: None,
            accumulated_energy: KilowattHours::ZERO,
            last_power: Kilowatts::ZERO,
            last_state_of_charge: None,
            last_update: None,
            efficiency: None,
        }
    }

    /// Feed one sample. Returns whether the sample was effective: samples
    /// arriving within the minimum inter-update interval are dropped.
    pub fn update(
        &mut self,
        now: DateTime<FixedOffset>,
        power: Kilowatts,
        state_of_charge: f64,
    ) -> bool {
        if let Some(last_update) = self.last_update
            && now - last_update < self.min_update_interval
        {
            return false;
        }

        if !self.flow.is_active(self.last_power) && self.flow.is_active(power) {
            debug!(flow = ?self.flow, state_of_charge, "cycle started");
            self.start_state_of_charge = Some(state_of_charge);
            self.accumulated_energy = KilowattHours::ZERO;
        }
        if self.flow.is_active(power) {
            // Samples arrive on a roughly one-minute cadence.
            self.accumulated_energy += power.abs() * TimeDelta::minutes(1);
        }

        // Only recompute on state of charge that moved the right way both
        // since the cycle start and since the previous sample, so a stale
        // meter reading never produces a bogus figure.
        if let (Some(start), Some(last)) = (self.start_state_of_charge, self.last_state_of_charge)
            && self.has_moved_favorably(state_of_charge, start, last)
        {
            self.recompute(state_of_charge, start);
        }

        self.last_power = power;
        self.last_state_of_charge = Some(state_of_charge);
        self.last_update = Some(now);
        true
    }

    fn has_moved_favorably(&self, state_of_charge: f64, start: f64, last: f64) -> bool {
        match self.flow {
            Flow::Charge => state_of_charge > start && state_of_charge > last,
            Flow::Discharge => state_of_charge < start && state_of_charge < last,
        }
    }

    fn recompute(&mut self, state_of_charge: f64, start: f64) {
        let capacity_delta = self.capacity * (state_of_charge - start).abs();
        let ratio = match self.flow {
            Flow::Charge => {
                if self.accumulated_energy <= KilowattHours::ZERO {
                    return;
                }
                capacity_delta / self.accumulated_energy
            }
            Flow::Discharge => {
                if capacity_delta <= KilowattHours::ZERO {
                    return;
                }
                self.accumulated_energy / capacity_delta
            }
        };
        self.efficiency = Some((100.0 * ratio).min(100.0));
    }

    /// Latest per-cycle efficiency in percent, if any cycle has produced
    /// one yet.
    #[must_use]
    pub const fn efficiency(&self) -> Option<f64> {
        self.efficiency
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn minute(index: i64) -> DateTime<FixedOffset> {
        "2026-01-10T10:00:00+01:00".parse::<DateTime<FixedOffset>>().unwrap()
            + TimeDelta::minutes(index)
    }

    #[test]
    fn test_charging_cycle() {
        let mut tracker = CycleEfficiency::new(Flow::Charge, KilowattHours(5.12));
        // Idle first, so the cycle start has a previous sample to compare
        // the state of charge against.
        tracker.update(minute(0), Kilowatts::ZERO, 0.50);
        // 2400 W inflow for ten minutes: 0.4 kWh from the meter, while the
        // state of charge climbs by 7 % (0.3584 kWh) on the last sample.
        for index in 1..10 {
            tracker.update(minute(index), Kilowatts::from_watts(-2400.0), 0.50);
        }
        assert_eq!(tracker.efficiency(), None);
        tracker.update(minute(10), Kilowatts::from_watts(-2400.0), 0.57);
        assert_abs_diff_eq!(tracker.efficiency().unwrap(), 89.6, epsilon = 1e-9);
    }

    #[test]
    fn test_discharging_cycle_is_reciprocal() {
        let mut tracker = CycleEfficiency::new(Flow::Discharge, KilowattHours(5.12));
        tracker.update(minute(0), Kilowatts::ZERO, 0.50);
        for index in 1..10 {
            tracker.update(minute(index), Kilowatts::from_watts(2400.0), 0.50);
        }
        // 0.4 kWh delivered while the state of charge dropped 10 %
        // (0.512 kWh): 78.125 %.
        tracker.update(minute(10), Kilowatts::from_watts(2400.0), 0.40);
        assert_abs_diff_eq!(tracker.efficiency().unwrap(), 78.125, epsilon = 1e-9);
    }

    #[test]
    fn test_clamped_at_one_hundred() {
        let mut tracker = CycleEfficiency::new(Flow::Charge, KilowattHours(5.12));
        tracker.update(minute(0), Kilowatts::ZERO, 0.50);
        tracker.update(minute(1), Kilowatts::from_watts(-60.0), 0.50);
        // A 40 % jump on 0.002 kWh of metered energy is an artifact.
        tracker.update(minute(2), Kilowatts::from_watts(-60.0), 0.90);
        assert_abs_diff_eq!(tracker.efficiency().unwrap(), 100.0);
    }

    #[test]
    fn test_unfavorable_movement_is_ignored() {
        let mut tracker = CycleEfficiency::new(Flow::Charge, KilowattHours(5.12));
        tracker.update(minute(0), Kilowatts::ZERO, 0.50);
        tracker.update(minute(1), Kilowatts::from_watts(-2400.0), 0.50);
        // The state of charge dropping during a charge cycle must not
        // produce a figure.
        tracker.update(minute(2), Kilowatts::from_watts(-2400.0), 0.45);
        assert_eq!(tracker.efficiency(), None);
    }

    #[test]
    fn test_debounce_drops_fast_samples() {
        let mut tracker = CycleEfficiency::new(Flow::Charge, KilowattHours(5.12));
        assert!(tracker.update(minute(0), Kilowatts::ZERO, 0.50));
        assert!(!tracker.update(minute(0) + TimeDelta::seconds(30), Kilowatts::ZERO, 0.50));
    }
}
