//! Running average of the realized charge cost (or discharge revenue).

use chrono::{DateTime, FixedOffset, TimeDelta};

use crate::{
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
    statistics::Flow,
};

/// Guards the rescale division when no energy has been accumulated yet.
const EPSILON: f64 = 1e-6;

/// Cumulative €/kWh estimator, integrating instantaneous power and tariff
/// samples and re-anchoring itself at every cycle start.
///
/// The re-anchor is a rescale, not a zeroing: the accumulated total is
/// scaled by the same factor as the energy, so the published average stays
/// continuous across the reset instead of jumping.
#[must_use]
pub struct RunningPriceAverage {
    flow: Flow,
    capacity: KilowattHours,
    min_update_interval: TimeDelta,
    calculated_energy: KilowattHours,
    total: Cost,
    previous_power: Kilowatts,
    last_update: Option<DateTime<FixedOffset>>,
}

impl RunningPriceAverage {
    pub fn new(flow: Flow, capacity: KilowattHours) -> Self {
        Self {
            flow,
            capacity,
            min_update_interval: TimeDelta::seconds(58),
            calculated_energy: KilowattHours::ZERO,
            total: Cost::ZERO,
            previous_power: Kilowatts::ZERO,
            last_update: None,
        }
    }

    /// Feed one sample. Returns whether the sample was effective: samples
    /// arriving within the minimum inter-update interval are dropped.
    pub fn update(
        &mut self,
        now: DateTime<FixedOffset>,
        power: Kilowatts,
        tariff: KilowattHourRate,
        state_of_charge: f64,
    ) -> bool {
        if let Some(last_update) = self.last_update
            && now - last_update < self.min_update_interval
        {
            return false;
        }

        if !self.flow.is_active(self.previous_power) && self.flow.is_active(power) {
            self.rescale(state_of_charge);
        }
        if self.flow.is_active(power) {
            // Samples arrive on a roughly one-minute cadence.
            let energy = power.abs() * TimeDelta::minutes(1);
            self.calculated_energy += energy;
            self.total += energy * tariff;
        }

        self.previous_power = power;
        self.last_update = Some(now);
        true
    }

    /// Anchor the accumulated energy to the meter's own capacity estimate
    /// at the cycle start, rescaling the total proportionally so the
    /// average does not drift across long idle periods.
    fn rescale(&mut self, state_of_charge: f64) {
        let anchor = self.capacity * state_of_charge;
        let factor = anchor.0 / (self.calculated_energy.0 + EPSILON);
        self.total = self.total * factor;
        self.calculated_energy = anchor;
        debug!(flow = ?self.flow, energy = %self.calculated_energy, "re-anchored at cycle start");
    }

    /// Published running average, 0 while nothing has been accumulated.
    pub fn average(&self) -> KilowattHourRate {
        if self.calculated_energy.0.abs() < EPSILON {
            KilowattHourRate::ZERO
        } else {
            self.total / self.calculated_energy
        }
    }
}
