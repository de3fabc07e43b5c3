//! The planning sensor: state is the number of scheduled actions, the
//! `schedule` attribute carries the plan itself.

use bon::Builder;
use chrono::{DateTime, FixedOffset, TimeDelta};
use chrono_tz::Tz;
use serde_json::json;

use crate::{
    core::{forecast::ForecastAttributes, planner::Planner},
    error::UpdateError,
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
    sensor::{AVERAGE_CHARGE_PRICE_ENTITY_ID, Publication, Trigger},
    store::{EntityState, StateStore},
};

#[derive(Builder)]
pub struct ScheduleSensor {
    tariff_entity_id: String,

    soc_entity_id: String,

    time_zone: Tz,

    max_capacity: KilowattHours,

    charge_rate: Kilowatts,

    discharge_rate: Kilowatts,

    depreciation: KilowattHourRate,

    min_profit: KilowattHourRate,

    /// Minimum spacing of interval-triggered planning runs. State-change
    /// triggers bypass it and do not advance the stamp.
    #[builder(default = TimeDelta::seconds(300))]
    min_update_interval: TimeDelta,

    last_interval_update: Option<DateTime<FixedOffset>>,
}

impl ScheduleSensor {
    #[instrument(skip_all, fields(trigger = %trigger))]
    pub fn update(
        &mut self,
        store: &impl StateStore,
        now: DateTime<FixedOffset>,
        trigger: Trigger,
    ) -> Result<Option<Publication>, UpdateError> {
        if trigger == Trigger::Interval
            && let Some(last_update) = self.last_interval_update
            && now - last_update < self.min_update_interval
        {
            debug!("skipping the periodic update: the last one is too recent");
            return Ok(None);
        }
        if trigger == Trigger::Interval {
            self.last_interval_update = Some(now);
        }

        let state_of_charge = store.decimal(&self.soc_entity_id)? / 100.0;
        let current_capacity = self.max_capacity * state_of_charge;
        let capacity_needed = self.max_capacity - current_capacity;
        debug!(
            state_of_charge,
            %current_capacity,
            %capacity_needed,
            hours_to_full = capacity_needed.0 / self.charge_rate.0,
            "battery state",
        );

        if !self.tariff_available(store) {
            return Err(UpdateError::MissingSource(self.tariff_entity_id.clone()));
        }
        let attributes: ForecastAttributes = store.attributes(&self.tariff_entity_id)?;
        if attributes.forecast.is_empty() {
            warn!("no forecast data available");
            return Ok(None);
        }
        let forecast = attributes
            .forecast
            .iter()
            .filter_map(|raw| {
                raw.normalize(self.time_zone)
                    .inspect_err(|error| warn!(datetime = %raw.datetime, "dropping entry: {error}"))
                    .ok()
            })
            .collect::<Vec<_>>();

        let average_charge_price =
            store.rate_or(AVERAGE_CHARGE_PRICE_ENTITY_ID, KilowattHourRate::ZERO);
        let plan = Planner::builder()
            .forecast(&forecast)
            .now(now)
            .current_capacity(current_capacity)
            .max_capacity(self.max_capacity)
            .charge_rate(self.charge_rate)
            .discharge_rate(self.discharge_rate)
            .depreciation(self.depreciation)
            .min_profit(self.min_profit)
            .average_charge_price(average_charge_price)
            .build()
            .plan();
        for action in plan.iter() {
            info!(
                action = %action.action,
                time = %action.time,
                price = %action.price,
                "scheduled",
            );
        }

        Ok(Some(Publication::new(
            plan.len().to_string(),
            json!({
                "schedule": plan,
                "friendly_name": "Battery schedule",
                "icon": "mdi:battery-clock",
            }),
        )))
    }

    fn tariff_available(&self, store: &impl StateStore) -> bool {
        store.entity(&self.tariff_entity_id).is_some_and(EntityState::is_available)
    }
}

#[cfg(test)]
mod tests {
    use chrono_tz::Europe::Amsterdam;
    use serde_json::Value;

    use super::*;
    use crate::store::Snapshot;

    fn sensor() -> ScheduleSensor {
        ScheduleSensor::builder()
            .tariff_entity_id("sensor.tariff".to_string())
            .soc_entity_id("sensor.soc".to_string())
            .time_zone(Amsterdam)
            .max_capacity(KilowattHours(5.12))
            .charge_rate(Kilowatts(0.8))
            .discharge_rate(Kilowatts(0.8))
            .depreciation(KilowattHourRate(0.065))
            .min_profit(KilowattHourRate(0.05))
            .build()
    }

    fn snapshot(soc_state: &str) -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.insert("sensor.soc", EntityState::new(soc_state, json!({})));
        snapshot.insert(
            "sensor.tariff",
            EntityState::new(
                "0.25",
                json!({
                    "forecast": [
                        {"datetime": "2026-01-10T09:00:00Z", "electricity_price": 1_000_000},
                        {"datetime": "2026-01-10T10:00:00Z", "electricity_price": 5_000_000},
                        {"datetime": "2026-01-10T11:00:00Z", "electricity_price": 500_000},
                    ],
                }),
            ),
        );
        snapshot
    }

    fn now() -> DateTime<FixedOffset> {
        "2026-01-10T09:30:00+01:00".parse().unwrap()
    }

    #[test]
    fn test_unavailable_soc_skips_the_cycle() {
        let mut sensor = sensor();
        assert!(matches!(
            sensor.update(&snapshot("unavailable"), now(), Trigger::Interval),
            Err(UpdateError::MissingSource(_)),
        ));
    }

    #[test]
    fn test_plans_and_publishes() {
        let mut sensor = sensor();
        let publication =
            sensor.update(&snapshot("20.0"), now(), Trigger::Interval).unwrap().unwrap();
        // The forecast is in UTC: blocks at 10:00, 11:00, and 12:00 local.
        // All three are charged, the most expensive one also discharges.
        assert_eq!(publication.state, "4");
        let schedule = &publication.attributes["schedule"];
        assert!(matches!(schedule, Value::Array(actions) if actions.len() == 4));
    }

    #[test]
    fn test_interval_updates_are_debounced() {
        let mut sensor = sensor();
        let snapshot = snapshot("20.0");
        assert!(sensor.update(&snapshot, now(), Trigger::Interval).unwrap().is_some());
        let soon = now() + TimeDelta::seconds(60);
        assert!(sensor.update(&snapshot, soon, Trigger::Interval).unwrap().is_none());
        // A state change bypasses the debounce.
        assert!(sensor.update(&snapshot, soon, Trigger::StateChange).unwrap().is_some());
    }
}
