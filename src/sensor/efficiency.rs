//! Charging/discharging efficiency sensors.

use chrono::{DateTime, FixedOffset};
use serde_json::json;

use crate::{
    error::UpdateError,
    quantity::{energy::KilowattHours, power::Kilowatts},
    sensor::{CHARGING_EFFICIENCY_ENTITY_ID, DISCHARGING_EFFICIENCY_ENTITY_ID, Publication},
    statistics::{Flow, efficiency::CycleEfficiency},
    store::StateStore,
};

pub struct EfficiencySensor {
    entity_id: &'static str,
    friendly_name: &'static str,
    power_entity_id: String,
    soc_entity_id: String,
    tracker: CycleEfficiency,
}

impl EfficiencySensor {
    pub fn charging(
        power_entity_id: impl Into<String>,
        soc_entity_id: impl Into<String>,
        capacity: KilowattHours,
    ) -> Self {
        Self {
            entity_id: CHARGING_EFFICIENCY_ENTITY_ID,
            friendly_name: "Charging efficiency",
            power_entity_id: power_entity_id.into(),
            soc_entity_id: soc_entity_id.into(),
            tracker: CycleEfficiency::new(Flow::Charge, capacity),
        }
    }

    pub fn discharging(
        power_entity_id: impl Into<String>,
        soc_entity_id: impl Into<String>,
        capacity: KilowattHours,
    ) -> Self {
        Self {
            entity_id: DISCHARGING_EFFICIENCY_ENTITY_ID,
            friendly_name: "Discharging efficiency",
            power_entity_id: power_entity_id.into(),
            soc_entity_id: soc_entity_id.into(),
            tracker: CycleEfficiency::new(Flow::Discharge, capacity),
        }
    }

    #[must_use]
    pub const fn entity_id(&self) -> &'static str {
        self.entity_id
    }

    pub fn update(
        &mut self,
        store: &impl StateStore,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<Publication>, UpdateError> {
        let power = Kilowatts::from_watts(store.decimal(&self.power_entity_id)?);
        let state_of_charge = store.decimal(&self.soc_entity_id)? / 100.0;
        if !self.tracker.update(now, power, state_of_charge) {
            return Ok(None);
        }
        // Nullable until the first cycle produces a figure.
        let state = self
            .tracker
            .efficiency()
            .map_or_else(|| "unknown".to_string(), |efficiency| format!("{efficiency:.2}"));
        Ok(Some(Publication::new(
            state,
            json!({
                "friendly_name": self.friendly_name,
                "unit_of_measurement": "%",
            }),
        )))
    }
}
