//! Average realized charge/discharge price sensors.

use chrono::{DateTime, FixedOffset};
use serde_json::json;

use crate::{
    error::UpdateError,
    quantity::{energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
    sensor::{AVERAGE_CHARGE_PRICE_ENTITY_ID, AVERAGE_DISCHARGE_PRICE_ENTITY_ID, Publication},
    statistics::{Flow, price::RunningPriceAverage},
    store::StateStore,
};

pub struct AveragePriceSensor {
    entity_id: &'static str,
    friendly_name: &'static str,
    power_entity_id: String,
    tariff_entity_id: String,
    soc_entity_id: String,
    tracker: RunningPriceAverage,
}

impl AveragePriceSensor {
    pub fn charge(
        power_entity_id: impl Into<String>,
        tariff_entity_id: impl Into<String>,
        soc_entity_id: impl Into<String>,
        capacity: KilowattHours,
    ) -> Self {
        Self {
            entity_id: AVERAGE_CHARGE_PRICE_ENTITY_ID,
            friendly_name: "Average charge price",
            power_entity_id: power_entity_id.into(),
            tariff_entity_id: tariff_entity_id.into(),
            soc_entity_id: soc_entity_id.into(),
            tracker: RunningPriceAverage::new(Flow::Charge, capacity),
        }
    }

    pub fn discharge(
        power_entity_id: impl Into<String>,
        tariff_entity_id: impl Into<String>,
        soc_entity_id: impl Into<String>,
        capacity: KilowattHours,
    ) -> Self {
        Self {
            entity_id: AVERAGE_DISCHARGE_PRICE_ENTITY_ID,
            friendly_name: "Average discharge price",
            power_entity_id: power_entity_id.into(),
            tariff_entity_id: tariff_entity_id.into(),
            soc_entity_id: soc_entity_id.into(),
            tracker: RunningPriceAverage::new(Flow::Discharge, capacity),
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
        let tariff = KilowattHourRate(store.decimal(&self.tariff_entity_id)?);
        let state_of_charge = store.decimal(&self.soc_entity_id)? / 100.0;
        if !self.tracker.update(now, power, tariff, state_of_charge) {
            return Ok(None);
        }
        Ok(Some(Publication::new(
            format!("{:.4}", self.tracker.average().0),
            json!({
                "friendly_name": self.friendly_name,
                "unit_of_measurement": "€/kWh",
            }),
        )))
    }
}
