//! Virtual sensors published back to the host.

pub mod efficiency;
pub mod mode;
pub mod price;
pub mod schedule;

use serde::Serialize;
use serde_json::Value;

pub const SCHEDULE_ENTITY_ID: &str = "sensor.powernap_schedule";
pub const CHARGE_MODE_ENTITY_ID: &str = "sensor.powernap_charge_mode";
pub const AVERAGE_CHARGE_PRICE_ENTITY_ID: &str = "sensor.powernap_average_charge_price";
pub const AVERAGE_DISCHARGE_PRICE_ENTITY_ID: &str = "sensor.powernap_average_discharge_price";
pub const CHARGING_EFFICIENCY_ENTITY_ID: &str = "sensor.powernap_charging_efficiency";
pub const DISCHARGING_EFFICIENCY_ENTITY_ID: &str = "sensor.powernap_discharging_efficiency";

/// State and attributes to push for one virtual sensor.
#[must_use]
#[derive(Debug, Serialize)]
pub struct Publication {
    pub state: String,

    pub attributes: Value,
}

impl Publication {
    pub fn new(state: impl Into<String>, attributes: Value) -> Self {
        Self { state: state.into(), attributes }
    }
}

/// What caused an update cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum Trigger {
    /// The periodic timer.
    #[display("interval")]
    Interval,

    /// A tracked source entity changed state.
    #[display("state change")]
    StateChange,
}
