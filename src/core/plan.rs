use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::quantity::{power::Kilowatts, rate::KilowattHourRate};

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[display("charge")]
    Charge,

    #[display("discharge")]
    Discharge,
}

/// One scheduled hour block. `rate` is set for charge actions only.
#[must_use]
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleAction {
    pub time: DateTime<FixedOffset>,

    pub action: Action,

    /// Block price in decimal currency per kWh.
    pub price: KilowattHourRate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Kilowatts>,
}

/// Ordered charge/discharge actions, ascending by time, recomputed from
/// scratch on every planning run.
#[must_use]
#[derive(Default, Serialize, Deserialize, derive_more::Index, derive_more::IntoIterator)]
pub struct Plan(#[into_iterator(owned, ref)] pub Vec<ScheduleAction>);

impl Plan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduleAction> {
        self.0.iter()
    }
}
