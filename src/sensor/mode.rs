//! Maps "now" against the most recent published plan.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::json;

use crate::{
    core::plan::Plan,
    error::UpdateError,
    prelude::*,
    sensor::Publication,
    store::StateStore,
};

pub struct ChargeModeSensor {
    schedule_entity_id: String,
}

/// The schedule sensor's attributes, as read back from the host. The
/// reader may see the previous cycle's plan, which is fine.
#[derive(Deserialize)]
struct ScheduleAttributes {
    #[serde(default)]
    schedule: Plan,
}

impl ChargeModeSensor {
    pub fn new(schedule_entity_id: impl Into<String>) -> Self {
        Self { schedule_entity_id: schedule_entity_id.into() }
    }

    #[instrument(skip_all)]
    pub fn update(
        &self,
        store: &impl StateStore,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<Publication>, UpdateError> {
        let attributes: ScheduleAttributes = store.attributes(&self.schedule_entity_id)?;
        let mode = attributes.schedule.mode_at(now);
        debug!(%mode, "resolved");
        Ok(Some(Publication::new(
            mode.to_string(),
            json!({"friendly_name": "Battery charge mode"}),
        )))
    }
}
