//! Injected read-only view of the host's entity states.
//!
//! The steering loop materializes a [`Snapshot`] per tick and every sensor
//! update runs synchronously against it, so a single update always sees a
//! consistent point-in-time picture of the host.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::{error::UpdateError, quantity::rate::KilowattHourRate};

/// Sentinel states the host uses to signal a non-present value.
const SENTINELS: [&str; 2] = ["unknown", "unavailable"];

/// One entity's state and attributes, as the host reports them.
#[must_use]
#[derive(Clone, Debug, Deserialize)]
pub struct EntityState {
    pub state: String,

    #[serde(default)]
    pub attributes: Value,
}

impl EntityState {
    pub fn new(state: impl Into<String>, attributes: Value) -> Self {
        Self { state: state.into(), attributes }
    }

    pub fn is_available(&self) -> bool {
        !SENTINELS.contains(&self.state.as_str())
    }

    /// Parse the string-encoded numeric state.
    pub fn decimal(&self) -> Result<f64, UpdateError> {
        self.state
            .trim()
            .parse()
            .map_err(|_| UpdateError::parse(&self.state, "not a decimal number"))
    }
}

/// Key → value + attributes lookup over the host's states.
pub trait StateStore {
    fn entity(&self, entity_id: &str) -> Option<&EntityState>;

    /// Numeric state of the entity, failing on absent and sentinel states.
    fn decimal(&self, entity_id: &str) -> Result<f64, UpdateError> {
        let entity = self
            .entity(entity_id)
            .filter(|entity| entity.is_available())
            .ok_or_else(|| UpdateError::MissingSource(entity_id.to_string()))?;
        entity.decimal()
    }

    /// Kilowatt-hour rate of the entity, falling back to the default on
    /// **any** failure. The planner reads the running average charge price
    /// this way: an absent or malformed average must not block planning.
    fn rate_or(&self, entity_id: &str, default: KilowattHourRate) -> KilowattHourRate {
        self.decimal(entity_id).map_or(default, KilowattHourRate)
    }

    /// Deserialize the entity's attributes into a typed record.
    fn attributes<T>(&self, entity_id: &str) -> Result<T, UpdateError>
    where
        T: serde::de::DeserializeOwned,
    {
        let entity = self
            .entity(entity_id)
            .ok_or_else(|| UpdateError::MissingSource(entity_id.to_string()))?;
        serde_json::from_value(entity.attributes.clone())
            .map_err(|error| UpdateError::parse(entity_id, error.to_string()))
    }
}

/// Point-in-time copy of the entity states a tick needs.
#[must_use]
#[derive(Default)]
pub struct Snapshot(HashMap<String, EntityState>);

impl Snapshot {
    pub fn insert(&mut self, entity_id: impl Into<String>, state: EntityState) {
        self.0.insert(entity_id.into(), state);
    }

    /// Raw state string, used to detect external state changes between
    /// consecutive ticks.
    #[must_use]
    pub fn raw_state(&self, entity_id: &str) -> Option<&str> {
        self.0.get(entity_id).map(|entity| entity.state.as_str())
    }
}

impl StateStore for Snapshot {
    fn entity(&self, entity_id: &str) -> Option<&EntityState> {
        self.0.get(entity_id)
    }
}
