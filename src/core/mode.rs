use chrono::{DateTime, FixedOffset, TimeDelta};

use crate::core::plan::{Action, Plan};

/// Recommended action for the current instant.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum ChargeMode {
    #[display("charge")]
    Charge,

    #[display("discharge")]
    Discharge,

    #[display("none")]
    None,
}

impl From<Action> for ChargeMode {
    fn from(action: Action) -> Self {
        match action {
            Action::Charge => Self::Charge,
            Action::Discharge => Self::Discharge,
        }
    }
}

impl Plan {
    /// Resolve the mode at `now`: the first action in plan order whose
    /// block `[time, time + 1h)` contains `now` wins, so at hours carrying
    /// both kinds the earlier-merged action takes precedence.
    pub fn mode_at(&self, now: DateTime<FixedOffset>) -> ChargeMode {
        self.iter()
            .find(|action| action.time <= now && now < action.time + TimeDelta::hours(1))
            .map_or(ChargeMode::None, |action| action.action.into())
    }
}
