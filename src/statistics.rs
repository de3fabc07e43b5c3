pub mod efficiency;
pub mod price;

use crate::quantity::power::Kilowatts;

/// Which side of the battery an estimator watches.
///
/// The sign conventions are asymmetric on purpose: they mirror a single
/// physical power sensor where negative readings are inflow. Cycle
/// detection relies on the exact signs, so they must not be normalized.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Active while power is negative.
    Charge,

    /// Active while power is positive.
    Discharge,
}

impl Flow {
    pub fn is_active(self, power: Kilowatts) -> bool {
        match self {
            Self::Charge => power < Kilowatts::ZERO,
            Self::Discharge => power > Kilowatts::ZERO,
        }
    }
}
