use std::{
    fmt::{Display, Formatter},
    ops::Mul,
};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::quantity::energy::KilowattHours;

/// Signed power. Negative values are inflow into the battery – the
/// convention of the physical power sensor, relied upon by the cycle
/// detectors.
#[must_use]
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::From,
    derive_more::FromStr,
    derive_more::Neg,
    derive_more::Sub,
)]
pub struct Kilowatts(pub f64);

impl Kilowatts {
    pub const ZERO: Self = Self(0.0);

    pub fn from_watts(watts: f64) -> Self {
        Self(watts * 0.001)
    }

    pub const fn abs(mut self) -> Self {
        self.0 = self.0.abs();
        self
    }
}

impl Display for Kilowatts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} kW", self.0)
    }
}

impl Mul<TimeDelta> for Kilowatts {
    type Output = KilowattHours;

    fn mul(self, rhs: TimeDelta) -> Self::Output {
        KilowattHours(self.0 * rhs.as_seconds_f64() / 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_energy_over_one_minute() {
        // 2400 W over one minute is 0.04 kWh.
        let energy = Kilowatts::from_watts(2400.0) * TimeDelta::minutes(1);
        assert_abs_diff_eq!(energy.0, 0.04);
    }
}
