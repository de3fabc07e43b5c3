use std::{
    fmt::{Display, Formatter},
    ops::{Div, Mul},
};

use serde::{Deserialize, Serialize};

use crate::quantity::{energy::KilowattHours, rate::KilowattHourRate};

/// Accumulated money: cost on the charge side, revenue on the discharge
/// side.
#[must_use]
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::From,
    derive_more::Sub,
)]
pub struct Cost(pub f64);

impl Cost {
    pub const ZERO: Self = Self(0.0);
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:+.2} €", self.0)
    }
}

/// Rescale the accumulated total at a cycle boundary.
impl Mul<f64> for Cost {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<KilowattHours> for Cost {
    type Output = KilowattHourRate;

    fn div(self, rhs: KilowattHours) -> Self::Output {
        KilowattHourRate(self.0 / rhs.0)
    }
}
