mod plan;
mod run;

use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use reqwest::Url;

pub use self::{plan::PlanArgs, run::RunArgs};
use crate::{
    api::home_assistant::Api,
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: steer the battery against the host until interrupted.
    #[clap(name = "run")]
    Run(Box<RunArgs>),

    /// Compute and print the schedule once, without publishing anything.
    #[clap(name = "plan")]
    Plan(Box<PlanArgs>),
}

#[derive(Parser)]
pub struct HomeAssistantConnectionArgs {
    /// Home Assistant API access token.
    #[clap(long = "home-assistant-access-token", env = "HOME_ASSISTANT_ACCESS_TOKEN")]
    pub access_token: String,

    /// Home Assistant API base URL. For example: `http://localhost:8123/api`.
    #[clap(long = "home-assistant-api-base-url", env = "HOME_ASSISTANT_API_BASE_URL")]
    pub base_url: Url,

    /// Override the host-configured time zone.
    #[clap(long = "time-zone", env = "TIME_ZONE")]
    pub time_zone: Option<Tz>,
}

impl HomeAssistantConnectionArgs {
    pub fn try_new_client(&self) -> Result<Api> {
        Api::try_new(&self.access_token, self.base_url.clone())
    }

    /// Working time zone: the override, or whatever the host reports.
    pub async fn resolve_time_zone(&self, api: &Api) -> Result<Tz> {
        match self.time_zone {
            Some(time_zone) => Ok(time_zone),
            None => api.get_config().await?.try_time_zone(),
        }
    }
}

#[derive(Clone, Parser)]
pub struct SourceArgs {
    /// Tariff entity carrying the current price and the `forecast` attribute.
    #[clap(long = "tariff-sensor", env = "TARIFF_SENSOR")]
    pub tariff_sensor: String,

    /// Battery state-of-charge entity, in percent.
    #[clap(long = "soc-sensor", env = "SOC_SENSOR")]
    pub soc_sensor: String,

    /// Battery power entity, in watts, negative while charging.
    #[clap(long = "power-sensor", env = "POWER_SENSOR")]
    pub power_sensor: String,
}

#[derive(Copy, Clone, Parser)]
pub struct BatteryArgs {
    /// Usable battery capacity in kWh.
    #[clap(long = "max-capacity-kwh", default_value = "5.12", env = "MAX_CAPACITY_KWH")]
    pub max_capacity: KilowattHours,

    /// Charging power in kilowatts.
    #[clap(long = "charge-rate-kilowatts", default_value = "0.8", env = "CHARGE_RATE_KILOWATTS")]
    pub charge_rate: Kilowatts,

    /// Discharging power in kilowatts.
    #[clap(
        long = "discharge-rate-kilowatts",
        default_value = "0.8",
        env = "DISCHARGE_RATE_KILOWATTS"
    )]
    pub discharge_rate: Kilowatts,
}

#[derive(Copy, Clone, Parser)]
pub struct PricingArgs {
    /// Assumed battery wear cost per kWh cycled.
    #[clap(long = "depreciation-per-kwh", default_value = "0.065", env = "DEPRECIATION_PER_KWH")]
    pub depreciation: KilowattHourRate,

    /// Minimum arbitrage margin per kWh.
    #[clap(long = "min-profit-per-kwh", default_value = "0.05", env = "MIN_PROFIT_PER_KWH")]
    pub min_profit: KilowattHourRate,
}
