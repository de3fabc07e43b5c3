use chrono::Utc;
use clap::Parser;

use crate::{
    cli::{BatteryArgs, HomeAssistantConnectionArgs, PricingArgs, SourceArgs},
    core::{forecast::ForecastAttributes, planner::Planner},
    prelude::*,
    quantity::rate::KilowattHourRate,
    sensor::AVERAGE_CHARGE_PRICE_ENTITY_ID,
    store::{Snapshot, StateStore},
    tables::build_plan_table,
};

#[derive(Parser)]
pub struct PlanArgs {
    #[clap(flatten)]
    pub home_assistant: HomeAssistantConnectionArgs,

    #[clap(flatten)]
    pub sources: SourceArgs,

    #[clap(flatten)]
    pub battery: BatteryArgs,

    #[clap(flatten)]
    pub pricing: PricingArgs,
}

impl PlanArgs {
    #[instrument(skip_all)]
    pub async fn run(self) -> Result {
        let api = self.home_assistant.try_new_client()?;
        let time_zone = self.home_assistant.resolve_time_zone(&api).await?;
        let now = Utc::now().with_timezone(&time_zone).fixed_offset();

        let mut snapshot = Snapshot::default();
        for entity_id in [
            self.sources.tariff_sensor.as_str(),
            self.sources.soc_sensor.as_str(),
            AVERAGE_CHARGE_PRICE_ENTITY_ID,
        ] {
            if let Some(state) = api.get_state(entity_id).await? {
                snapshot.insert(entity_id, state);
            }
        }

        let state_of_charge = snapshot
            .decimal(&self.sources.soc_sensor)
            .context("cannot read the state of charge")?
            / 100.0;
        let current_capacity = self.battery.max_capacity * state_of_charge;
        let attributes: ForecastAttributes = snapshot
            .attributes(&self.sources.tariff_sensor)
            .context("cannot read the forecast")?;
        ensure!(!attributes.forecast.is_empty(), "the forecast is empty");
        let forecast = attributes
            .forecast
            .iter()
            .filter_map(|raw| raw.normalize(time_zone).ok())
            .collect::<Vec<_>>();
        info!(n_entries = forecast.len(), "fetched the forecast");

        let average_charge_price =
            snapshot.rate_or(AVERAGE_CHARGE_PRICE_ENTITY_ID, KilowattHourRate::ZERO);
        let plan = Planner::builder()
            .forecast(&forecast)
            .now(now)
            .current_capacity(current_capacity)
            .max_capacity(self.battery.max_capacity)
            .charge_rate(self.battery.charge_rate)
            .discharge_rate(self.battery.discharge_rate)
            .depreciation(self.pricing.depreciation)
            .min_profit(self.pricing.min_profit)
            .average_charge_price(average_charge_price)
            .build()
            .plan();
        info!(n_actions = plan.len(), mode = %plan.mode_at(now), "planned");
        println!("{}", build_plan_table(&plan));
        Ok(())
    }
}
