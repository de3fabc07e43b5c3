use std::time::Duration;

use bon::Builder;
use chrono::Utc;
use chrono_tz::Tz;
use clap::Parser;
use tokio::time::{MissedTickBehavior, interval};

use crate::{
    api::home_assistant::Api,
    cli::{BatteryArgs, HomeAssistantConnectionArgs, PricingArgs, SourceArgs},
    error::UpdateError,
    prelude::*,
    sensor::{
        AVERAGE_CHARGE_PRICE_ENTITY_ID,
        CHARGE_MODE_ENTITY_ID,
        Publication,
        SCHEDULE_ENTITY_ID,
        Trigger,
        efficiency::EfficiencySensor,
        mode::ChargeModeSensor,
        price::AveragePriceSensor,
        schedule::ScheduleSensor,
    },
    store::Snapshot,
};

/// Host-platform tick: the sensors are re-evaluated this often, with the
/// per-sensor debounces deciding what actually recomputes.
const TICK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
pub struct RunArgs {
    #[clap(flatten)]
    pub home_assistant: HomeAssistantConnectionArgs,

    #[clap(flatten)]
    pub sources: SourceArgs,

    #[clap(flatten)]
    pub battery: BatteryArgs,

    #[clap(flatten)]
    pub pricing: PricingArgs,
}

impl RunArgs {
    #[instrument(skip_all)]
    pub async fn run(self) -> Result {
        let api = self.home_assistant.try_new_client()?;
        let time_zone = self.home_assistant.resolve_time_zone(&api).await?;
        info!(%time_zone, "starting the steering loop");

        let schedule = ScheduleSensor::builder()
            .tariff_entity_id(self.sources.tariff_sensor.clone())
            .soc_entity_id(self.sources.soc_sensor.clone())
            .time_zone(time_zone)
            .max_capacity(self.battery.max_capacity)
            .charge_rate(self.battery.charge_rate)
            .discharge_rate(self.battery.discharge_rate)
            .depreciation(self.pricing.depreciation)
            .min_profit(self.pricing.min_profit)
            .build();
        Steering::builder()
            .api(api)
            .time_zone(time_zone)
            .schedule(schedule)
            .mode(ChargeModeSensor::new(SCHEDULE_ENTITY_ID))
            .charge_price(AveragePriceSensor::charge(
                self.sources.power_sensor.as_str(),
                self.sources.tariff_sensor.as_str(),
                self.sources.soc_sensor.as_str(),
                self.battery.max_capacity,
            ))
            .discharge_price(AveragePriceSensor::discharge(
                self.sources.power_sensor.as_str(),
                self.sources.tariff_sensor.as_str(),
                self.sources.soc_sensor.as_str(),
                self.battery.max_capacity,
            ))
            .charging_efficiency(EfficiencySensor::charging(
                self.sources.power_sensor.as_str(),
                self.sources.soc_sensor.as_str(),
                self.battery.max_capacity,
            ))
            .discharging_efficiency(EfficiencySensor::discharging(
                self.sources.power_sensor.as_str(),
                self.sources.soc_sensor.as_str(),
                self.battery.max_capacity,
            ))
            .sources(self.sources)
            .build()
            .run()
            .await
    }
}

#[derive(Builder)]
struct Steering {
    api: Api,
    time_zone: Tz,
    sources: SourceArgs,
    schedule: ScheduleSensor,
    mode: ChargeModeSensor,
    charge_price: AveragePriceSensor,
    discharge_price: AveragePriceSensor,
    charging_efficiency: EfficiencySensor,
    discharging_efficiency: EfficiencySensor,
}

impl Steering {
    async fn run(mut self) -> Result {
        let mut tick = interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut previous: Option<Snapshot> = None;

        loop {
            tick.tick().await;
            let now = Utc::now().with_timezone(&self.time_zone).fixed_offset();
            let snapshot = self.snapshot().await;
            let trigger = self.trigger(previous.as_ref(), &snapshot);

            let update = self.schedule.update(&snapshot, now, trigger);
            publish(&self.api, SCHEDULE_ENTITY_ID, update).await;

            let update = self.mode.update(&snapshot, now);
            publish(&self.api, CHARGE_MODE_ENTITY_ID, update).await;

            let update = self.charge_price.update(&snapshot, now);
            publish(&self.api, self.charge_price.entity_id(), update).await;

            let update = self.discharge_price.update(&snapshot, now);
            publish(&self.api, self.discharge_price.entity_id(), update).await;

            let update = self.charging_efficiency.update(&snapshot, now);
            publish(&self.api, self.charging_efficiency.entity_id(), update).await;

            let update = self.discharging_efficiency.update(&snapshot, now);
            publish(&self.api, self.discharging_efficiency.entity_id(), update).await;

            previous = Some(snapshot);
        }
    }

    /// Point-in-time view of everything the sensors read, including the
    /// previously published outputs they feed on.
    async fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        let entity_ids = [
            self.sources.tariff_sensor.as_str(),
            self.sources.soc_sensor.as_str(),
            self.sources.power_sensor.as_str(),
            SCHEDULE_ENTITY_ID,
            AVERAGE_CHARGE_PRICE_ENTITY_ID,
        ];
        for entity_id in entity_ids {
            match self.api.get_state(entity_id).await {
                Ok(Some(state)) => snapshot.insert(entity_id, state),
                Ok(None) => {}
                Err(error) => warn!(entity_id, "failed to fetch the state: {error:#}"),
            }
        }
        snapshot
    }

    /// A change of the tariff or state-of-charge source between ticks
    /// forces an immediate planning run, bypassing the periodic debounce.
    fn trigger(&self, previous: Option<&Snapshot>, current: &Snapshot) -> Trigger {
        let Some(previous) = previous else {
            return Trigger::Interval;
        };
        for entity_id in [self.sources.tariff_sensor.as_str(), self.sources.soc_sensor.as_str()] {
            if previous.raw_state(entity_id) != current.raw_state(entity_id) {
                info!(entity_id, "source state changed");
                return Trigger::StateChange;
            }
        }
        Trigger::Interval
    }
}

/// Push one sensor's update to the host. Failures degrade to a no-op for
/// this cycle: the previously published value stands and the next tick
/// retries.
async fn publish(api: &Api, entity_id: &str, update: Result<Option<Publication>, UpdateError>) {
    match update {
        Ok(Some(publication)) => match api.set_state(entity_id, &publication).await {
            Ok(()) => debug!(entity_id, state = %publication.state, "published"),
            Err(error) => warn!(entity_id, "failed to publish: {error:#}"),
        },
        Ok(None) => {}
        Err(error) => warn!(entity_id, "skipping this cycle: {error}"),
    }
}
