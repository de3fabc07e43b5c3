//! Day-ahead tariff forecast, as published by the tariff entity.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_with::serde_as;

use crate::{error::UpdateError, quantity::rate::KilowattHourRate};

/// Tariff entity attributes. Entries missing a required field are dropped
/// on deserialization rather than failing the whole forecast.
#[must_use]
#[serde_as]
#[derive(Deserialize)]
pub struct ForecastAttributes {
    #[serde(default)]
    #[serde_as(as = "serde_with::VecSkipError<_>")]
    pub forecast: Vec<RawForecastEntry>,
}

/// One raw forecast record: an hour-block start timestamp and the price in
/// tenth-of-micro currency units per kWh.
#[must_use]
#[derive(Clone, Debug, Deserialize)]
pub struct RawForecastEntry {
    pub datetime: String,

    pub electricity_price: i64,
}

impl RawForecastEntry {
    /// Pin the entry's timestamp to the configured time zone.
    pub fn normalize(&self, time_zone: Tz) -> Result<ForecastEntry, UpdateError> {
        Ok(ForecastEntry {
            start_at: normalize_timestamp(&self.datetime, time_zone)?,
            electricity_price: self.electricity_price,
        })
    }
}

/// One-hour block starting at `start_at`. Immutable once ingested.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct ForecastEntry {
    pub start_at: DateTime<FixedOffset>,

    /// Tenth-of-micro currency units per kWh.
    pub electricity_price: i64,
}

impl ForecastEntry {
    pub fn rate(&self) -> KilowattHourRate {
        #[allow(clippy::cast_precision_loss)]
        KilowattHourRate(self.electricity_price as f64 / 1e7)
    }
}

/// Convert a raw forecast timestamp into the configured local time zone.
///
/// A timestamp that is already timezone-aware is only relabeled, never
/// shifted, so normalization is idempotent. A naive timestamp with a
/// trailing zone marker is stripped of the marker and read as UTC.
pub fn normalize_timestamp(
    raw: &str,
    time_zone: Tz,
) -> Result<DateTime<FixedOffset>, UpdateError> {
    if let Ok(aware) = DateTime::parse_from_rfc3339(raw) {
        return Ok(aware.with_timezone(&time_zone).fixed_offset());
    }
    let mut chars = raw.chars();
    chars.next_back();
    NaiveDateTime::parse_from_str(chars.as_str(), "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().with_timezone(&time_zone).fixed_offset())
        .map_err(|error| UpdateError::parse(raw, error.to_string()))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono_tz::Europe::Amsterdam;

    use super::*;

    #[test]
    fn test_normalize_utc_marker() {
        // Winter time: UTC+1.
        let normalized = normalize_timestamp("2026-01-10T12:00:00Z", Amsterdam).unwrap();
        assert_eq!(normalized.to_rfc3339(), "2026-01-10T13:00:00+01:00");
    }

    #[test]
    fn test_normalize_aware_is_idempotent() {
        let first = normalize_timestamp("2026-06-10T14:00:00+02:00", Amsterdam).unwrap();
        let second = normalize_timestamp(&first.to_rfc3339(), Amsterdam).unwrap();
        assert_eq!(first, second);
        // Relabeled, not shifted.
        assert_eq!(first.to_rfc3339(), "2026-06-10T14:00:00+02:00");
    }

    #[test]
    fn test_normalize_malformed() {
        assert!(matches!(
            normalize_timestamp("yesterday-ish", Amsterdam),
            Err(UpdateError::Parse { .. }),
        ));
    }

    #[test]
    fn test_deserialize_skips_malformed_entries() {
        // language=JSON
        const ATTRIBUTES: &str = r#"
            {
                "forecast": [
                    {"datetime": "2026-01-10T12:00:00Z", "electricity_price": 1230000},
                    {"datetime": "2026-01-10T13:00:00Z"},
                    {"electricity_price": 4560000},
                    {"datetime": "2026-01-10T14:00:00Z", "electricity_price": 4560000}
                ]
            }
        "#;
        let attributes: ForecastAttributes = serde_json::from_str(ATTRIBUTES).unwrap();
        assert_eq!(attributes.forecast.len(), 2);
        assert_eq!(attributes.forecast[1].electricity_price, 4_560_000);
    }

    #[test]
    fn test_rate() {
        let entry = RawForecastEntry {
            datetime: "2026-01-10T12:00:00Z".to_string(),
            electricity_price: 2_150_000,
        }
        .normalize(Amsterdam)
        .unwrap();
        assert_abs_diff_eq!(entry.rate().0, 0.215);
    }
}
