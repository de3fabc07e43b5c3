//! Home Assistant REST API client.

use std::time::Duration;

use chrono_tz::Tz;
use reqwest::{
    Client,
    ClientBuilder,
    StatusCode,
    Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::Deserialize;

use crate::{prelude::*, sensor::Publication, store::EntityState};

pub struct Api {
    client: Client,
    base_url: Url,
}

impl Api {
    pub fn try_new(access_token: &str, base_url: Url) -> Result<Self> {
        let headers = HeaderMap::from_iter([(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {access_token}"))?,
        )]);
        let client = ClientBuilder::new()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, base_url })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| anyhow!("invalid base URL"))?;
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// Host configuration, needed for the configured time zone.
    #[instrument(skip_all)]
    pub async fn get_config(&self) -> Result<HostConfiguration> {
        let url = self.url(&["config"])?;
        Ok(self.client.get(url).send().await?.error_for_status()?.json().await?)
    }

    /// Fetch one entity's state, `None` when the entity does not exist.
    #[instrument(skip_all, fields(entity_id = entity_id))]
    pub async fn get_state(&self, entity_id: &str) -> Result<Option<EntityState>> {
        let url = self.url(&["states", entity_id])?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }

    /// Create or update a virtual sensor.
    #[instrument(skip_all, fields(entity_id = entity_id))]
    pub async fn set_state(&self, entity_id: &str, publication: &Publication) -> Result {
        let url = self.url(&["states", entity_id])?;
        self.client.post(url).json(publication).send().await?.error_for_status()?;
        Ok(())
    }
}

#[must_use]
#[derive(Deserialize)]
pub struct HostConfiguration {
    pub time_zone: String,
}

impl HostConfiguration {
    pub fn try_time_zone(&self) -> Result<Tz> {
        self.time_zone
            .parse()
            .map_err(|_| anyhow!("unknown host time zone `{}`", self.time_zone))
    }
}
