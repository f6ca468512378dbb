use crate::core::carrier::CarrierApiClient;
use crate::core::geo;
use crate::domain::model::Locality;
use crate::domain::ports::LocalityRepository;
use crate::utils::error::{Result, ShipError};
use std::sync::Arc;
use std::time::Duration;

/// Local copy of the carrier's locality list, matched by normalized name.
pub struct LocalityCache<R: LocalityRepository> {
    client: Arc<CarrierApiClient>,
    localities: Arc<R>,
    timeout: Duration,
}

impl<R: LocalityRepository> LocalityCache<R> {
    pub fn new(client: Arc<CarrierApiClient>, localities: Arc<R>, timeout: Duration) -> Self {
        Self {
            client,
            localities,
            timeout,
        }
    }

    /// 整批替換地名快取；抓取失敗或空清單時保留舊資料
    pub async fn sync(&self) -> Result<usize> {
        self.client.authenticate().await?;

        let country_id = self.client.config().country_id;
        tracing::info!("📡 Fetching localities for country {}", country_id);
        let snapshot = self.client.fetch_localities(country_id, self.timeout).await?;
        if snapshot.is_empty() {
            tracing::error!("❌ Carrier returned no localities, cache left untouched");
            return Err(ShipError::EmptySnapshot {
                endpoint: "Localities".to_string(),
            });
        }

        let cached = self.localities.replace_localities(snapshot).await?;
        tracing::info!("✅ Cached {} localities", cached);
        Ok(cached)
    }

    /// Exact match on the normalized city name. A county, when given, breaks ties
    /// between same-named localities; without a county match the first hit wins.
    pub async fn resolve(&self, city: &str, county: Option<&str>) -> Result<Option<Locality>> {
        let key = geo::normalize(city);
        if key.is_empty() {
            return Ok(None);
        }

        let hits: Vec<Locality> = self
            .localities
            .localities()
            .await?
            .into_iter()
            .filter(|l| l.normalized_name == key)
            .collect();

        let county = county.map(geo::normalize).filter(|c| !c.is_empty());
        let preferred =
            county.and_then(|county| hits.iter().position(|l| geo::normalize(&l.county) == county));

        Ok(match preferred {
            Some(index) => hits.into_iter().nth(index),
            None => hits.into_iter().next(),
        })
    }
}
