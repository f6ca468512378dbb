use crate::config::toml_config::SyncConfig;
use crate::core::carrier::CarrierApiClient;
use crate::core::geo;
use crate::domain::model::{CartId, CartPudoSelection, PudoLocation, SyncStats};
use crate::domain::ports::{OrderRepository, PudoRepository};
use crate::utils::error::{Result, ShipError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub const MIN_SEARCH_CHARS: usize = 2;
pub const MAX_SEARCH_RESULTS: usize = 50;

/// Full-snapshot reconciliation of the carrier's pickup-point network.
pub struct LocationSyncEngine<R: PudoRepository> {
    client: Arc<CarrierApiClient>,
    pudos: Arc<R>,
    config: SyncConfig,
}

impl<R: PudoRepository> LocationSyncEngine<R> {
    pub fn new(client: Arc<CarrierApiClient>, pudos: Arc<R>, config: SyncConfig) -> Self {
        Self {
            client,
            pudos,
            config,
        }
    }

    /// 同步取貨點
    ///
    /// After a successful run the active set equals the snapshot. A failed or
    /// empty fetch returns an error before anything is written.
    pub async fn sync(&self) -> Result<SyncStats> {
        self.client.authenticate().await?;

        let country_id = self.client.config().country_id;
        let timeout = Duration::from_secs(self.config.pudo_timeout_seconds);
        tracing::info!("📡 Fetching pickup points for country {}", country_id);

        let snapshot = self.client.fetch_pudos(country_id, timeout).await?;
        if snapshot.is_empty() {
            tracing::error!("❌ Carrier returned no pickup points, local cache left untouched");
            return Err(ShipError::EmptySnapshot {
                endpoint: "Pudo".to_string(),
            });
        }

        let seen: HashSet<String> = snapshot.iter().map(|p| p.external_id.clone()).collect();

        let mut stats = SyncStats::default();
        for batch in snapshot.chunks(self.config.batch_size.max(1)) {
            stats.processed += self.pudos.upsert_pudos(batch).await?;
            tracing::debug!("Upserted {} / {} pickup points", stats.processed, snapshot.len());
        }

        stats.deactivated = self.pudos.deactivate_missing(&seen).await?;
        self.pudos.record_sync(Utc::now()).await?;

        tracing::info!(
            "✅ Pickup points synced: {} processed, {} deactivated",
            stats.processed,
            stats.deactivated
        );
        Ok(stats)
    }
}

/// Checkout-side queries over the local pickup-point cache.
pub struct PudoDirectory<R> {
    store: Arc<R>,
}

impl<R: PudoRepository + OrderRepository> PudoDirectory<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    /// Active points whose city contains `city`, ignoring case and diacritics.
    pub async fn search(&self, city: &str) -> Result<Vec<PudoLocation>> {
        let query = geo::normalize(city);
        if query.chars().count() < MIN_SEARCH_CHARS {
            return Ok(Vec::new());
        }

        let mut hits: Vec<PudoLocation> = self
            .store
            .active_pudos()
            .await?
            .into_iter()
            .filter(|p| geo::contains(&p.city, &query))
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name));
        hits.truncate(MAX_SEARCH_RESULTS);
        Ok(hits)
    }

    /// Records the cart's locker. Re-selecting overwrites the previous choice.
    pub async fn select(&self, cart_id: CartId, pudo_id: &str) -> Result<PudoLocation> {
        let pudo_id = pudo_id.trim();
        let pudo = match self.store.find_pudo(pudo_id).await? {
            Some(pudo) if pudo.is_active && !pudo_id.is_empty() => pudo,
            _ => {
                return Err(ShipError::PudoNotFound {
                    pudo_id: pudo_id.to_string(),
                })
            }
        };

        self.store
            .save_pudo_selection(CartPudoSelection {
                cart_id,
                pudo_id: pudo.external_id.clone(),
            })
            .await?;
        tracing::info!("📦 Cart {} will ship to pickup point {}", cart_id, pudo.name);
        Ok(pudo)
    }

    pub async fn selection(&self, cart_id: CartId) -> Result<Option<PudoLocation>> {
        match self.store.selected_pudo(cart_id).await? {
            Some(id) => self.store.find_pudo(&id).await,
            None => Ok(None),
        }
    }

    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        self.store.last_sync().await
    }
}
