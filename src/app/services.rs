use crate::adapters::{LocalStorage, ShopStore, StorageSessionCache};
use crate::app::jobs::ScheduledJobs;
use crate::config::toml_config::BridgeConfig;
use crate::core::account::AccountService;
use crate::core::awb::{AwbLifecycleManager, StatusMap};
use crate::core::carrier::CarrierApiClient;
use crate::core::localities::LocalityCache;
use crate::core::pricing::RateCalculator;
use crate::core::pudo_sync::{LocationSyncEngine, PudoDirectory};
use crate::core::returns::ReturnAwbManager;
use crate::domain::ports::{SessionCache, Storage};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use std::sync::Arc;
use std::time::Duration;

/// Every component wired from one validated configuration.
pub struct Services<S: Storage + Clone + 'static> {
    pub config: BridgeConfig,
    pub store: Arc<ShopStore<S>>,
    pub client: Arc<CarrierApiClient>,
    pub rates: RateCalculator,
    pub awb: Arc<AwbLifecycleManager<ShopStore<S>>>,
    pub returns: ReturnAwbManager<ShopStore<S>>,
    pub sync: Arc<LocationSyncEngine<ShopStore<S>>>,
    pub directory: PudoDirectory<ShopStore<S>>,
    pub localities: LocalityCache<ShopStore<S>>,
    pub account: AccountService,
    pub jobs: ScheduledJobs<ShopStore<S>>,
}

impl Services<LocalStorage> {
    /// State and session files live under `storage.data_dir`.
    pub async fn from_config(config: BridgeConfig) -> Result<Self> {
        let storage = LocalStorage::new(config.storage.data_dir.clone());
        Self::with_storage(config, storage).await
    }
}

impl<S: Storage + Clone + 'static> Services<S> {
    pub async fn with_storage(config: BridgeConfig, storage: S) -> Result<Self> {
        config.validate()?;
        let status_map = StatusMap::from_entries(&config.tracking.status_map)?;

        let store = Arc::new(ShopStore::open(storage.clone(), config.storage.state_file.clone()).await?);
        let sessions: Arc<dyn SessionCache> = Arc::new(StorageSessionCache::new(
            storage,
            config.storage.session_file.clone(),
        ));
        let client = Arc::new(CarrierApiClient::new(config.carrier.clone(), sessions)?);

        let rates = RateCalculator::new(config.pricing.clone()).with_remote(client.clone());
        let awb = Arc::new(AwbLifecycleManager::new(
            client.clone(),
            store.clone(),
            config.awb.clone(),
            status_map,
        ));
        let returns = ReturnAwbManager::new(client.clone(), store.clone(), config.shop.clone());
        let sync = Arc::new(LocationSyncEngine::new(
            client.clone(),
            store.clone(),
            config.sync.clone(),
        ));
        let directory = PudoDirectory::new(store.clone());
        let localities = LocalityCache::new(
            client.clone(),
            store.clone(),
            Duration::from_secs(config.sync.pudo_timeout_seconds),
        );
        let account = AccountService::new(client.clone());
        let jobs = ScheduledJobs::new(config.jobs.cron_token.clone(), awb.clone(), sync.clone());

        tracing::debug!(
            "Services ready (remote pricing: {})",
            config.remote_pricing_enabled()
        );

        Ok(Self {
            config,
            store,
            client,
            rates,
            awb,
            returns,
            sync,
            directory,
            localities,
            account,
            jobs,
        })
    }
}
