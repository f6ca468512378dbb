pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{LocalStorage, MemorySessionCache, MemoryStorage, ShopStore, StorageSessionCache};
pub use app::{JobReport, ScheduledJob, ScheduledJobs, Services};
pub use config::BridgeConfig;
pub use core::{
    AccountService, AwbLifecycleManager, CarrierApiClient, LocationSyncEngine, PudoDirectory,
    RateCalculator, ReturnAwbManager,
};
pub use utils::error::{Result, ShipError};
