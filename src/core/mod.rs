pub mod account;
pub mod awb;
pub mod carrier;
pub mod geo;
pub mod localities;
pub mod pricing;
pub mod pudo_sync;
pub mod returns;

pub use crate::domain::ports::{
    LocalityRepository, OrderRepository, PudoRepository, SessionCache, Storage,
};
pub use crate::utils::error::Result;
pub use account::{AccountService, LabelFormat};
pub use awb::{AwbLifecycleManager, AwbOptions, StatusMap};
pub use carrier::{AwbCreation, AwbPayload, CarrierApiClient, CarrierRequest, Party};
pub use localities::LocalityCache;
pub use pricing::{OversizePolicy, RateCalculator};
pub use pudo_sync::{LocationSyncEngine, PudoDirectory};
pub use returns::{ReturnAwbManager, ReturnMode, ReturnRequest};
