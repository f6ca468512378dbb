// Adapters layer: concrete implementations of the domain ports (storage, session cache, shop store).

pub mod session;
pub mod storage;
pub mod store;

pub use session::{MemorySessionCache, StorageSessionCache};
pub use storage::{LocalStorage, MemoryStorage};
pub use store::{ShopState, ShopStore};
