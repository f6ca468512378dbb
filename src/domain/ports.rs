use crate::domain::model::{
    AwbRecord, CarrierSession, CartId, CartPudoSelection, Order, OrderFulfillmentState, OrderId,
    Locality, PudoLocation, ReturnAwbRecord, StateChange,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

pub trait Storage: Send + Sync {
    /// 跨行程的獨占鎖，drop 時釋放
    type Lock: Send;

    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Waits until no other holder (in any process sharing the backend) owns `path`'s lock.
    fn lock(&self, path: &str) -> impl std::future::Future<Output = Result<Self::Lock>> + Send;
}

/// 承運商 session 快取，所有遠端呼叫共用
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Returns the cached session only while it is still valid.
    async fn get(&self) -> Option<CarrierSession>;
    async fn refresh(&self, session: CarrierSession) -> Result<()>;
    async fn invalidate(&self) -> Result<()>;
}

/// Result of a conditional AWB write.
#[derive(Debug, Clone, PartialEq)]
pub enum AwbAssignment {
    Assigned(AwbRecord),
    AlreadyAssigned(AwbRecord),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    async fn selected_pudo(&self, cart_id: CartId) -> Result<Option<String>>;

    async fn save_pudo_selection(&self, selection: CartPudoSelection) -> Result<()>;

    /// Sets the AWB only when the order has none, as one atomic step.
    async fn assign_awb_if_empty(&self, record: AwbRecord) -> Result<AwbAssignment>;

    /// Orders with an AWB whose state is not terminal.
    async fn orders_in_flight(&self) -> Result<Vec<Order>>;

    /// Applies `target` only when it is forward progress. Returns whether the state changed.
    async fn transition_state(&self, order_id: OrderId, target: OrderFulfillmentState)
        -> Result<bool>;

    async fn history(&self, order_id: OrderId) -> Result<Vec<StateChange>>;

    async fn add_return_awb(&self, record: ReturnAwbRecord) -> Result<()>;

    async fn return_awbs(&self, order_id: OrderId) -> Result<Vec<ReturnAwbRecord>>;
}

#[async_trait]
pub trait PudoRepository: Send + Sync {
    /// Inserts or refreshes every location, marking it active.
    async fn upsert_pudos(&self, batch: &[PudoLocation]) -> Result<usize>;

    /// Deactivates active locations whose id is not in `seen`. Returns how many flipped.
    async fn deactivate_missing(&self, seen: &HashSet<String>) -> Result<usize>;

    async fn find_pudo(&self, external_id: &str) -> Result<Option<PudoLocation>>;

    async fn active_pudos(&self) -> Result<Vec<PudoLocation>>;

    async fn record_sync(&self, at: DateTime<Utc>) -> Result<()>;

    async fn last_sync(&self) -> Result<Option<DateTime<Utc>>>;
}

/// 承運商地名快取
#[async_trait]
pub trait LocalityRepository: Send + Sync {
    /// Swaps the whole cache for `snapshot`. Returns the new size.
    async fn replace_localities(&self, snapshot: Vec<Locality>) -> Result<usize>;

    async fn localities(&self) -> Result<Vec<Locality>>;
}
