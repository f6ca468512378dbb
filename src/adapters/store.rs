use crate::adapters::storage::{is_not_found, MemoryStorage};
use crate::domain::model::{
    AwbRecord, CartId, CartPudoSelection, Locality, Order, OrderFulfillmentState, OrderId,
    PudoLocation, ReturnAwbRecord, StateChange,
};
use crate::domain::ports::{
    AwbAssignment, LocalityRepository, OrderRepository, PudoRepository, Storage,
};
use crate::utils::error::{Result, ShipError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

pub const DEFAULT_STATE_FILE: &str = "shop_state.json";

/// Snapshot of everything the integration keeps locally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopState {
    #[serde(default)]
    pub orders: BTreeMap<OrderId, Order>,
    #[serde(default)]
    pub cart_pudos: BTreeMap<CartId, String>,
    #[serde(default)]
    pub pudos: BTreeMap<String, PudoLocation>,
    #[serde(default)]
    pub returns: Vec<ReturnAwbRecord>,
    #[serde(default)]
    pub history: Vec<StateChange>,
    #[serde(default)]
    pub last_pudo_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub localities: Vec<Locality>,
}

/// JSON-snapshot store over a `Storage` backend.
///
/// Mutations are read-modify-write cycles under the backend's exclusive lock:
/// reload the file, apply the change, persist, then publish the new snapshot.
/// Other processes sharing the data directory therefore never overwrite each
/// other, and a failed write leaves the previous snapshot in place.
pub struct ShopStore<S: Storage> {
    storage: S,
    file_name: String,
    // 本行程最後一次讀到或寫入的快照
    state: Mutex<ShopState>,
}

impl ShopStore<MemoryStorage> {
    pub fn in_memory() -> Self {
        Self {
            storage: MemoryStorage::new(),
            file_name: DEFAULT_STATE_FILE.to_string(),
            state: Mutex::new(ShopState::default()),
        }
    }
}

impl<S: Storage> ShopStore<S> {
    /// 載入既有狀態檔，不存在時從空狀態開始
    pub async fn open(storage: S, file_name: impl Into<String>) -> Result<Self> {
        let file_name = file_name.into();
        let state = match Self::read_state(&storage, &file_name).await? {
            Some(state) => state,
            None => {
                tracing::info!("📂 No state file '{}', starting empty", file_name);
                ShopState::default()
            }
        };

        Ok(Self {
            storage,
            file_name,
            state: Mutex::new(state),
        })
    }

    async fn read_state(storage: &S, file_name: &str) -> Result<Option<ShopState>> {
        match storage.read_file(file_name).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Latest persisted state; another process may have written since our last look.
    async fn current(&self) -> Result<ShopState> {
        let mut cached = self.state.lock().await;
        if let Some(fresh) = Self::read_state(&self.storage, &self.file_name).await? {
            *cached = fresh;
        }
        Ok(cached.clone())
    }

    /// Runs `apply` on a freshly loaded copy while holding the storage lock.
    /// `apply` reports whether it changed anything; unchanged copies are not written.
    async fn mutate<T: Send>(
        &self,
        apply: impl FnOnce(&mut ShopState) -> Result<(T, bool)> + Send,
    ) -> Result<T> {
        let mut cached = self.state.lock().await;
        let _lock = self.storage.lock(&self.file_name).await?;

        let mut working = match Self::read_state(&self.storage, &self.file_name).await? {
            Some(fresh) => fresh,
            None => cached.clone(),
        };
        let (out, changed) = apply(&mut working)?;
        if changed {
            let bytes = serde_json::to_vec_pretty(&working)?;
            self.storage.write_file(&self.file_name, &bytes).await?;
        }
        *cached = working;
        Ok(out)
    }

    /// Inserts or replaces an order. Used by the host-side import and by tests.
    pub async fn put_order(&self, order: Order) -> Result<()> {
        self.mutate(|state| {
            state.orders.insert(order.id, order);
            Ok(((), true))
        })
        .await
    }
}

#[async_trait]
impl<S: Storage> OrderRepository for ShopStore<S> {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.current().await?.orders.remove(&order_id))
    }

    async fn selected_pudo(&self, cart_id: CartId) -> Result<Option<String>> {
        let mut state = self.current().await?;
        Ok(state.cart_pudos.remove(&cart_id).filter(|id| !id.is_empty()))
    }

    async fn save_pudo_selection(&self, selection: CartPudoSelection) -> Result<()> {
        self.mutate(|state| {
            state.cart_pudos.insert(selection.cart_id, selection.pudo_id);
            Ok(((), true))
        })
        .await
    }

    async fn assign_awb_if_empty(&self, record: AwbRecord) -> Result<AwbAssignment> {
        self.mutate(|state| {
            let order = state
                .orders
                .get_mut(&record.order_id)
                .ok_or(ShipError::OrderNotFound {
                    order_id: record.order_id,
                })?;

            if order.awb_number().is_some() {
                if let Some(existing) = order.awb.clone() {
                    return Ok((AwbAssignment::AlreadyAssigned(existing), false));
                }
            }

            order.awb = Some(record.clone());
            Ok((AwbAssignment::Assigned(record), true))
        })
        .await
    }

    async fn orders_in_flight(&self) -> Result<Vec<Order>> {
        let state = self.current().await?;
        Ok(state
            .orders
            .into_values()
            .filter(|o| o.awb_number().is_some() && !o.state.is_terminal())
            .collect())
    }

    async fn transition_state(
        &self,
        order_id: OrderId,
        target: OrderFulfillmentState,
    ) -> Result<bool> {
        let moved_from = self
            .mutate(|state| {
                let order = state
                    .orders
                    .get_mut(&order_id)
                    .ok_or(ShipError::OrderNotFound { order_id })?;

                let current = order.state;
                if !target.is_progress_from(current) {
                    tracing::debug!(
                        "Order {} stays {} (requested {})",
                        order_id,
                        current,
                        target
                    );
                    return Ok((None, false));
                }

                order.state = target;
                state.history.push(StateChange {
                    order_id,
                    from: current,
                    to: target,
                    at: Utc::now(),
                });
                Ok((Some(current), true))
            })
            .await?;

        match moved_from {
            Some(from) => {
                tracing::info!("📦 Order {}: {} → {}", order_id, from, target);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn history(&self, order_id: OrderId) -> Result<Vec<StateChange>> {
        let state = self.current().await?;
        Ok(state
            .history
            .into_iter()
            .filter(|h| h.order_id == order_id)
            .collect())
    }

    async fn add_return_awb(&self, record: ReturnAwbRecord) -> Result<()> {
        self.mutate(|state| {
            state.returns.push(record);
            Ok(((), true))
        })
        .await
    }

    async fn return_awbs(&self, order_id: OrderId) -> Result<Vec<ReturnAwbRecord>> {
        let state = self.current().await?;
        Ok(state
            .returns
            .into_iter()
            .filter(|r| r.order_id == order_id)
            .collect())
    }
}

#[async_trait]
impl<S: Storage> PudoRepository for ShopStore<S> {
    async fn upsert_pudos(&self, batch: &[PudoLocation]) -> Result<usize> {
        self.mutate(|state| {
            for pudo in batch {
                let mut fresh = pudo.clone();
                fresh.is_active = true;
                state.pudos.insert(fresh.external_id.clone(), fresh);
            }
            Ok((batch.len(), true))
        })
        .await
    }

    async fn deactivate_missing(&self, seen: &HashSet<String>) -> Result<usize> {
        self.mutate(|state| {
            let mut deactivated = 0;
            for pudo in state.pudos.values_mut() {
                if pudo.is_active && !seen.contains(&pudo.external_id) {
                    pudo.is_active = false;
                    deactivated += 1;
                }
            }
            Ok((deactivated, deactivated > 0))
        })
        .await
    }

    async fn find_pudo(&self, external_id: &str) -> Result<Option<PudoLocation>> {
        Ok(self.current().await?.pudos.remove(external_id))
    }

    async fn active_pudos(&self) -> Result<Vec<PudoLocation>> {
        let state = self.current().await?;
        Ok(state.pudos.into_values().filter(|p| p.is_active).collect())
    }

    async fn record_sync(&self, at: DateTime<Utc>) -> Result<()> {
        self.mutate(|state| {
            state.last_pudo_sync = Some(at);
            Ok(((), true))
        })
        .await
    }

    async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.current().await?.last_pudo_sync)
    }
}

#[async_trait]
impl<S: Storage> LocalityRepository for ShopStore<S> {
    async fn replace_localities(&self, snapshot: Vec<Locality>) -> Result<usize> {
        self.mutate(|state| {
            state.localities = snapshot;
            Ok((state.localities.len(), true))
        })
        .await
    }

    async fn localities(&self) -> Result<Vec<Locality>> {
        Ok(self.current().await?.localities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use crate::domain::model::{Customer, DeliveryAddress};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn order(id: OrderId) -> Order {
        Order {
            id,
            reference: format!("REF{}", id),
            cart_id: id * 10,
            customer: Customer {
                first_name: "Ion".to_string(),
                last_name: "Popescu".to_string(),
                email: "ion@example.com".to_string(),
            },
            address: DeliveryAddress {
                address1: "Bd. Unirii 1".to_string(),
                address2: String::new(),
                city: "Bucuresti".to_string(),
                county: Some("Bucuresti".to_string()),
                phone: Some("0211234567".to_string()),
                phone_mobile: None,
            },
            lines: vec![],
            payment_module: "bankwire".to_string(),
            total_paid: 100.0,
            state: OrderFulfillmentState::Placed,
            awb: None,
        }
    }

    fn awb(order_id: OrderId, number: &str) -> AwbRecord {
        AwbRecord {
            order_id,
            awb_number: number.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_assign_awb_only_once() {
        let store = ShopStore::in_memory();
        store.put_order(order(1)).await.unwrap();

        let first = store.assign_awb_if_empty(awb(1, "111")).await.unwrap();
        assert!(matches!(first, AwbAssignment::Assigned(_)));

        let second = store.assign_awb_if_empty(awb(1, "222")).await.unwrap();
        match second {
            AwbAssignment::AlreadyAssigned(existing) => assert_eq!(existing.awb_number, "111"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transition_never_moves_backward_or_repeats() {
        let store = ShopStore::in_memory();
        store.put_order(order(2)).await.unwrap();

        assert!(store
            .transition_state(2, OrderFulfillmentState::InTransit)
            .await
            .unwrap());
        assert!(!store
            .transition_state(2, OrderFulfillmentState::AwbGenerated)
            .await
            .unwrap());
        assert!(!store
            .transition_state(2, OrderFulfillmentState::InTransit)
            .await
            .unwrap());
        assert!(store
            .transition_state(2, OrderFulfillmentState::Delivered)
            .await
            .unwrap());
        assert!(!store
            .transition_state(2, OrderFulfillmentState::Returned)
            .await
            .unwrap());

        assert_eq!(store.history(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_state_file_reloads() {
        let storage = MemoryStorage::new();
        let store = ShopStore::open(storage.clone(), DEFAULT_STATE_FILE)
            .await
            .unwrap();
        store.put_order(order(3)).await.unwrap();
        store.assign_awb_if_empty(awb(3, "333")).await.unwrap();

        let raw = storage.get_file(DEFAULT_STATE_FILE).await.unwrap();
        let persisted: ShopState = serde_json::from_slice(&raw).unwrap();
        assert_eq!(persisted.orders.len(), 1);

        let reopened = ShopStore::open(storage, DEFAULT_STATE_FILE).await.unwrap();
        let loaded = reopened.find_order(3).await.unwrap().unwrap();
        assert_eq!(loaded.awb_number(), Some("333"));
    }

    #[tokio::test]
    async fn test_in_flight_excludes_terminal_and_unshipped() {
        let store = ShopStore::in_memory();
        store.put_order(order(4)).await.unwrap();
        store.put_order(order(5)).await.unwrap();
        store.put_order(order(6)).await.unwrap();
        store.assign_awb_if_empty(awb(5, "555")).await.unwrap();
        store.assign_awb_if_empty(awb(6, "666")).await.unwrap();
        store
            .transition_state(6, OrderFulfillmentState::Delivered)
            .await
            .unwrap();

        let in_flight = store.orders_in_flight().await.unwrap();
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight[0].id, 5);
    }

    #[tokio::test]
    async fn test_two_stores_on_one_directory_assign_once() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

        let cli = ShopStore::open(storage.clone(), DEFAULT_STATE_FILE).await.unwrap();
        cli.put_order(order(7)).await.unwrap();
        // 第二個行程在訂單匯入後才啟動，快照裡沒有 AWB
        let lambda = ShopStore::open(storage.clone(), DEFAULT_STATE_FILE).await.unwrap();

        let first = cli.assign_awb_if_empty(awb(7, "111")).await.unwrap();
        assert!(matches!(first, AwbAssignment::Assigned(_)));

        let second = lambda.assign_awb_if_empty(awb(7, "222")).await.unwrap();
        match second {
            AwbAssignment::AlreadyAssigned(existing) => assert_eq!(existing.awb_number, "111"),
            other => panic!("unexpected {:?}", other),
        }

        let reopened = ShopStore::open(storage, DEFAULT_STATE_FILE).await.unwrap();
        let persisted = reopened.find_order(7).await.unwrap().unwrap();
        assert_eq!(persisted.awb_number(), Some("111"));
    }

    #[tokio::test]
    async fn test_concurrent_stores_keep_each_others_writes() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
        let a = Arc::new(ShopStore::open(storage.clone(), DEFAULT_STATE_FILE).await.unwrap());
        let b = Arc::new(ShopStore::open(storage.clone(), DEFAULT_STATE_FILE).await.unwrap());

        let mut tasks = Vec::new();
        for id in 1..=10u64 {
            let store = if id % 2 == 0 { a.clone() } else { b.clone() };
            tasks.push(tokio::spawn(async move { store.put_order(order(id)).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reopened = ShopStore::open(storage, DEFAULT_STATE_FILE).await.unwrap();
        for id in 1..=10u64 {
            assert!(reopened.find_order(id).await.unwrap().is_some(), "order {} lost", id);
        }
        // b 也看得到 a 寫入的訂單
        assert!(b.find_order(2).await.unwrap().is_some());
    }

    /// Reads succeed, every write fails.
    struct ReadOnlyDisk(MemoryStorage);

    impl Storage for ReadOnlyDisk {
        type Lock = tokio::sync::OwnedMutexGuard<()>;

        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.0.read_file(path).await
        }

        async fn write_file(&self, _path: &str, _data: &[u8]) -> Result<()> {
            Err(ShipError::IoError(std::io::Error::other("disk full")))
        }

        async fn lock(&self, path: &str) -> Result<Self::Lock> {
            self.0.lock(path).await
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_snapshot_untouched() {
        let store = ShopStore::open(ReadOnlyDisk(MemoryStorage::new()), DEFAULT_STATE_FILE)
            .await
            .unwrap();

        assert!(store.put_order(order(8)).await.is_err());
        assert!(store.find_order(8).await.unwrap().is_none());
        assert!(store.orders_in_flight().await.unwrap().is_empty());
    }
}
